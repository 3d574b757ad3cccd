// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layout of an unpacked `.ipa` archive.
//!
//! An iOS application archive is a zip file whose root contains a `Payload`
//! directory holding exactly one application bundle:
//!
//! ```text
//!   Payload/
//!     MyApp.app/
//!       Info.plist
//!       MyApp
//!       embedded.mobileprovision
//! ```
//!
//! The bundle is shallow, so `Info.plist` and the main executable live
//! directly in the bundle root.

use {
    crate::{error::IpaValidateError, settings::ValidationSettings},
    log::{debug, info},
    std::path::{Component, Path, PathBuf},
};

/// Paths within an unpacked archive that passed structure validation.
#[derive(Clone, Debug)]
pub struct ArchiveLayout {
    root: PathBuf,
    payload: PathBuf,
    app_dir: PathBuf,
    metadata_file: PathBuf,
    provisioning_profile: PathBuf,
    executable: Option<PathBuf>,
}

impl ArchiveLayout {
    /// Validate the layout of an unpacked archive rooted at `root`.
    ///
    /// Rules are checked in order and the first violation is returned.
    pub fn validate(
        root: impl AsRef<Path>,
        settings: &ValidationSettings,
    ) -> Result<Self, IpaValidateError> {
        let root = root.as_ref();

        let payload = root.join(settings.payload_dir_name());
        if !payload.is_dir() {
            return Err(IpaValidateError::MissingPayloadDirectory(payload));
        }

        let mut candidates = vec![];
        for entry in std::fs::read_dir(&payload)? {
            let entry = entry?;

            if entry
                .file_name()
                .to_string_lossy()
                .ends_with(settings.app_bundle_suffix())
            {
                candidates.push(entry.path());
            }
        }

        // Be deterministic.
        candidates.sort();

        let app_dir = match candidates.len() {
            0 => return Err(IpaValidateError::NoAppBundle(payload)),
            1 => candidates.remove(0),
            _ => return Err(IpaValidateError::AmbiguousAppBundle(candidates)),
        };

        if !app_dir.is_dir() {
            return Err(IpaValidateError::AppBundleNotDirectory(app_dir));
        }
        info!("found app bundle {}", app_dir.display());

        let metadata_file = app_dir.join(settings.metadata_file_name());
        if !metadata_file.is_file() {
            return Err(IpaValidateError::MissingMetadataFile(metadata_file));
        }

        let provisioning_profile = app_dir.join(settings.provisioning_profile_name());

        Ok(Self {
            root: root.to_path_buf(),
            payload,
            app_dir,
            metadata_file,
            provisioning_profile,
            executable: None,
        })
    }

    /// Root directory of the unpacked archive.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The payload directory.
    pub fn payload_dir(&self) -> &Path {
        &self.payload
    }

    /// The application bundle directory.
    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    /// Path to the bundle's `Info.plist`.
    pub fn metadata_file(&self) -> &Path {
        &self.metadata_file
    }

    /// Path where the signed provisioning profile is expected.
    ///
    /// The file is not required to exist.
    pub fn provisioning_profile(&self) -> &Path {
        &self.provisioning_profile
    }

    /// Path of the main executable declared as `name`.
    ///
    /// `name` must be a plain file name inside the bundle. The file is not
    /// required to exist.
    pub fn executable_path(&self, name: &str) -> Result<PathBuf, IpaValidateError> {
        let mut components = Path::new(name).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain {
            return Err(IpaValidateError::BadExecutableName(name.to_string()));
        }

        Ok(self.app_dir.join(name))
    }

    /// Resolve the main executable from its declared file name.
    ///
    /// Like [Self::executable_path] but the file must exist.
    pub fn resolve_executable(&mut self, name: &str) -> Result<&Path, IpaValidateError> {
        let path = self.executable_path(name)?;
        if !path.is_file() {
            return Err(IpaValidateError::MissingExecutable(path));
        }
        debug!("main executable is {}", path.display());

        Ok(self.executable.insert(path).as_path())
    }

    /// The resolved main executable, if [Self::resolve_executable] succeeded.
    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }
}
