// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validation settings.

use {
    crate::error::IpaValidateError,
    chrono::{DateTime, Utc},
    std::{
        path::{Path, PathBuf},
        str::FromStr,
    },
};

/// Which tool unwraps the signed provisioning profile.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerifierKind {
    /// Parse the CMS message in process.
    Native,
    /// Run `openssl smime`.
    Openssl,
}

impl FromStr for VerifierKind {
    type Err = IpaValidateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "openssl" => Ok(Self::Openssl),
            _ => Err(IpaValidateError::CliGeneralError(format!(
                "unknown verifier: {}",
                s
            ))),
        }
    }
}

/// Represents settings for a validation run.
///
/// Defaults describe the layout of an iOS `.ipa` file. Setters exist so
/// callers (and tests) can override individual values.
#[derive(Clone, Debug)]
pub struct ValidationSettings {
    payload_dir_name: String,
    app_bundle_suffix: String,
    metadata_file_name: String,
    provisioning_profile_name: String,
    evaluation_time: Option<DateTime<Utc>>,
    verifier: VerifierKind,
    openssl_exe: PathBuf,
    scratch_parent: Option<PathBuf>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            payload_dir_name: "Payload".into(),
            app_bundle_suffix: ".app".into(),
            metadata_file_name: "Info.plist".into(),
            provisioning_profile_name: "embedded.mobileprovision".into(),
            evaluation_time: None,
            verifier: VerifierKind::Native,
            openssl_exe: PathBuf::from("openssl"),
            scratch_parent: None,
        }
    }
}

impl ValidationSettings {
    /// Name of the directory at the archive root holding the app bundle.
    pub fn payload_dir_name(&self) -> &str {
        &self.payload_dir_name
    }

    pub fn set_payload_dir_name(&mut self, value: impl ToString) {
        self.payload_dir_name = value.to_string();
    }

    /// Suffix identifying application bundle directories.
    pub fn app_bundle_suffix(&self) -> &str {
        &self.app_bundle_suffix
    }

    pub fn set_app_bundle_suffix(&mut self, value: impl ToString) {
        self.app_bundle_suffix = value.to_string();
    }

    /// Name of the bundle metadata file inside the app bundle.
    pub fn metadata_file_name(&self) -> &str {
        &self.metadata_file_name
    }

    pub fn set_metadata_file_name(&mut self, value: impl ToString) {
        self.metadata_file_name = value.to_string();
    }

    /// Name of the signed provisioning profile inside the app bundle.
    pub fn provisioning_profile_name(&self) -> &str {
        &self.provisioning_profile_name
    }

    pub fn set_provisioning_profile_name(&mut self, value: impl ToString) {
        self.provisioning_profile_name = value.to_string();
    }

    /// Fix the clock used for expiration checks.
    ///
    /// When unset, the current time is read each time [Self::now] is called.
    pub fn set_evaluation_time(&mut self, value: DateTime<Utc>) {
        self.evaluation_time = Some(value);
    }

    /// Obtain the evaluation-time clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.evaluation_time.unwrap_or_else(Utc::now)
    }

    pub fn verifier(&self) -> VerifierKind {
        self.verifier
    }

    pub fn set_verifier(&mut self, value: VerifierKind) {
        self.verifier = value;
    }

    /// Path or name of the `openssl` executable.
    pub fn openssl_exe(&self) -> &Path {
        &self.openssl_exe
    }

    pub fn set_openssl_exe(&mut self, value: impl AsRef<Path>) {
        self.openssl_exe = value.as_ref().to_path_buf();
    }

    /// Directory under which temporary directories are created.
    ///
    /// `None` means the system temporary directory.
    pub fn scratch_parent(&self) -> Option<&Path> {
        self.scratch_parent.as_deref()
    }

    pub fn set_scratch_parent(&mut self, value: impl AsRef<Path>) {
        self.scratch_parent = Some(value.as_ref().to_path_buf());
    }

    /// Create a private temporary directory honoring [Self::scratch_parent].
    pub fn create_temp_dir(&self) -> Result<tempfile::TempDir, IpaValidateError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ipa-validate-");

        Ok(match &self.scratch_parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        })
    }
}
