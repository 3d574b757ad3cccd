// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! End to end validation of `.ipa` archives.

A run proceeds through these stages, stopping at the first error:

1. Extract the archive (skipped by [ValidationPipeline::validate_directory]).
2. Check the directory layout.
3. Read the bundle's `Info.plist`.
4. Unwrap the signed provisioning profile.
5. Read the provisioning plist and cross check it against the bundle id.
6. Resolve the main executable and decode its architectures.

A provisioning profile that is absent or can't be unwrapped does not raise
an error. The run stops with a failed report carrying no provisioning or
binary information.

Warnings collected along the way end up in the [ValidationReport].
*/

use {
    crate::{
        error::IpaValidateError,
        extract::{ArchiveExtractor, ZipExtractor},
        info_plist::AppMetadata,
        layout::ArchiveLayout,
        macho::BinaryInfo,
        matcher::{check_provisioning, ValidationWarning},
        provisioning::ProvisioningMetadata,
        report::{ProvisioningReport, ValidationReport, ValidationStatus},
        settings::ValidationSettings,
        verifier::{verifier_from_settings, ProvisioningVerifier},
    },
    log::{info, warn},
    std::path::Path,
};

/// Validates `.ipa` archives and unpacked archive trees.
pub struct ValidationPipeline {
    settings: ValidationSettings,
    extractor: Box<dyn ArchiveExtractor>,
    verifier: Box<dyn ProvisioningVerifier>,
}

impl ValidationPipeline {
    /// Construct a pipeline using the default collaborators for `settings`.
    pub fn new(settings: ValidationSettings) -> Self {
        let verifier = verifier_from_settings(&settings);

        Self {
            settings,
            extractor: Box::new(ZipExtractor),
            verifier,
        }
    }

    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    /// Replace the archive extractor.
    pub fn set_extractor(&mut self, extractor: Box<dyn ArchiveExtractor>) {
        self.extractor = extractor;
    }

    /// Replace the provisioning profile verifier.
    pub fn set_verifier(&mut self, verifier: Box<dyn ProvisioningVerifier>) {
        self.verifier = verifier;
    }

    /// Validate an `.ipa` archive.
    ///
    /// If `dest_dir` is given, the archive is extracted there and the
    /// directory is left in place. Otherwise a temporary directory is used
    /// and removed before this returns, whether or not validation succeeded.
    pub fn validate_archive(
        &self,
        archive: impl AsRef<Path>,
        dest_dir: Option<&Path>,
    ) -> Result<ValidationReport, IpaValidateError> {
        let archive = archive.as_ref();

        match dest_dir {
            Some(dest_dir) => {
                std::fs::create_dir_all(dest_dir)?;
                let root = self.extractor.extract(archive, dest_dir)?;
                self.validate_directory(root)
            }
            None => {
                let temp_dir = self.settings.create_temp_dir()?;
                let root = self.extractor.extract(archive, temp_dir.path())?;
                let res = self.validate_directory(root);

                // Surface cleanup failures only when validation succeeded.
                let path = temp_dir.path().to_path_buf();
                match (res, temp_dir.close()) {
                    (Ok(_), Err(e)) => {
                        warn!("unable to remove {}: {}", path.display(), e);
                        Err(e.into())
                    }
                    (res, _) => res,
                }
            }
        }
    }

    /// Validate an archive that has already been unpacked at `root`.
    pub fn validate_directory(
        &self,
        root: impl AsRef<Path>,
    ) -> Result<ValidationReport, IpaValidateError> {
        let mut layout = ArchiveLayout::validate(root, &self.settings)?;

        let app = AppMetadata::from_path(layout.metadata_file())?;
        info!(
            "bundle {} version {} ({})",
            app.bundle_identifier, app.short_version, app.bundle_version
        );

        // The executable is only required once provisioning checks pass.
        layout.executable_path(&app.executable_file_name)?;

        let profile_path = layout.provisioning_profile();
        if !profile_path.is_file() {
            let err = IpaValidateError::MissingProvisioningProfile(profile_path.to_path_buf());
            warn!("{}", err);

            return Ok(failed_report(app, err.to_string()));
        }

        let work_dir = self.settings.create_temp_dir()?;
        let output = self.verifier.verify(profile_path, work_dir.path())?;

        if !output.success() {
            let message = match &output.detail {
                Some(detail) => format!(
                    "provisioning profile verification failed with status {}: {}",
                    output.status, detail
                ),
                None => format!(
                    "provisioning profile verification failed with status {}",
                    output.status
                ),
            };
            warn!("{}", message);

            return Ok(failed_report(app, message));
        }

        let profile = ProvisioningMetadata::from_path(&output.plist_path)?;
        work_dir.close()?;
        info!("provisioning profile {} ({})", profile.name, profile.uuid);

        let now = self.settings.now();
        let mut warnings = check_provisioning(
            &profile,
            &profile.entitlements,
            &app.bundle_identifier,
            now,
        )?;

        let executable = layout.resolve_executable(&app.executable_file_name)?;
        let binary = BinaryInfo::from_path(executable, &app.executable_file_name)?;
        if !binary.targets_arm() {
            let warning = ValidationWarning::NoArmArchitecture(binary.binary_name.clone());
            warn!("{}", warning);
            warnings.push(warning);
        }

        let is_expired = profile.is_expired(now);

        Ok(ValidationReport {
            status: ValidationStatus::Pass,
            app,
            provisioning: Some(ProvisioningReport {
                metadata: profile,
                is_expired,
            }),
            binary: Some(binary),
            warnings: warnings.iter().map(|w| w.to_string()).collect(),
            errors: vec![],
        })
    }
}

/// A report for a run that stopped because provisioning was unavailable.
fn failed_report(app: AppMetadata, message: String) -> ValidationReport {
    ValidationReport {
        status: ValidationStatus::Fail,
        app,
        provisioning: None,
        binary: None,
        warnings: vec![],
        errors: vec![message],
    }
}
