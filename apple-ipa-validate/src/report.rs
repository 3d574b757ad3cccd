// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validation reports.

use {
    crate::{
        error::IpaValidateError, info_plist::AppMetadata, macho::BinaryInfo,
        provisioning::ProvisioningMetadata,
    },
    serde::Serialize,
    std::io::Write,
};

/// Overall outcome of a validation run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Pass,
    Fail,
}

/// Provisioning metadata plus expiration state at evaluation time.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProvisioningReport {
    #[serde(flatten)]
    pub metadata: ProvisioningMetadata,
    pub is_expired: bool,
}

/// The structured result of validating an archive.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub app: AppMetadata,
    pub provisioning: Option<ProvisioningReport>,
    pub binary: Option<BinaryInfo>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.status == ValidationStatus::Pass
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, IpaValidateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write a human readable rendering.
    pub fn write_text(&self, writer: &mut impl Write) -> std::io::Result<()> {
        let app = &self.app;
        writeln!(writer, "CFBundleIdentifier: {}", app.bundle_identifier)?;
        writeln!(writer, "MinimumOSVersion: {}", app.minimum_os_version)?;
        writeln!(
            writer,
            "UISupportedInterfaceOrientations: {}",
            join(app.supported_orientations.iter())
        )?;
        writeln!(writer, "DTSDKName: {}", app.sdk_name)?;
        if let Some(caps) = &app.required_device_capabilities {
            writeln!(writer, "UIRequiredDeviceCapabilities: {}", join(caps.iter()))?;
        }
        writeln!(writer, "CFBundleVersion: {}", app.bundle_version)?;
        writeln!(
            writer,
            "CFBundleShortVersionString: {}",
            app.short_version
        )?;
        writeln!(writer, "CFBundleDisplayName: {}", app.display_name)?;
        writeln!(writer, "CFBundleExecutable: {}", app.executable_file_name)?;

        if let Some(provisioning) = &self.provisioning {
            let profile = &provisioning.metadata;
            writeln!(writer)?;
            writeln!(writer, "AppIDName: {}", profile.app_id_name)?;
            writeln!(
                writer,
                "ApplicationIdentifierPrefix: {}",
                join(profile.application_identifier_prefixes.iter())
            )?;
            writeln!(writer, "CreationDate: {}", profile.creation_date.to_rfc3339())?;
            if let Some(platforms) = &profile.platforms {
                writeln!(writer, "Platform: {}", join(platforms.iter()))?;
            }
            writeln!(
                writer,
                "ExpirationDate: {}{}",
                profile.expiration_date.to_rfc3339(),
                if provisioning.is_expired {
                    " (expired)"
                } else {
                    ""
                }
            )?;
            writeln!(writer, "Name: {}", profile.name)?;
            if let Some(all) = profile.provisions_all_devices {
                writeln!(writer, "ProvisionsAllDevices: {}", all)?;
            }
            writeln!(
                writer,
                "TeamIdentifier: {}",
                join(profile.team_identifiers.iter())
            )?;
            writeln!(writer, "TeamName: {}", profile.team_name)?;
            writeln!(writer, "UUID: {}", profile.uuid)?;
            writeln!(
                writer,
                "application-identifier: {}",
                profile.entitlements.application_identifier
            )?;
        }

        if let Some(binary) = &self.binary {
            writeln!(writer)?;
            writeln!(
                writer,
                "Binary: {} ({})",
                binary.binary_name, binary.binary_kind
            )?;
            for (i, slice) in binary.arch_slices.iter().enumerate() {
                if slice.cpu_subtype.is_empty() {
                    writeln!(writer, "  slice {}: {}", i, slice.cpu_type)?;
                } else {
                    writeln!(
                        writer,
                        "  slice {}: {} {}",
                        i, slice.cpu_type, slice.cpu_subtype
                    )?;
                }
            }
        }

        writeln!(writer)?;
        for warning in &self.warnings {
            writeln!(writer, "warning: {}", warning)?;
        }
        for error in &self.errors {
            writeln!(writer, "error: {}", error)?;
        }
        writeln!(
            writer,
            "status: {}",
            match self.status {
                ValidationStatus::Pass => "pass",
                ValidationStatus::Fail => "fail",
            }
        )?;

        Ok(())
    }
}

fn join<'a>(values: impl Iterator<Item = &'a String>) -> String {
    values.map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
}
