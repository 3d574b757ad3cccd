// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Unwrapping signed provisioning profiles.

A provisioning profile is a DER encoded CMS `SignedData` message. Its
encapsulated content is the property list we want. Verifiers in this module
extract that content to a file.

Verifiers deliberately do not evaluate the signer's certificate chain. They
only report whether the message could be opened. The result mirrors an
external tool: an exit status (0 for success) and the path the plaintext
plist was written to.
*/

use {
    crate::{
        error::IpaValidateError,
        settings::{ValidationSettings, VerifierKind},
    },
    cryptographic_message_syntax::SignedData,
    log::{debug, warn},
    std::path::{Path, PathBuf},
};

/// File name used for the unwrapped plist inside the work directory.
const PLAINTEXT_PLIST_NAME: &str = "embedded_prov.plist";

/// Outcome of running a [ProvisioningVerifier].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerifierOutput {
    /// 0 on success. Anything else means no usable plist was produced.
    pub status: i32,

    /// Where the plaintext plist was (or would have been) written.
    pub plist_path: PathBuf,

    /// Diagnostic text describing a failure.
    pub detail: Option<String>,
}

impl VerifierOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Turns a signed provisioning profile into a plaintext property list.
pub trait ProvisioningVerifier {
    /// Unwrap the message at `signed_message`, writing into `work_dir`.
    ///
    /// `Err` is reserved for failures to run the verifier at all. A message
    /// that can't be opened is reported through [VerifierOutput::status].
    fn verify(
        &self,
        signed_message: &Path,
        work_dir: &Path,
    ) -> Result<VerifierOutput, IpaValidateError>;
}

/// Parses the CMS message in process.
#[derive(Clone, Copy, Debug, Default)]
pub struct CmsProvisioningVerifier;

impl ProvisioningVerifier for CmsProvisioningVerifier {
    fn verify(
        &self,
        signed_message: &Path,
        work_dir: &Path,
    ) -> Result<VerifierOutput, IpaValidateError> {
        let plist_path = work_dir.join(PLAINTEXT_PLIST_NAME);
        let data = std::fs::read(signed_message)?;

        let failure = |detail: String| -> Result<VerifierOutput, IpaValidateError> {
            warn!("unable to unwrap {}: {}", signed_message.display(), detail);
            Ok(VerifierOutput {
                status: 1,
                plist_path: plist_path.clone(),
                detail: Some(detail),
            })
        };

        let signed_data = match SignedData::parse_ber(&data) {
            Ok(signed_data) => signed_data,
            Err(e) => return failure(format!("CMS parse error: {}", e)),
        };

        let content = match signed_data.signed_content() {
            Some(content) => content,
            None => return failure("CMS message has no encapsulated content".into()),
        };

        debug!(
            "writing {} bytes of provisioning plist to {}",
            content.len(),
            plist_path.display()
        );
        std::fs::write(&plist_path, content)?;

        Ok(VerifierOutput {
            status: 0,
            plist_path,
            detail: None,
        })
    }
}

/// Runs `openssl smime` to unwrap the message.
#[derive(Clone, Debug)]
pub struct OpensslProvisioningVerifier {
    openssl_exe: PathBuf,
}

impl Default for OpensslProvisioningVerifier {
    fn default() -> Self {
        Self::new("openssl")
    }
}

impl OpensslProvisioningVerifier {
    pub fn new(openssl_exe: impl AsRef<Path>) -> Self {
        Self {
            openssl_exe: openssl_exe.as_ref().to_path_buf(),
        }
    }

    /// Arguments passed to `openssl`.
    pub fn arguments(&self, signed_message: &Path, plist_path: &Path) -> Vec<String> {
        vec![
            "smime".into(),
            "-inform".into(),
            "der".into(),
            "-verify".into(),
            "-noverify".into(),
            "-in".into(),
            signed_message.display().to_string(),
            "-out".into(),
            plist_path.display().to_string(),
        ]
    }
}

impl ProvisioningVerifier for OpensslProvisioningVerifier {
    fn verify(
        &self,
        signed_message: &Path,
        work_dir: &Path,
    ) -> Result<VerifierOutput, IpaValidateError> {
        let plist_path = work_dir.join(PLAINTEXT_PLIST_NAME);
        let args = self.arguments(signed_message, &plist_path);

        debug!("running {} {}", self.openssl_exe.display(), args.join(" "));
        let output = duct::cmd(&self.openssl_exe, args)
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .run()?;

        let status = output.status.code().unwrap_or(-1);
        let detail = if status == 0 {
            None
        } else {
            let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
            warn!("openssl exited with status {}: {}", status, text);
            Some(text)
        };

        Ok(VerifierOutput {
            status,
            plist_path,
            detail,
        })
    }
}

/// Construct the verifier selected by settings.
pub fn verifier_from_settings(settings: &ValidationSettings) -> Box<dyn ProvisioningVerifier> {
    match settings.verifier() {
        VerifierKind::Native => Box::new(CmsProvisioningVerifier),
        VerifierKind::Openssl => Box::new(OpensslProvisioningVerifier::new(settings.openssl_exe())),
    }
}
