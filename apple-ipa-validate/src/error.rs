// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    std::{fmt::Formatter, path::PathBuf},
    thiserror::Error,
};

/// Broad classification of an [IpaValidateError].
///
/// Every error raised during a validation run falls into exactly one of
/// these buckets. The first four are the validation failures proper; the
/// rest describe problems with the environment or a collaborator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The unpacked archive does not have the required layout.
    Structure,
    /// The executable header is unrecognized or malformed.
    Format,
    /// A required metadata key is absent or has the wrong type.
    MissingField,
    /// Provisioning data does not authorize the application.
    Trust,
    /// Filesystem I/O failed.
    Io,
    /// The zip reader, plist decoder, or JSON encoder failed.
    Collaborator,
    /// Bad command line usage.
    Usage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Structure => "structure error",
            Self::Format => "format error",
            Self::MissingField => "missing field error",
            Self::Trust => "trust error",
            Self::Io => "I/O error",
            Self::Collaborator => "collaborator error",
            Self::Usage => "usage error",
        })
    }
}

/// Unified error type for IPA validation.
#[derive(Debug, Error)]
pub enum IpaValidateError {
    #[error("bad argument")]
    CliBadArgument,

    #[error("{0}")]
    CliGeneralError(String),

    #[error("missing payload directory: {0}")]
    MissingPayloadDirectory(PathBuf),

    #[error("no app bundle found in {0}")]
    NoAppBundle(PathBuf),

    #[error("ambiguous app bundle: {}", format_paths(.0))]
    AmbiguousAppBundle(Vec<PathBuf>),

    #[error("app bundle is not a directory: {0}")]
    AppBundleNotDirectory(PathBuf),

    #[error("missing metadata file: {0}")]
    MissingMetadataFile(PathBuf),

    #[error("executable name is not a plain file name: {0}")]
    BadExecutableName(String),

    #[error("missing executable: {0}")]
    MissingExecutable(PathBuf),

    #[error("missing provisioning profile: {0}")]
    MissingProvisioningProfile(PathBuf),

    #[error("archive entry escapes extraction directory: {0}")]
    UnsafeArchiveEntry(String),

    #[error("unknown header magic: {0:#x}")]
    UnknownMagic(u32),

    #[error("truncated header: needed {wanted} bytes at offset {offset}")]
    TruncatedHeader { offset: usize, wanted: usize },

    #[error("header field parse error: {0}")]
    Scroll(#[from] scroll::Error),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("field {key} is not {expected}")]
    FieldType { key: String, expected: &'static str },

    #[error("property list is not a dictionary: {0}")]
    PlistNotDictionary(PathBuf),

    #[error("entitlement prefix not authorized: {0}")]
    PrefixNotAuthorized(String),

    #[error("bundle id does not match provisioning app id: {bundle_id} does not match {app_id}")]
    BundleIdMismatch { bundle_id: String, app_id: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("plist error: {0}")]
    Plist(#[from] plist::Error),

    #[error("JSON serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl IpaValidateError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CliBadArgument | Self::CliGeneralError(_) => ErrorKind::Usage,
            Self::MissingPayloadDirectory(_)
            | Self::NoAppBundle(_)
            | Self::AmbiguousAppBundle(_)
            | Self::AppBundleNotDirectory(_)
            | Self::MissingMetadataFile(_)
            | Self::BadExecutableName(_)
            | Self::MissingExecutable(_)
            | Self::MissingProvisioningProfile(_)
            | Self::UnsafeArchiveEntry(_) => ErrorKind::Structure,
            Self::UnknownMagic(_) | Self::TruncatedHeader { .. } | Self::Scroll(_) => {
                ErrorKind::Format
            }
            Self::MissingField(_) | Self::FieldType { .. } | Self::PlistNotDictionary(_) => {
                ErrorKind::MissingField
            }
            Self::PrefixNotAuthorized(_) | Self::BundleIdMismatch { .. } => ErrorKind::Trust,
            Self::Io(_) => ErrorKind::Io,
            Self::Zip(_) | Self::Plist(_) | Self::SerdeJson(_) => {
                ErrorKind::Collaborator
            }
        }
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
