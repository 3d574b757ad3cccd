// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Validation of iOS application archives (`.ipa` files).
//!
//! An `.ipa` file is a zip archive containing a `Payload` directory with a
//! single `.app` bundle. This crate checks that such an archive is ready for
//! distribution:
//!
//! * The archive has the expected layout. (See [ArchiveLayout].)
//! * The bundle's `Info.plist` carries the required keys. (See [AppMetadata].)
//! * The embedded provisioning profile can be unwrapped and authorizes the
//!   bundle identifier. (See [ProvisioningVerifier], [ProvisioningMetadata],
//!   and [check_provisioning].)
//! * The main executable is a Mach-O or fat binary whose architecture slices
//!   can be enumerated. (See [BinaryInfo].)
//!
//! [ValidationPipeline] drives all of the above and produces a
//! [ValidationReport].
//!
//! Certificate chain trust is not evaluated. Opening the signed provisioning
//! profile is all that is required of it.

mod error;
pub use error::*;
mod extract;
pub use extract::*;
mod info_plist;
pub use info_plist::{read_plist_dictionary, AppMetadata};
mod layout;
pub use layout::*;
pub mod macho;
pub use macho::{ArchSlice, BinaryInfo, BinaryKind, FatArchPlacement};
mod matcher;
pub use matcher::*;
mod pipeline;
pub use pipeline::*;
mod provisioning;
pub use provisioning::*;
mod report;
pub use report::*;
mod settings;
pub use settings::*;
mod verifier;
pub use verifier::*;
