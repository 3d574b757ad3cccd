// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extraction of `.ipa` zip archives.

use {
    crate::error::IpaValidateError,
    log::{debug, info},
    std::{
        fs::File,
        io::{Read, Seek},
        path::{Path, PathBuf},
    },
};

/// Materializes the contents of an archive on the filesystem.
pub trait ArchiveExtractor {
    /// Extract `archive` into `dest_dir`, returning the extraction root.
    ///
    /// All content must be written before this returns.
    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<PathBuf, IpaValidateError>;
}

/// Extracts zip archives with the `zip` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<PathBuf, IpaValidateError> {
        info!("extracting {} to {}", archive.display(), dest_dir.display());

        let fh = File::open(archive)?;
        extract_zip(fh, dest_dir)?;

        Ok(dest_dir.to_path_buf())
    }
}

/// Extract zip data from a reader into a directory.
///
/// Entries whose names would resolve outside `dest_dir` are rejected.
pub fn extract_zip<R: Read + Seek>(reader: R, dest_dir: &Path) -> Result<(), IpaValidateError> {
    let mut za = zip::ZipArchive::new(reader)?;

    for i in 0..za.len() {
        let mut file = za.by_index(i)?;

        let relative = file
            .enclosed_name()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| IpaValidateError::UnsafeArchiveEntry(file.name().to_string()))?;
        let dest_path = dest_dir.join(&relative);

        if file.is_dir() {
            std::fs::create_dir_all(&dest_path)?;
            continue;
        }

        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        debug!("writing {}", dest_path.display());
        let mut fh = File::create(&dest_path)?;
        std::io::copy(&mut file, &mut fh)?;

        // Keep executable bits. Entries lacking owner permissions keep the
        // defaults so they stay readable.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            if let Some(mode) = file.unix_mode().filter(|mode| mode & 0o700 != 0) {
                std::fs::set_permissions(
                    &dest_path,
                    std::fs::Permissions::from_mode(mode & 0o777),
                )?;
            }
        }
    }

    Ok(())
}
