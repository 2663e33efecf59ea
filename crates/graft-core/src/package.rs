//! Read access to plugin package archives.
//!
//! A package is a zip archive. The descriptor sits at a fixed path inside it
//! (by convention [`DESCRIPTOR_NAME`]); the core package additionally bundles
//! descriptors for internal plugins under [`INTERNAL_PLUGINS_PREFIX`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::PackageError;

/// Path of the plugin descriptor inside a package.
pub const DESCRIPTOR_NAME: &str = "metadata.yml";

/// File extension of plugin packages in the plugins directory.
pub const PACKAGE_EXTENSION: &str = "zip";

/// Directory inside the core package that holds bundled internal descriptors.
pub const INTERNAL_PLUGINS_PREFIX: &str = "internal-plugins/";

/// Suffix of bundled internal descriptors.
pub const INTERNAL_PLUGINS_SUFFIX: &str = ".yml";

/// Largest entry [`PluginPackage::read`] will load, in bytes.
pub const MAX_ENTRY_SIZE: u64 = 16 * 1024 * 1024;

/// An open plugin package.
pub struct PluginPackage {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
}

impl std::fmt::Debug for PluginPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginPackage")
            .field("path", &self.path)
            .field("entries", &self.archive.len())
            .finish()
    }
}

impl PluginPackage {
    /// Opens the archive at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PackageError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| PackageError::Open {
            path: path.clone(),
            source,
        })?;
        let archive =
            ZipArchive::new(BufReader::new(file)).map_err(|source| PackageError::Archive {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, archive })
    }

    /// Returns the path this package was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the names of all file entries, directories excluded, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    /// Returns the sorted file entries whose names start with `prefix` and
    /// end with `suffix`.
    pub fn file_names_matching(&self, prefix: &str, suffix: &str) -> Vec<String> {
        self.file_names()
            .into_iter()
            .filter(|name| name.starts_with(prefix) && name.ends_with(suffix))
            .collect()
    }

    /// Reads an entry into memory.
    ///
    /// Returns `Ok(None)` when the archive has no entry with that name. The
    /// size recorded in the archive is not trusted: at most
    /// [`MAX_ENTRY_SIZE`] bytes are read, anything larger is an error.
    pub fn read(&mut self, entry: &str) -> Result<Option<Vec<u8>>, PackageError> {
        let mut file = match self.archive.by_name(entry) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(source) => {
                return Err(PackageError::Archive {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let mut data = Vec::with_capacity(file.size().min(MAX_ENTRY_SIZE) as usize);
        (&mut file)
            .take(MAX_ENTRY_SIZE + 1)
            .read_to_end(&mut data)
            .map_err(|source| PackageError::Entry {
                path: self.path.clone(),
                entry: entry.to_string(),
                source,
            })?;

        if data.len() as u64 > MAX_ENTRY_SIZE {
            return Err(PackageError::EntryTooLarge {
                path: self.path.clone(),
                entry: entry.to_string(),
                limit: MAX_ENTRY_SIZE,
            });
        }
        Ok(Some(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_package;

    #[test]
    fn test_read_and_list_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.zip");
        write_package(
            &path,
            &[
                (DESCRIPTOR_NAME, "id: sample\n"),
                ("internal-plugins/a.yml", "id: a\n"),
                ("internal-plugins/notes.txt", "ignored"),
            ],
        );

        let mut package = PluginPackage::open(&path).unwrap();
        assert_eq!(package.file_names().len(), 3);
        assert_eq!(
            package.file_names_matching(INTERNAL_PLUGINS_PREFIX, INTERNAL_PLUGINS_SUFFIX),
            vec!["internal-plugins/a.yml".to_string()]
        );
        assert_eq!(
            package.read(DESCRIPTOR_NAME).unwrap().as_deref(),
            Some("id: sample\n".as_bytes())
        );
        assert!(package.read("missing.yml").unwrap().is_none());
    }

    /// CRC-32 (IEEE), for hand-assembled archives.
    fn crc32(data: &[u8]) -> u32 {
        let mut crc = !0u32;
        for byte in data {
            crc ^= u32::from(*byte);
            for _ in 0..8 {
                crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            }
        }
        !crc
    }

    /// Writes a single stored entry whose zip64 central record claims an
    /// uncompressed size of `declared_size`.
    fn write_lying_package(path: &Path, name: &str, data: &[u8], declared_size: u64) {
        let crc = crc32(data);
        let name_len = name.len() as u16;
        let mut out = Vec::new();

        // local file header
        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&45u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&name_len.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);

        // central directory
        let cd_offset = out.len() as u32;
        out.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        out.extend_from_slice(&45u16.to_le_bytes());
        out.extend_from_slice(&45u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        out.extend_from_slice(&name_len.to_le_bytes());
        out.extend_from_slice(&12u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&0x0001u16.to_le_bytes());
        out.extend_from_slice(&8u16.to_le_bytes());
        out.extend_from_slice(&declared_size.to_le_bytes());
        let cd_size = out.len() as u32 - cd_offset;

        // end of central directory
        out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());

        std::fs::write(path, out).unwrap();
    }

    #[test]
    fn test_read_ignores_declared_entry_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.zip");
        write_lying_package(&path, DESCRIPTOR_NAME, b"id: huge\n", u64::MAX);

        // Must not allocate from the header; the real bytes or an error are both fine.
        let mut package = PluginPackage::open(&path).unwrap();
        match package.read(DESCRIPTOR_NAME) {
            Ok(Some(data)) => assert_eq!(data, b"id: huge\n"),
            Ok(None) => panic!("entry should exist"),
            Err(_) => {}
        }
    }

    #[test]
    fn test_open_rejects_non_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.zip");
        std::fs::write(&path, b"not a zip file").unwrap();

        assert!(matches!(
            PluginPackage::open(&path),
            Err(PackageError::Archive { .. })
        ));
    }
}
