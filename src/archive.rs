//! Read-only access to rule entries inside a zip-like archive.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::PatchError;

/// An archive opened for reading. Dropping it releases the file handle.
pub struct JarReader {
    archive: ZipArchive<File>,
}

/// Archive entry names never start with a separator
pub fn normalize_entry(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl JarReader {
    pub fn open(path: &Path) -> Result<Self, PatchError> {
        let file = File::open(path).map_err(|e| PatchError::io(path, e))?;
        let archive = ZipArchive::new(file)?;
        Ok(Self { archive })
    }

    /// True when the entry exists and is a file
    pub fn contains(&mut self, entry: &str) -> Result<bool, PatchError> {
        match self.archive.by_name(normalize_entry(entry)) {
            Ok(file) => Ok(!file.is_dir()),
            Err(ZipError::FileNotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn read_to_string(&mut self, entry: &str) -> Result<String, PatchError> {
        let name = normalize_entry(entry);
        let mut file = self.archive.by_name(name)?;
        let mut text = String::new();
        file.read_to_string(&mut text)
            .map_err(|e| PatchError::io(name, e))?;
        Ok(text)
    }
}
