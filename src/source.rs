//! Handling of source files and their provenance.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;

/// A source file held as raw bytes.
///
/// The language is byte-oriented (every byte outside the nine significant
/// ones is a comment), so no decoding happens here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceFile {
    bytes: Vec<u8>,
    path: PathBuf,
}

impl SourceFile {
    /// Creates a [`SourceFile`] from its raw parts. Mostly useful for tests.
    pub fn from_raw_parts(path: PathBuf, bytes: Vec<u8>) -> SourceFile {
        SourceFile { bytes, path }
    }

    /// Reads a [`SourceFile`] from disk. The handle is released once the
    /// contents are in memory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<SourceFile, Error> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| Error::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(SourceFile {
            bytes,
            path: path.to_path_buf(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reports_path() {
        let error = SourceFile::from_file("/definitely/not/here.b").unwrap_err();
        match error {
            Error::Unreadable { path, .. } => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.b"));
            }
            other => panic!("expected Unreadable, got {other:?}"),
        }
    }

    #[test]
    fn raw_parts_round_trip() {
        let sf = SourceFile::from_raw_parts("a.b".into(), b"+-<>".to_vec());
        assert_eq!(sf.bytes(), b"+-<>");
        assert_eq!(sf.path(), Path::new("a.b"));
    }
}
