//! Filesystem identity of an open file.
//!
//! Two handles refer to the same storage object iff their identities are equal.
//! Renames keep the identity, a delete-and-create at the same path does not.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Identity {
    dev: u64,
    ino: u64,
}

impl Identity {
    #[cfg(unix)]
    fn from_metadata(meta: &fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        Identity {
            dev: meta.dev(),
            ino: meta.ino(),
        }
    }

    // std exposes no stable file id elsewhere; only a missing path is detected.
    #[cfg(not(unix))]
    fn from_metadata(_meta: &fs::Metadata) -> Self {
        Identity { dev: 0, ino: 0 }
    }

    /// Identity of whatever `path` resolves to right now.
    ///
    /// Returns `Ok(None)` if nothing exists at `path`.
    pub(crate) fn of_path(path: &Path) -> io::Result<Option<Self>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(Self::from_metadata(&meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Identity of an open handle, independent of the path it was opened by.
    pub(crate) fn of_file(file: &fs::File) -> io::Result<Self> {
        file.metadata().map(|meta| Self::from_metadata(&meta))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn rename_keeps_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let moved = dir.path().join("log.1");
        let file = fs::File::create(&path).unwrap();
        let before = Identity::of_file(&file).unwrap();

        fs::rename(&path, &moved).unwrap();

        assert_eq!(Identity::of_path(&moved).unwrap(), Some(before));
        assert_eq!(Identity::of_path(&path).unwrap(), None);
        assert_eq!(Identity::of_file(&file).unwrap(), before);
    }

    #[test]
    fn recreate_changes_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let first = fs::File::create(&path).unwrap();
        let before = Identity::of_file(&first).unwrap();

        // keep `first` open so its inode cannot be reused
        fs::remove_file(&path).unwrap();
        fs::File::create(&path).unwrap();

        let after = Identity::of_path(&path).unwrap().unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn stat_error_other_than_missing_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::File::create(&file).unwrap();

        // a regular file used as a directory component
        let err = Identity::of_path(&file.join("log")).unwrap_err();
        assert_ne!(err.kind(), io::ErrorKind::NotFound);
    }
}
