use std::io;
use std::os::raw::c_int;
use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`File`](crate::File).
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to stat {}: {source}", path.display())]
    Identity { path: PathBuf, source: io::Error },

    #[error("failed to reopen {}: {source}", path.display())]
    Reopen { path: PathBuf, source: io::Error },

    #[error("failed to write to {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("{} is closed", path.display())]
    Closed { path: PathBuf },

    #[error("failed to register handler for signal {signal}: {source}")]
    Signal { signal: c_int, source: io::Error },
}

impl Error {
    /// Underlying I/O error, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Error::Open { source, .. }
            | Error::Identity { source, .. }
            | Error::Reopen { source, .. }
            | Error::Write { source, .. }
            | Error::Signal { source, .. } => Some(source),
            Error::Closed { .. } => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed { .. })
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = err.io_error().map_or(io::ErrorKind::Other, io::Error::kind);
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_conversion_keeps_kind() {
        let err = Error::Reopen {
            path: PathBuf::from("/var/log/app.log"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        let io_err = io::Error::from(err);
        assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);
        assert!(io_err.to_string().starts_with("failed to reopen /var/log/app.log"));
    }

    #[test]
    fn closed_maps_to_other() {
        let err = Error::Closed {
            path: PathBuf::from("app.log"),
        };
        assert!(err.is_closed());
        assert!(err.io_error().is_none());
        assert_eq!(io::Error::from(err).kind(), io::ErrorKind::Other);
    }
}
