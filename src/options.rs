use std::os::raw::c_int;
use std::path::Path;

use crate::{Error, File};

/// Mode used for files the writer creates, before the process umask.
pub const DEFAULT_MODE: u32 = 0o644;

/// Options for opening a [`File`].
///
/// ```no_run
/// use logfile_reopen::OpenOptions;
/// use signal_hook::consts::SIGHUP;
///
/// let log = OpenOptions::new()
///     .mode(0o640)
///     .reopen_on(SIGHUP)
///     .open("/var/log/app/current")?;
/// # Ok::<(), logfile_reopen::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub(crate) mode: u32,
    pub(crate) signals: Vec<c_int>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            mode: DEFAULT_MODE,
            signals: Vec::new(),
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Permission bits for the file if it has to be created. Ignored on non-unix platforms.
    pub fn mode(&mut self, mode: u32) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Reopen the file on the next write after `signal` is delivered,
    /// whether or not it was rotated.
    pub fn reopen_on(&mut self, signal: c_int) -> &mut Self {
        if !self.signals.contains(&signal) {
            self.signals.push(signal);
        }
        self
    }

    pub fn open(&self, path: impl AsRef<Path>) -> Result<File, Error> {
        File::open_with(path.as_ref(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = OpenOptions::new();
        assert_eq!(opts.mode, 0o644);
        assert!(opts.signals.is_empty());
    }

    #[test]
    fn signals_are_deduplicated() {
        let mut opts = OpenOptions::new();
        opts.reopen_on(1).reopen_on(10).reopen_on(1);
        assert_eq!(opts.signals, vec![1, 10]);
    }
}
