//! Append-only log file that follows its path across external rotation.
//!
//! Tools like `logrotate` rename or delete the file a process is logging to.
//! The process keeps a perfectly writable descriptor, but everything it writes
//! lands in a file nobody can reach by name any more. [`File`] checks before
//! every write that its path still resolves to the file it holds open, and if
//! not, opens (creating if needed) a fresh file at the same path.
//!
//! ```no_run
//! use std::io::Write;
//! use std::sync::Arc;
//!
//! let log = Arc::new(logfile_reopen::File::open("/var/log/app.log")?);
//! writeln!(&*log, "started")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The check and the open are not atomic: if the file is rotated again
//! between the two, the following write notices and reopens once more.

use std::fmt;
use std::fs;
use std::io::{self, IoSlice, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

mod error;
mod identity;
mod options;

pub use error::Error;
pub use options::{OpenOptions, DEFAULT_MODE};

use identity::Identity;

/// A log file that is transparently reopened when rotated away.
///
/// All methods take `&self`; share one instance between threads with `Arc`.
/// Writes, reopens and close are serialized by an internal lock.
pub struct File {
    path: PathBuf,
    mode: u32,
    handle: Mutex<Option<Handle>>,
    should_reopen: Arc<AtomicBool>,
    sig_ids: Vec<signal_hook::SigId>,
}

/// The open descriptor and the identity it had when opened.
struct Handle {
    file: fs::File,
    identity: Identity,
}

impl Handle {
    fn open(path: &Path, mode: u32) -> io::Result<Self> {
        let mut options = fs::OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        let file = options.open(path)?;
        let identity = Identity::of_file(&file)?;
        Ok(Handle { file, identity })
    }
}

impl File {
    /// Opens `path` for appending, creating it with mode [`DEFAULT_MODE`] if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        OpenOptions::new().open(path)
    }

    /// Opens `path` for appending, creating it with `mode` if absent.
    ///
    /// Shorthand for `File::options().mode(mode).open(path)`.
    pub fn open_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self, Error> {
        OpenOptions::new().mode(mode).open(path)
    }

    /// Builder for the less common settings, see [`OpenOptions`].
    pub fn options() -> OpenOptions {
        OpenOptions::new()
    }

    pub(crate) fn open_with(path: &Path, options: &OpenOptions) -> Result<Self, Error> {
        let handle = Handle::open(path, options.mode).map_err(|source| Error::Open {
            path: path.to_owned(),
            source,
        })?;
        debug!(path = %path.display(), identity = %handle.identity, "opened log file");

        let flag = Arc::default();
        let mut sig_ids = Vec::with_capacity(options.signals.len());
        for &signal in &options.signals {
            match signal_hook::flag::register(signal, Arc::clone(&flag)) {
                Ok(id) => sig_ids.push(id),
                Err(source) => {
                    for id in sig_ids {
                        signal_hook::low_level::unregister(id);
                    }
                    return Err(Error::Signal { signal, source });
                }
            }
        }

        Ok(File {
            path: path.to_owned(),
            mode: options.mode,
            handle: Mutex::new(Some(handle)),
            should_reopen: flag,
            sig_ids,
        })
    }

    /// The path this file follows. Fixed for the life of the `File`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Permission bits used whenever the file has to be created.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Whether [`close`](File::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Appends `buf` to whatever file currently exists at the path.
    ///
    /// Like [`io::Write::write`], this may write fewer bytes than `buf.len()`.
    /// If a needed reopen fails nothing is written and the reopen is retried
    /// on the next call.
    pub fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        self.with_current(|file| file.write(buf))
    }

    /// Vectored variant of [`write`](File::write), with the same rotation check.
    pub fn write_vectored(&self, bufs: &[IoSlice<'_>]) -> Result<usize, Error> {
        self.with_current(|file| file.write_vectored(bufs))
    }

    /// Flushes the held handle without checking for rotation.
    pub fn flush(&self) -> Result<(), Error> {
        let mut guard = self.lock();
        let handle = guard.as_mut().ok_or_else(|| self.closed())?;
        handle.file.flush().map_err(|source| self.write_error(source))
    }

    /// Reopens the path unconditionally.
    pub fn reopen(&self) -> Result<(), Error> {
        let mut guard = self.lock();
        let handle = guard.as_mut().ok_or_else(|| self.closed())?;
        self.reopen_handle(handle, "requested")
    }

    /// Syncs and releases the handle. Any later operation returns [`Error::Closed`].
    pub fn close(&self) -> Result<(), Error> {
        let mut guard = self.lock();
        let handle = guard.take().ok_or_else(|| self.closed())?;
        debug!(path = %self.path.display(), identity = %handle.identity, "closing log file");
        handle
            .file
            .sync_all()
            .map_err(|source| self.write_error(source))
    }

    fn with_current<T>(
        &self,
        op: impl FnOnce(&mut fs::File) -> io::Result<T>,
    ) -> Result<T, Error> {
        let mut guard = self.lock();
        let handle = guard.as_mut().ok_or_else(|| self.closed())?;
        self.reopen_if_needed(handle)?;
        op(&mut handle.file).map_err(|source| self.write_error(source))
    }

    fn reopen_if_needed(&self, handle: &mut Handle) -> Result<(), Error> {
        if self.should_reopen.swap(false, Ordering::Relaxed) {
            return self.reopen_handle(handle, "signal").map_err(|err| {
                // not rotated, so the identity check would not retry it
                self.should_reopen.store(true, Ordering::Relaxed);
                err
            });
        }

        match Identity::of_path(&self.path) {
            Ok(Some(identity)) if identity == handle.identity => Ok(()),
            Ok(Some(_)) => self.reopen_handle(handle, "replaced"),
            Ok(None) => self.reopen_handle(handle, "missing"),
            Err(source) => Err(Error::Identity {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Replaces the stale handle. On failure the stale handle is kept.
    ///
    /// std cannot report `close(2)` errors, so the stale handle is synced
    /// first. A sync failure is only logged: the bytes went to a file that is
    /// no longer at the path, and a failed open is the error that gets returned.
    fn reopen_handle(&self, handle: &mut Handle, reason: &str) -> Result<(), Error> {
        if let Err(error) = handle.file.sync_all() {
            warn!(path = %self.path.display(), %error, "failed to sync stale log file");
        }

        let fresh = Handle::open(&self.path, self.mode).map_err(|source| Error::Reopen {
            path: self.path.clone(),
            source,
        })?;
        debug!(
            path = %self.path.display(),
            reason,
            old = %handle.identity,
            new = %fresh.identity,
            "reopened log file"
        );
        *handle = fresh;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Handle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn closed(&self) -> Error {
        Error::Closed {
            path: self.path.clone(),
        }
    }

    fn write_error(&self, source: io::Error) -> Error {
        Error::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl Drop for File {
    fn drop(&mut self) {
        for &id in &self.sig_ids {
            signal_hook::low_level::unregister(id);
        }
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .field("mode", &format_args!("{:o}", self.mode))
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Write for &File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        File::write(*self, buf).map_err(Into::into)
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        File::write_vectored(*self, bufs).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        File::flush(*self).map_err(Into::into)
    }
}

impl Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(&mut &*self, buf)
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        Write::write_vectored(&mut &*self, bufs)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut &*self)
    }
}
