//! Output storage with bounded retries and atomic commits.

use std::fmt::Display;
use std::io;
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use geoflag_fs::{ensure_dir, list_files, write_committed};
use log::warn;
use thiserror::Error;

const DEFAULT_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Errors raised by [`FileStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// Every attempt to write a file failed.
    #[error("failed to write {path} after {attempts} attempts")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Destination path.
        path: Utf8PathBuf,
        /// Error from the final attempt.
        #[source]
        source: io::Error,
    },
    /// The file name would leave the store root.
    #[error("invalid output file name {name:?}")]
    InvalidName {
        /// Rejected name.
        name: String,
    },
    /// Reading from the store failed.
    #[error("failed to read {path}")]
    Read {
        /// Path being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Fixed attempt count with quadratic backoff.
///
/// After failed attempt `n` the caller waits `base_delay * n²`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use geoflag_data::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.attempts(), 5);
/// assert_eq!(policy.delay_after(3), Duration::from_secs(9));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// A policy with explicit limits. Zero attempts is treated as one.
    #[must_use]
    pub const fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            base_delay,
        }
    }

    /// Set the attempt count.
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the base delay.
    #[must_use]
    pub const fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Attempts made before giving up.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Base delay.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Wait after failed attempt `attempt` (1-based).
    #[must_use]
    pub const fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(attempt.saturating_mul(attempt))
    }

    /// Run `operation` until it succeeds or the attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the error of the final attempt.
    pub fn run<T, E: Display>(
        &self,
        label: &str,
        mut operation: impl FnMut() -> Result<T, E>,
    ) -> Result<T, E> {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts => {
                    let wait = self.delay_after(attempt);
                    warn!(
                        "{label} failed on attempt {attempt} of {attempts}: {err}; retrying in {wait:?}"
                    );
                    thread::sleep(wait);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// A directory that receives committed output files.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: Utf8PathBuf,
    retry: RetryPolicy,
}

impl FileStore {
    /// A store rooted at `root`, created on first write.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Store root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Write `bytes` to `<root>/<name>` through the staging directory.
    ///
    /// Directory creation, the staged write and the rename are retried
    /// together.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] for names with path components
    /// and [`StorageError::Exhausted`] when every attempt fails.
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<Utf8PathBuf, StorageError> {
        validate_name(name)?;
        let path = self.root.join(name);
        self.retry
            .run(&format!("writing {path}"), || {
                let dir = ensure_dir(&self.root)?;
                write_committed(&dir, name, bytes)
            })
            .map_err(|source| StorageError::Exhausted {
                attempts: self.retry.attempts(),
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Read a committed file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] when the file cannot be read.
    pub fn read_to_string(&self, name: &str) -> Result<String, StorageError> {
        validate_name(name)?;
        let path = self.root.join(name);
        ensure_dir(&self.root)
            .and_then(|dir| dir.read_to_string(name))
            .map_err(|source| StorageError::Read { path, source })
    }

    /// Committed files with `extension`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] when the root cannot be listed.
    pub fn list(&self, extension: &str) -> Result<Vec<String>, StorageError> {
        ensure_dir(&self.root)
            .and_then(|dir| list_files(&dir, extension))
            .map_err(|source| StorageError::Read {
                path: self.root.clone(),
                source,
            })
    }
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    let plain = Utf8Path::new(name).file_name() == Some(name);
    if plain && !name.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(StorageError::InvalidName {
            name: name.to_owned(),
        })
    }
}
