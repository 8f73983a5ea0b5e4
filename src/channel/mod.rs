//! File-based synchronization channel between two processes.
//!
//! The channel is a single shared file. Its whole state is its content and its length:
//!
//! - **write** takes an exclusive advisory lock, replaces the entire content, unlocks
//! - **read** takes a shared advisory lock, reads the entire content, unlocks
//! - **wait** polls the file length until it differs from the last observed value
//!
//! There is no framing beyond "the length changed", no sequence numbers and no
//! notification mechanism. Exactly one peer on each side is assumed; concurrent writers
//! on one side would overwrite each other. Two consecutive messages of equal length are
//! indistinguishable to a poller, so writers pad with
//! [`crate::service::distinct_length`].
//!
//! Locks are scoped to the single byte operation they protect and are never held across a
//! wait.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mcsc::channel::{CancelToken, Channel, ChannelConfig};
//!
//! let config = ChannelConfig::default();
//! let channel = Channel::open(&config)?;
//! channel.write(b"/proj\ncmds.txt\n")?;
//!
//! let len = channel.wait_for_change(15, false, config.timeout, &CancelToken::new())?;
//! println!("{} byte response: {}", len, channel.read()?);
//! # Ok::<(), mcsc::Error>(())
//! ```

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{ChannelError, Result};

/// File name of the channel inside the system temp directory.
pub const DEFAULT_CHANNEL_NAME: &str = "mcsc.pipe";

/// Where the channel lives and how waits behave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Path of the shared file
    pub path: PathBuf,
    /// Sleep between two length checks
    pub poll_interval: Duration,
    /// Upper bound for client-side waits; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            path: std::env::temp_dir().join(DEFAULT_CHANNEL_NAME),
            poll_interval: Duration::from_millis(10),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl ChannelConfig {
    /// Use the shared file at `path`.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Check the length every `interval`.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Give up waiting after `timeout`; a zero duration disables the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }
}

/// Cooperative cancellation flag for channel waits.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every wait observing this token (or a clone of it).
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// `true` once [`Self::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Releases an advisory lock when dropped.
struct LockGuard<'a>(&'a File);

impl<'a> LockGuard<'a> {
    fn exclusive(file: &'a File) -> Result<Self> {
        fs2::FileExt::lock_exclusive(file).map_err(ChannelError::Lock)?;
        Ok(LockGuard(file))
    }

    fn shared(file: &'a File) -> Result<Self> {
        fs2::FileExt::lock_shared(file).map_err(ChannelError::Lock)?;
        Ok(LockGuard(file))
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(error) = fs2::FileExt::unlock(self.0) {
            log::warn!("Failed to release channel lock: {}", error);
        }
    }
}

/// One side of the shared-file channel.
#[derive(Debug)]
pub struct Channel {
    file: File,
    path: PathBuf,
    poll_interval: Duration,
}

impl Channel {
    /// Open the channel on the validator side, creating and truncating the file.
    ///
    /// # Errors
    /// Returns [`ChannelError::Open`] if the file cannot be created.
    pub fn create(config: &ChannelConfig) -> Result<Self> {
        Self::open_file(config)
    }

    /// Open the channel on the client side.
    ///
    /// The file is truncated as well, so a stale response from an earlier session can never
    /// be mistaken for the answer to the next request.
    ///
    /// # Errors
    /// Returns [`ChannelError::Open`] if the file cannot be opened.
    pub fn open(config: &ChannelConfig) -> Result<Self> {
        Self::open_file(config)
    }

    fn open_file(config: &ChannelConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&config.path)
            .map_err(|source| ChannelError::Open {
                path: config.path.clone(),
                source,
            })?;

        log::debug!("Opened channel {}", config.path.display());
        Ok(Channel {
            file,
            path: config.path.clone(),
            poll_interval: config.poll_interval,
        })
    }

    /// Path of the shared file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the shared file.
    ///
    /// # Errors
    /// Returns [`ChannelError::Io`] if the file cannot be queried.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata().map_err(ChannelError::Io)?.len())
    }

    /// `true` if the shared file is empty.
    ///
    /// # Errors
    /// Returns [`ChannelError::Io`] if the file cannot be queried.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Replace the entire content with `data` under an exclusive lock.
    ///
    /// # Errors
    /// Returns [`ChannelError::Lock`] or [`ChannelError::Io`].
    pub fn write(&self, data: &[u8]) -> Result<()> {
        let _lock = LockGuard::exclusive(&self.file)?;
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0)).map_err(ChannelError::Io)?;
        file.write_all(data).map_err(ChannelError::Io)?;
        file.set_len(data.len() as u64).map_err(ChannelError::Io)?;
        file.flush().map_err(ChannelError::Io)?;
        Ok(())
    }

    /// Read the entire content under a shared lock.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    /// Returns [`ChannelError::Lock`] or [`ChannelError::Io`].
    pub fn read(&self) -> Result<String> {
        let _lock = LockGuard::shared(&self.file)?;
        let mut file = &self.file;
        let mut data = Vec::new();
        file.seek(SeekFrom::Start(0)).map_err(ChannelError::Io)?;
        file.read_to_end(&mut data).map_err(ChannelError::Io)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Block until the length differs from `observed` and return the new length.
    ///
    /// With `require_data`, a length of zero does not count as a change. No lock is held
    /// while waiting.
    ///
    /// # Errors
    /// Returns [`ChannelError::Cancelled`] once `cancel` is set, [`ChannelError::TimedOut`]
    /// when `timeout` elapses first, and [`ChannelError::Io`] if the length cannot be read.
    pub fn wait_for_change(
        &self,
        observed: u64,
        require_data: bool,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<u64> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(ChannelError::Cancelled.into());
            }

            let len = self.len()?;
            if len != observed && (len != 0 || !require_data) {
                return Ok(len);
            }

            if let Some(timeout) = timeout {
                if started.elapsed() >= timeout {
                    return Err(ChannelError::TimedOut(timeout).into());
                }
            }
            thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn config(dir: &tempfile::TempDir) -> ChannelConfig {
        ChannelConfig::default()
            .with_path(dir.path().join("test.pipe"))
            .with_poll_interval(Duration::from_millis(1))
    }

    #[test]
    fn test_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let channel = Channel::create(&config(&dir)).unwrap();
        assert!(channel.is_empty().unwrap());

        channel.write(b"a much longer message\n").unwrap();
        channel.write(b"short\n").unwrap();
        assert_eq!(channel.read().unwrap(), "short\n");
        assert_eq!(channel.len().unwrap(), 6);
    }

    #[test]
    fn test_peers_see_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let server = Channel::create(&config).unwrap();
        let client = Channel::open(&config).unwrap();

        client.write(b"/proj\ncmds.txt\n").unwrap();
        let len = server
            .wait_for_change(0, true, Some(Duration::from_secs(1)), &CancelToken::new())
            .unwrap();
        assert_eq!(len, 15);
        assert_eq!(server.read().unwrap(), "/proj\ncmds.txt\n");
    }

    #[test]
    fn test_wait_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let channel = Channel::create(&config(&dir)).unwrap();
        let result =
            channel.wait_for_change(0, false, Some(Duration::from_millis(20)), &CancelToken::new());
        assert!(matches!(
            result,
            Err(Error::Channel(ChannelError::TimedOut(_)))
        ));
    }

    #[test]
    fn test_wait_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let channel = Channel::create(&config(&dir)).unwrap();
        let token = CancelToken::new();

        let canceller = token.clone();
        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });

        let result = channel.wait_for_change(0, true, None, &token);
        thread.join().unwrap();
        assert!(matches!(result, Err(Error::Channel(ChannelError::Cancelled))));
    }

    #[test]
    fn test_require_data_ignores_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let channel = Channel::create(&config(&dir)).unwrap();
        channel.write(b"x").unwrap();
        channel.write(b"").unwrap();

        let result =
            channel.wait_for_change(1, true, Some(Duration::from_millis(20)), &CancelToken::new());
        assert!(matches!(
            result,
            Err(Error::Channel(ChannelError::TimedOut(_)))
        ));
        assert_eq!(
            channel
                .wait_for_change(1, false, None, &CancelToken::new())
                .unwrap(),
            0
        );
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = ChannelConfig::default().with_timeout(Duration::ZERO);
        assert_eq!(config.timeout, None);
        assert!(config.path.ends_with(DEFAULT_CHANNEL_NAME));
    }

    #[test]
    fn test_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChannelConfig::default().with_path(dir.path().join("missing/dir/x.pipe"));
        assert!(matches!(
            Channel::open(&config),
            Err(Error::Channel(ChannelError::Open { .. }))
        ));
    }
}
