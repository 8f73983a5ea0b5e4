//! The validator service embedded in the host process.
//!
//! The injected hook call hands the host root object to [`init`], which starts a
//! dedicated thread and returns at once. The thread owns the validator side of the
//! [`crate::channel::Channel`] and cycles through:
//!
//! ```text
//! Idle ──(length changed, non-zero)──▶ Processing ──▶ Reporting ──▶ Idle
//! ```
//!
//! Failing to open the channel or to resolve the grammar ends the thread, never the host.
//! Any failure while serving a single request is logged and the loop carries on waiting
//! for the next one.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mcsc::bridge::{ObjectHandle, Runtime};
//! use mcsc::service::{ServiceConfig, ValidatorService};
//!
//! # fn host_root() -> ObjectHandle { ObjectHandle::new("net.minecraft.server.MinecraftServer", ()) }
//! let runtime = Arc::new(Runtime::new());
//! // ... host registers its types ...
//! let service = ValidatorService::new(ServiceConfig::default(), runtime);
//! let handle = service.start(host_root())?;
//! // ... host runs ...
//! handle.stop();
//! # Ok::<(), mcsc::Error>(())
//! ```

mod config;
mod protocol;

pub use config::ServiceConfig;
pub use protocol::{distinct_length, Request, Response, SUCCESS};

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use strum::{Display, FromRepr};

use crate::{
    bridge::{ObjectHandle, Runtime},
    channel::{CancelToken, Channel},
    validator::{check_batch, Grammar},
    ChannelError, Error, Result,
};

/// Name of the service thread.
const THREAD_NAME: &str = "mcsc-validator";

/// Longest pause between two polls while the channel keeps failing.
const MAX_POLL_BACKOFF: Duration = Duration::from_secs(5);

/// Set by the first successful [`init`] or [`init_with`] of the process.
static HOOK_STARTED: AtomicBool = AtomicBool::new(false);

/// Pause before the next poll after `failures` consecutive poll errors.
fn poll_backoff(interval: Duration, failures: u32) -> Duration {
    interval
        .saturating_mul(1u32 << failures.min(16))
        .min(MAX_POLL_BACKOFF)
}

/// Where the service loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum ServiceState {
    /// Opening the channel and resolving the grammar
    Starting,
    /// Waiting for the channel length to change
    Idle,
    /// Checking the files of a request
    Processing,
    /// Writing the response
    Reporting,
    /// The thread has exited
    Stopped,
}

/// Shared view of the loop's [`ServiceState`].
#[derive(Debug, Clone)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        StateCell(Arc::new(AtomicU8::new(ServiceState::Starting as u8)))
    }

    fn set(&self, state: ServiceState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    fn get(&self) -> ServiceState {
        ServiceState::from_repr(self.0.load(Ordering::SeqCst)).unwrap_or(ServiceState::Stopped)
    }
}

/// A validator that can be started once.
pub struct ValidatorService {
    config: ServiceConfig,
    runtime: Arc<Runtime>,
    started: AtomicBool,
}

impl ValidatorService {
    /// Create a service over the host's bridge runtime.
    #[must_use]
    pub fn new(config: ServiceConfig, runtime: Arc<Runtime>) -> Self {
        ValidatorService {
            config,
            runtime,
            started: AtomicBool::new(false),
        }
    }

    /// Spawn the service thread for `host_root` and return without waiting for it.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyStarted`] on every call after the first, and
    /// [`Error::FileError`] if the thread cannot be spawned.
    pub fn start(&self, host_root: ObjectHandle) -> Result<ServiceHandle> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }

        let state = StateCell::new();
        let cancel = CancelToken::new();
        let worker = Worker {
            config: self.config.clone(),
            runtime: Arc::clone(&self.runtime),
            host_root,
            state: state.clone(),
            cancel: cancel.clone(),
        };

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                worker.run();
                worker.state.set(ServiceState::Stopped);
            })?;

        Ok(ServiceHandle {
            state,
            cancel,
            thread,
        })
    }
}

/// Control over a running service thread.
///
/// Dropping the handle detaches the thread; it keeps serving for the life of the process.
#[derive(Debug)]
pub struct ServiceHandle {
    state: StateCell,
    cancel: CancelToken,
    thread: JoinHandle<()>,
}

impl ServiceHandle {
    /// Current state of the loop.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.state.get()
    }

    /// Poll until the loop reaches `state` or `timeout` elapses. Returns whether it did.
    #[must_use]
    pub fn wait_for_state(&self, state: ServiceState, timeout: Duration) -> bool {
        let started = Instant::now();
        loop {
            let current = self.state();
            if current == state {
                return true;
            }
            if current == ServiceState::Stopped || started.elapsed() >= timeout {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Cancel the pending wait and join the thread.
    ///
    /// A request already being processed is finished first.
    pub fn stop(self) {
        self.cancel.cancel();
        if self.thread.join().is_err() {
            log::error!("Validator thread panicked");
        }
        self.state.set(ServiceState::Stopped);
    }
}

/// Everything the service thread owns.
struct Worker {
    config: ServiceConfig,
    runtime: Arc<Runtime>,
    host_root: ObjectHandle,
    state: StateCell,
    cancel: CancelToken,
}

impl Worker {
    fn run(&self) {
        let channel = match Channel::create(&self.config.channel) {
            Ok(channel) => channel,
            Err(error) => {
                log::error!("Validator could not open its channel: {}", error);
                return;
            }
        };

        let grammar = match Grammar::resolve(
            Arc::clone(&self.runtime),
            &self.host_root,
            self.config.symbols.clone(),
        ) {
            Ok(grammar) => grammar,
            Err(error) => {
                log::error!("Validator could not resolve the command grammar: {}", error);
                return;
            }
        };

        log::info!("========================================");
        log::info!("  mcsc validator is running");
        log::info!("  channel: {}", channel.path().display());
        log::info!("========================================");

        let mut observed = 0;
        let mut poll_failures = 0u32;
        loop {
            self.state.set(ServiceState::Idle);
            match channel.wait_for_change(observed, true, None, &self.cancel) {
                Ok(_) => {
                    if poll_failures > 0 {
                        log::info!("Validator channel recovered after {} failed polls", poll_failures);
                        poll_failures = 0;
                    }
                }
                Err(Error::Channel(ChannelError::Cancelled)) => break,
                Err(error) => {
                    // Only the first failure of a streak is worth an error line
                    if poll_failures == 0 {
                        log::error!("Validator could not poll its channel: {}", error);
                    } else {
                        log::debug!("Validator could not poll its channel: {}", error);
                    }
                    thread::sleep(poll_backoff(self.config.channel.poll_interval, poll_failures));
                    poll_failures = poll_failures.saturating_add(1);
                    continue;
                }
            }

            self.state.set(ServiceState::Processing);
            observed = match self.serve(&channel, &grammar) {
                Ok(written) => written,
                Err(error) => {
                    log::error!("Validator failed to serve a request: {}", error);
                    channel.len().unwrap_or(observed)
                }
            };
        }
        log::info!("Validator stopped");
    }

    /// Handle the request currently in the channel and return the length after replying.
    fn serve(&self, channel: &Channel, grammar: &Grammar) -> Result<u64> {
        let text = channel.read()?;
        let request_len = channel.len()?;
        let request = Request::decode(&text)?;
        log::info!(
            "Checking {} file(s) in {}",
            request.paths.len(),
            request.cwd.display()
        );

        let diagnostics = check_batch(grammar, &request.cwd, &request.paths)?;
        for diagnostic in &diagnostics {
            log::debug!("{}", diagnostic);
        }

        self.state.set(ServiceState::Reporting);
        let response = Response::from_diagnostics(&diagnostics);
        let payload = distinct_length(response.encode(), request_len);
        channel.write(payload.as_bytes())?;
        channel.len()
    }
}

/// Start a validator with the default configuration for `host_root`.
///
/// This is what the injected hook call ends up in; it returns immediately. See
/// [`init_with`] for the once-per-process rule.
///
/// # Errors
/// Returns [`Error::AlreadyStarted`] if a validator was already started through this
/// entry point, or [`Error::FileError`] if the service thread cannot be spawned.
pub fn init(runtime: Arc<Runtime>, host_root: ObjectHandle) -> Result<ServiceHandle> {
    init_with(ServiceConfig::default(), runtime, host_root)
}

/// Start a validator with `config` for `host_root`.
///
/// Only the first call in a process starts a validator. A second one would open the
/// same channel again and truncate it under the first, so every later call returns
/// [`Error::AlreadyStarted`]. Services created directly with [`ValidatorService::new`]
/// are not covered by this guard.
///
/// # Errors
/// Returns [`Error::AlreadyStarted`] on every call after the first successful one, or
/// [`Error::FileError`] if the service thread cannot be spawned.
pub fn init_with(
    config: ServiceConfig,
    runtime: Arc<Runtime>,
    host_root: ObjectHandle,
) -> Result<ServiceHandle> {
    if HOOK_STARTED.swap(true, Ordering::SeqCst) {
        log::warn!("Validator hook called again, ignoring");
        return Err(Error::AlreadyStarted);
    }
    let started = ValidatorService::new(config, runtime).start(host_root);
    if started.is_err() {
        HOOK_STARTED.store(false, Ordering::SeqCst);
    }
    started
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::ChannelConfig,
        client::Client,
        test::host::MockHost,
        validator::GrammarSymbols,
    };

    fn config(dir: &tempfile::TempDir) -> ServiceConfig {
        ServiceConfig::default().with_channel(
            ChannelConfig::default()
                .with_path(dir.path().join("service.pipe"))
                .with_poll_interval(Duration::from_millis(1))
                .with_timeout(Duration::from_secs(10)),
        )
    }

    fn start(config: ServiceConfig) -> ServiceHandle {
        let host = MockHost::new();
        let handle = ValidatorService::new(config, host.runtime())
            .start(host.server())
            .unwrap();
        assert!(handle.wait_for_state(ServiceState::Idle, Duration::from_secs(10)));
        handle
    }

    #[test]
    fn test_start_twice() {
        let dir = tempfile::tempdir().unwrap();
        let host = MockHost::new();
        let service = ValidatorService::new(config(&dir), host.runtime());
        let handle = service.start(host.server()).unwrap();
        assert!(matches!(
            service.start(host.server()),
            Err(Error::AlreadyStarted)
        ));
        handle.stop();
    }

    #[test]
    fn test_serves_requests() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.txt"), "say hi\n").unwrap();
        std::fs::write(dir.path().join("bad.txt"), "gibe item minecraft:apple\n").unwrap();

        let config = config(&dir);
        let handle = start(config.clone());
        let client = Client::connect(&config.channel).unwrap();
        let cancel = CancelToken::new();

        let response = client
            .check(&Request::new(dir.path(), ["good.txt"]), &cancel)
            .unwrap();
        assert!(response.is_success());

        let response = client
            .check(&Request::new(dir.path(), ["good.txt", "bad.txt"]), &cancel)
            .unwrap();
        assert_eq!(
            response.encode(),
            "bad.txt:1: Unknown command\n    gibe item minecraft:apple<--[HERE]\n"
        );

        handle.stop();
    }

    #[test]
    fn test_unresolvable_grammar_stops_thread() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir)
            .with_symbols(GrammarSymbols::default().with_accessor_chain(["getNothing"]));
        let host = MockHost::new();
        let handle = ValidatorService::new(config, host.runtime())
            .start(host.server())
            .unwrap();
        assert!(!handle.wait_for_state(ServiceState::Idle, Duration::from_secs(10)));
        assert_eq!(handle.state(), ServiceState::Stopped);
        handle.stop();
    }

    #[test]
    fn test_bad_request_keeps_serving() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.txt"), "op Alex\n").unwrap();

        let config = config(&dir);
        let handle = start(config.clone());
        let peer = Channel::open(&config.channel).unwrap();

        // Whitespace only: read, rejected, never answered
        peer.write(b" \n \n").unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(peer.read().unwrap(), " \n \n");

        let request = Request::new(dir.path(), ["ok.txt"]).encode();
        peer.write(request.as_bytes()).unwrap();
        peer.wait_for_change(
            request.len() as u64,
            true,
            Some(Duration::from_secs(10)),
            &CancelToken::new(),
        )
        .unwrap();
        assert!(Response::decode(&peer.read().unwrap()).is_success());
        handle.stop();
    }

    #[test]
    fn test_response_padded_past_request() {
        let dir = tempfile::tempdir().unwrap();
        let long_line = format!("gibe {}", "a".repeat(200));
        std::fs::write(dir.path().join("bad.txt"), format!("{long_line}\n")).unwrap();

        let config = config(&dir);
        let handle = start(config.clone());
        let peer = Channel::open(&config.channel).unwrap();
        let cancel = CancelToken::new();
        let timeout = Some(Duration::from_secs(10));

        let first = Request::new(dir.path(), ["bad.txt"]).encode();
        peer.write(first.as_bytes()).unwrap();
        let first_response = peer
            .wait_for_change(first.len() as u64, true, timeout, &cancel)
            .unwrap();

        // "./bad.txt" lengthens the response by two; pad the cwd with separators until
        // the request is exactly as long as its own natural response
        let natural = first_response + 2;
        let base = Request::new(dir.path(), ["./bad.txt"]).encode().len() as u64;
        assert!(natural > base, "bad line too short for this temp dir");
        let cwd = format!(
            "{}{}",
            dir.path().display(),
            "/".repeat(usize::try_from(natural - base).unwrap())
        );
        let second = Request::new(cwd, ["./bad.txt"]).encode();
        assert_eq!(second.len() as u64, natural);

        peer.write(second.as_bytes()).unwrap();
        let len = peer
            .wait_for_change(natural, true, timeout, &cancel)
            .unwrap();
        assert_eq!(len, natural + 1);
        let response = Response::decode(&peer.read().unwrap());
        assert_eq!(response.error_count(), 1);
        assert!(response.lines().next().unwrap().starts_with("./bad.txt:1: "));

        handle.stop();
    }

    #[test]
    fn test_sequential_requests_of_equal_length() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.txt"), "say hi\n").unwrap();
        std::fs::write(dir.path().join("bad.txt"), "gibe item minecraft:apple\n").unwrap();

        let config = config(&dir);
        let handle = start(config.clone());
        let client = Client::connect(&config.channel).unwrap();
        let cancel = CancelToken::new();

        let first = client
            .check(&Request::new(dir.path(), ["bad.txt"]), &cancel)
            .unwrap();
        let previous = first.encode().len();

        // A request for good.txt exactly as long as the response still in the channel
        let base = Request::new(dir.path(), ["./good.txt"]).encode().len();
        assert!(previous > base);
        let path = format!(".{}good.txt", "/".repeat(previous - base + 1));
        let request = Request::new(dir.path(), [path]);
        assert_eq!(request.encode().len(), previous);

        assert!(client.check(&request, &cancel).unwrap().is_success());
        handle.stop();
    }

    #[test]
    fn test_init_once_per_process() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ok.txt"), "say hi\n").unwrap();
        let config = config(&dir);
        let host = MockHost::new();

        let handle = init_with(config.clone(), host.runtime(), host.server()).unwrap();
        assert!(handle.wait_for_state(ServiceState::Idle, Duration::from_secs(10)));
        assert!(matches!(
            init_with(config.clone(), host.runtime(), host.server()),
            Err(Error::AlreadyStarted)
        ));
        assert!(matches!(
            init(host.runtime(), host.server()),
            Err(Error::AlreadyStarted)
        ));

        let client = Client::connect(&config.channel).unwrap();
        let response = client
            .check(&Request::new(dir.path(), ["ok.txt"]), &CancelToken::new())
            .unwrap();
        assert!(response.is_success());

        handle.stop();
    }

    #[test]
    fn test_poll_backoff() {
        let interval = Duration::from_millis(10);
        assert_eq!(poll_backoff(interval, 0), interval);
        assert_eq!(poll_backoff(interval, 3), Duration::from_millis(80));
        assert_eq!(poll_backoff(interval, 40), MAX_POLL_BACKOFF);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ServiceState::Processing.to_string(), "Processing");
        assert_eq!(ServiceState::from_repr(1), Some(ServiceState::Idle));
    }
}
