use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::bridge::{MethodSignature, ObjectHandle, ValueKind};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Codec failures (`Malformed`, `OutOfBounds`) are raised while reading or writing class files
/// and instruction streams. The remaining variants wrap the domain errors of the individual
/// components, so callers can either match on the crate-wide type or drill down into the
/// component error they care about.
///
/// # Error Categories
///
/// ## Codec Errors
/// - [`Error::Malformed`] - Corrupted or invalid class file / instruction stream
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
///
/// ## Component Errors
/// - [`Error::Patch`] - Build-time failures of the instruction stream patcher
/// - [`Error::Bridge`] - Reflective lookup or invocation failures against the host
/// - [`Error::Channel`] - Failures of the shared-file synchronization channel
/// - [`Error::AlreadyStarted`] - A validator service was started twice
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// # Examples
///
/// ```rust,no_run
/// use mcsc::{Error, PatchError, patcher::{inject, InjectOptions}};
///
/// let bytes = std::fs::read("Main.class")?;
/// match inject(&bytes, &InjectOptions::default()) {
///     Ok(patched) => println!("patched, {} bytes", patched.len()),
///     Err(Error::Patch(PatchError::NoConstructionCall)) => {
///         eprintln!("entry point never constructs the server");
///     }
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed class: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing a buffer.
    #[error("Out of Bound read would have occurred! - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// The instruction stream patcher failed.
    #[error("{0}")]
    Patch(#[from] PatchError),

    /// A runtime bridge call failed.
    #[error("{0}")]
    Bridge(#[from] BridgeError),

    /// The synchronization channel failed.
    #[error("{0}")]
    Channel(#[from] ChannelError),

    /// [`crate::service::ValidatorService::start`] was called on a service that is already
    /// running.
    #[error("The validator service has already been started")]
    AlreadyStarted,
}

/// Build-time failures of [`crate::patcher`].
///
/// All of these are fatal for the packaging step: the host is never started with a
/// half-patched entry point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// No call whose owner or return type is on the host-root allow-list exists in the method.
    #[error("No call constructing the host root object was found")]
    NoConstructionCall,

    /// A qualifying call was found, but no reference store follows it.
    #[error("No local store follows the construction call at instruction {call_index}")]
    NoStoreFollowing {
        /// Index of the matched call instruction
        call_index: usize,
    },

    /// A conditional branch can no longer reach its target after the insertion.
    #[error("Branch at offset {offset} can no longer reach offset {target}")]
    BranchOutOfRange {
        /// New offset of the branch instruction
        offset: u32,
        /// New offset of its target
        target: u32,
    },

    /// The class has no method with the requested name.
    #[error("Method '{0}' not found")]
    MethodNotFound(String),

    /// The method is abstract or native and carries no `Code` attribute.
    #[error("Method '{0}' has no Code attribute")]
    MissingCode(String),

    /// A constant pool index points at a missing or unexpected entry.
    #[error("Invalid constant pool reference #{0}")]
    InvalidConstant(u16),

    /// Appending the hook symbol would exceed the 65535 constant pool slots.
    #[error("Constant pool is full")]
    ConstantPoolOverflow,

    /// The hook descriptor does not take exactly one reference and return `void`.
    #[error("Hook descriptor '{0}' must take one reference argument and return void")]
    InvalidHook(String),
}

/// Failures of [`crate::bridge::Runtime`].
///
/// [`BridgeError::InvocationFailure`] is the only variant that means "the call ran". Every
/// other variant means the call could not be made at all.
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// No type with this name is registered.
    #[error("Type '{0}' not found")]
    NotFound(String),

    /// Neither the type nor any of its supertypes declares the member.
    #[error("Member '{member}' not found on '{type_name}'")]
    MemberNotFound {
        /// Type the lookup started from
        type_name: String,
        /// The signature that was looked up
        member: MethodSignature,
    },

    /// The callee ran and raised an exception of its own.
    #[error("Invocation failed: {0}")]
    InvocationFailure(ObjectHandle),

    /// A member returned a value of a different shape than the caller required.
    #[error("Expected {expected}, found {found}")]
    UnexpectedValue {
        /// The kind the caller asked for
        expected: ValueKind,
        /// The kind that was actually returned
        found: ValueKind,
    },

    /// [`crate::bridge::Runtime::synthesize`] was asked to implement a non-interface type.
    #[error("Type '{0}' is not an interface")]
    NotAnInterface(String),
}

/// Failures of [`crate::channel::Channel`].
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The shared file could not be opened or created.
    #[error("Failed to open channel '{}': {source}", path.display())]
    Open {
        /// Path of the shared file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Acquiring or releasing the advisory lock failed.
    #[error("Failed to lock channel: {0}")]
    Lock(std::io::Error),

    /// Reading, writing or querying the shared file failed.
    #[error("Channel I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The channel length did not change within the configured timeout.
    #[error("Timed out after {0:?} waiting for the channel to change")]
    TimedOut(Duration),

    /// The wait was cancelled through a [`crate::channel::CancelToken`].
    #[error("Wait on the channel was cancelled")]
    Cancelled,
}
