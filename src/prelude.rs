//! # mcsc Prelude
//!
//! The types needed for the common workflows: patching an entry point, hosting the
//! validator and talking to it from a client.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all mcsc operations
pub use crate::Error;

/// The result type used throughout mcsc
pub use crate::Result;

/// Component errors
pub use crate::{BridgeError, ChannelError, PatchError};

// ================================================================================================
// Patching
// ================================================================================================

/// End-to-end injection and its configuration
pub use crate::patcher::{inject, locate, patch, HookSymbol, InjectOptions, InjectionPoint, MethodCode};

/// Class-file container
pub use crate::classfile::{ClassFile, ConstantPool};

/// Instruction decoding
pub use crate::assembly::{decode_stream, Instruction};

// ================================================================================================
// Hosting the validator
// ================================================================================================

/// Reflective bridge
pub use crate::bridge::{
    CallContext, DispatchTable, MethodSignature, ObjectHandle, Outcome, Runtime, TypeDef, Value,
};

/// Service lifecycle
pub use crate::service::{init, init_with, ServiceConfig, ServiceHandle, ServiceState, ValidatorService};

/// Grammar configuration and diagnostics
pub use crate::validator::{Diagnostic, GrammarSymbols};

// ================================================================================================
// Client side
// ================================================================================================

/// Channel configuration and cancellation
pub use crate::channel::{CancelToken, ChannelConfig};

/// Request/response exchange
pub use crate::{
    client::Client,
    service::{Request, Response},
};
