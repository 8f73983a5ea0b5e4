// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # mcsc
//!
//! Syntax checking for Minecraft command files against the grammar of a running server.
//!
//! Command grammars change with every release and with every mod, so `mcsc` does not
//! carry a grammar of its own. Instead it patches the server's entry point once, at
//! packaging time, so that the running server starts an embedded validator. A separate
//! client process then sends batches of command files to that validator over a shared
//! file and prints the diagnostics it gets back.
//!
//! ## Architecture
//!
//! - [`patcher`] - offline: find where the entry method stores the freshly constructed
//!   server and insert a call to the validator hook right after it
//! - [`classfile`] and [`assembly`] - the class-file and instruction codecs the patcher
//!   works on
//! - [`bridge`] - a reflective registry through which the validator reaches host objects
//!   whose types are only known at run time
//! - [`validator`] - drives the host grammar line by line and renders caret diagnostics
//! - [`channel`] - the shared-file transport between the two processes
//! - [`service`] - the validator loop running inside the host
//! - [`client`] - the requesting side used by the `mcsc` command-line tool
//! - [`Error`] and [`Result`] - crate-wide error handling
//!
//! ## Patching an entry point
//!
//! ```rust,no_run
//! use mcsc::patcher::{inject, InjectOptions};
//!
//! let original = std::fs::read("Main.class")?;
//! let patched = inject(&original, &InjectOptions::default())?;
//! std::fs::write("Main.class", patched)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Checking files from the client side
//!
//! ```rust,no_run
//! use mcsc::{
//!     channel::{CancelToken, ChannelConfig},
//!     client::Client,
//!     service::{Request, Response},
//! };
//!
//! let client = Client::connect(&ChannelConfig::default())?;
//! let request = Request::new(std::env::current_dir()?, ["functions/setup.mcfunction"]);
//! match client.check(&request, &CancelToken::new())? {
//!     Response::Success => {}
//!     Response::Diagnostics(text) => println!("{}", text),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result<T>`](Result). Component failures are kept
//! apart in [`PatchError`], [`BridgeError`] and [`ChannelError`], all of which convert into
//! [`Error`]:
//!
//! ```rust,no_run
//! use mcsc::{BridgeError, Error};
//! # fn call() -> mcsc::Result<()> { Ok(()) }
//!
//! match call() {
//!     Ok(()) => {}
//!     Err(Error::Bridge(BridgeError::InvocationFailure(cause))) => {
//!         println!("host raised {}", cause);
//!     }
//!     Err(e) => println!("could not call into the host: {}", e),
//! }
//! ```

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use mcsc::prelude::*;
///
/// let patched = inject(&std::fs::read("Main.class")?, &InjectOptions::default())?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub mod prelude;

/// JVM instruction decoding and re-encoding.
///
/// - [`assembly::decode_stream`] - decode a whole `Code` array
/// - [`assembly::StreamEncoder`] - insert instructions and re-encode, tracking where every
///   original offset moved
/// - [`assembly::INSTRUCTIONS`] - the opcode table
///
/// # Examples
///
/// ```rust
/// use mcsc::assembly::decode_stream;
///
/// let code = [0x2A, 0xB1]; // aload_0, return
/// let instructions = decode_stream(&code)?;
/// assert_eq!(instructions[1].mnemonic, "return");
/// # Ok::<(), mcsc::Error>(())
/// ```
pub mod assembly;

/// Class-file container: constant pool, members, attributes and the `Code` attribute.
pub mod classfile;

/// Entry-point instrumentation.
pub mod patcher;

/// Reflective access to host objects.
pub mod bridge;

/// Shared-file synchronization between client and validator.
pub mod channel;

/// Command-file checking and diagnostics.
pub mod validator;

/// The validator service that runs inside the host.
pub mod service;

/// Client side of the channel.
pub mod client;

/// `mcsc` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `mcsc` Error type
///
/// The main error type for all operations in this crate. See [`Error`] for the full list
/// of variants.
pub use error::{BridgeError, ChannelError, Error, PatchError};

/// Cursor-based big-endian reader used by the codecs.
///
/// # Example
///
/// ```rust
/// use mcsc::Parser;
///
/// let mut parser = Parser::new(&[0xCA, 0xFE, 0xBA, 0xBE]);
/// assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
/// # Ok::<(), mcsc::Error>(())
/// ```
pub use file::parser::Parser;
