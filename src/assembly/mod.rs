//! JVM bytecode instruction codec.
//!
//! This module decodes a method's code array into [`Instruction`]s, prints them as a
//! listing, and encodes a (possibly extended) instruction sequence back into bytes while
//! keeping every branch pointed at the instruction it targeted before.
//!
//! # Key Components
//!
//! - [`crate::assembly::decode_stream`] / [`crate::assembly::decode_instruction`] - Decoding
//! - [`crate::assembly::StreamEncoder`] - Re-encoding with label resolution and relocation
//! - [`crate::assembly::EncodedStream`] - New code plus the old-to-new offset mapping
//! - [`crate::assembly::INSTRUCTIONS`] - Static opcode table shared by both directions
//! - [`crate::assembly::opcodes`] - Opcode byte constants
//!
//! # Examples
//!
//! ```rust
//! use mcsc::assembly::decode_stream;
//!
//! let listing: Vec<String> = decode_stream(&[0x2A, 0x4C, 0xB1])?
//!     .iter()
//!     .map(ToString::to_string)
//!     .collect();
//! assert_eq!(listing, ["    0: aload_0", "    1: astore_1", "    2: return"]);
//! # Ok::<(), mcsc::Error>(())
//! ```

mod decoder;
mod encoder;
mod instruction;
mod instructions;
pub mod opcodes;

pub use decoder::{decode_instruction, decode_stream};
pub use encoder::{EncodedStream, StreamEncoder};
pub use instruction::{FlowType, Instruction, Operand, OperandType};
pub use instructions::{lookup, JvmInstruction, INSTRUCTIONS};
