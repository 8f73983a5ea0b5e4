//! Binary I/O primitives shared by every codec in the crate.
//!
//! - [`crate::file::io`] - big-endian conversion helpers and bounds-checked reads/writes
//! - [`crate::file::parser::Parser`] - cursor-based reader used by the class-file and
//!   instruction decoders

pub mod io;
pub mod parser;
