//! Command file validation against the host's live grammar.
//!
//! Each file is read line by line. Blank lines and `#` comments are skipped; every other
//! line is trimmed and handed to the host grammar through the [`crate::bridge`], with a
//! synthesized always-authorizing object as the parse source. Parsing, classification of
//! partial parses and the error messages all come from the host; this module only drives
//! the calls and turns raised host exceptions into [`Diagnostic`]s:
//!
//! ```text
//! cmds.txt:1: Unknown command
//!     gibe item minecraft:apple<--[HERE]
//! ```
//!
//! # Key Components
//!
//! - [`crate::validator::Grammar`] - The resolved host dispatcher and parse source
//! - [`crate::validator::check_file`] / [`crate::validator::check_batch`] - File checking
//! - [`crate::validator::Diagnostic`] - One reported problem with its caret snippet
//! - [`crate::validator::GrammarSymbols`] - Host type and member names

mod diagnostic;
mod parser;
mod symbols;

pub use diagnostic::{caret_snippet, Diagnostic, CARET_MARKER};
pub use parser::{check_batch, check_file, Grammar, SyntaxFailure};
pub use symbols::GrammarSymbols;
