//! Request and response framing on the channel.
//!
//! ```text
//! request:   {cwd}\n{path}\n{path}\n...
//! response:  success\n
//!        or  {path}:{line}: {message}\n[    {snippet}<--[HERE]\n]...
//! ```
//!
//! Both travel through the same shared file; which one is in it follows from whose turn
//! it is to write. Readers trim surrounding whitespace, which lets a writer append a
//! newline whenever its message would leave the file length unchanged (see
//! [`distinct_length`]).

use std::path::{Path, PathBuf};

use crate::{validator::Diagnostic, Result};

/// Sentinel written when a whole batch passed.
pub const SUCCESS: &str = "success";

/// Append a newline to `payload` if its length equals `current_len`.
///
/// Peers only notice a message through a change of the file length.
#[must_use]
pub fn distinct_length(mut payload: String, current_len: u64) -> String {
    if payload.len() as u64 == current_len {
        payload.push('\n');
    }
    payload
}

/// A batch of files to check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Directory relative paths are resolved against
    pub cwd: PathBuf,
    /// Files to check, as the user named them
    pub paths: Vec<String>,
}

impl Request {
    /// Create a request.
    pub fn new<I, S>(cwd: impl Into<PathBuf>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Request {
            cwd: cwd.into(),
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Working directory of the request.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Wire form; every line, the last included, ends with `\n`.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut text = format!("{}\n", self.cwd.display());
        for path in &self.paths {
            text.push_str(path);
            text.push('\n');
        }
        text
    }

    /// Parse the wire form. Lines are trimmed and empty lines dropped.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if there is no working directory line.
    pub fn decode(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
        let Some(cwd) = lines.next() else {
            return Err(malformed_error!("Empty request"));
        };
        Ok(Request {
            cwd: PathBuf::from(cwd),
            paths: lines.map(str::to_string).collect(),
        })
    }
}

/// The validator's answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// No file had an error
    Success,
    /// Rendered diagnostics, without the final newline
    Diagnostics(String),
}

impl Response {
    /// [`Response::Success`] for an empty list, the rendered diagnostics otherwise.
    #[must_use]
    pub fn from_diagnostics(diagnostics: &[Diagnostic]) -> Self {
        if diagnostics.is_empty() {
            return Response::Success;
        }
        let text: String = diagnostics.iter().map(Diagnostic::render).collect();
        Response::Diagnostics(text.trim_end().to_string())
    }

    /// Wire form, newline terminated.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Response::Success => format!("{SUCCESS}\n"),
            Response::Diagnostics(text) => format!("{text}\n"),
        }
    }

    /// Parse the wire form.
    #[must_use]
    pub fn decode(text: &str) -> Self {
        let text = text.trim();
        if text == SUCCESS {
            Response::Success
        } else {
            Response::Diagnostics(text.to_string())
        }
    }

    /// `true` for [`Response::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success)
    }

    /// The diagnostic lines, snippet lines included; empty on success.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        let text = match self {
            Response::Success => "",
            Response::Diagnostics(text) => text.as_str(),
        };
        text.lines()
    }

    /// Number of diagnostics, counting `path:line:` lines.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.lines()
            .filter(|line| !line.starts_with(char::is_whitespace))
            .count()
    }
}
