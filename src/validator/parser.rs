//! Line-oriented command file checking against the live host grammar.

use std::{path::Path, sync::Arc};

use crate::{
    bridge::{DispatchTable, MethodSignature, ObjectHandle, Runtime, Value},
    validator::{
        diagnostic::Diagnostic,
        symbols::{self, GrammarSymbols},
    },
    BridgeError, Error, Result,
};

/// A host grammar failure, as extracted from the exception object the host raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxFailure {
    /// The exception's raw message
    pub message: String,
    /// The input the failure refers to, if the host recorded one
    pub input: Option<String>,
    /// Cursor into `input`, negative when unknown
    pub cursor: i32,
}

impl SyntaxFailure {
    fn into_diagnostic(self, path: &str, line: usize) -> Diagnostic {
        Diagnostic::new(path, line, self.message).with_snippet(self.input.as_deref(), self.cursor)
    }
}

/// The host's command grammar, resolved once and reused for every line.
pub struct Grammar {
    runtime: Arc<Runtime>,
    symbols: GrammarSymbols,
    dispatcher: ObjectHandle,
    source: ObjectHandle,
}

impl Grammar {
    /// Follow the accessor chain from `host_root` to the dispatcher and synthesize the
    /// always-authorizing parse source.
    ///
    /// # Errors
    /// Fails with the [`BridgeError`] of the first lookup or call that does not succeed.
    pub fn resolve(
        runtime: Arc<Runtime>,
        host_root: &ObjectHandle,
        symbols: GrammarSymbols,
    ) -> Result<Self> {
        let mut dispatcher = host_root.clone();
        for accessor in &symbols.accessor_chain {
            dispatcher = runtime
                .invoke(&dispatcher, &MethodSignature::nullary(accessor), &[])?
                .into_object()?;
        }

        let source = runtime.synthesize(
            &symbols.permission_interface,
            DispatchTable::constant(Value::Bool(true)),
        )?;

        log::debug!("Resolved command dispatcher {}", dispatcher);
        Ok(Grammar {
            runtime,
            symbols,
            dispatcher,
            source,
        })
    }

    /// The symbols this grammar was resolved with.
    #[must_use]
    pub fn symbols(&self) -> &GrammarSymbols {
        &self.symbols
    }

    /// Check one command.
    ///
    /// Returns `Ok(None)` if the host accepts it and `Ok(Some(..))` if any host call made
    /// for it raised.
    ///
    /// # Errors
    /// Fails only if the grammar could not be driven at all (missing types or members, or
    /// results of an unexpected shape).
    pub fn check_command(&self, command: &str) -> Result<Option<SyntaxFailure>> {
        match self.drive(command) {
            Ok(None) => Ok(None),
            Ok(Some(raised)) | Err(Error::Bridge(BridgeError::InvocationFailure(raised))) => {
                self.describe(&raised).map(Some)
            }
            Err(error) => Err(error),
        }
    }

    /// Runs the host's parse, validation and flattening for `command`. An exception object
    /// the host built without raising it comes back as `Ok(Some(..))`.
    fn drive(&self, command: &str) -> Result<Option<ObjectHandle>> {
        let runtime = &self.runtime;
        let names = &self.symbols;

        let results = runtime
            .invoke(
                &self.dispatcher,
                &MethodSignature::new(
                    symbols::PARSE,
                    [&names.string_type, &names.object_type],
                ),
                &[Value::from(command), Value::Object(self.source.clone())],
            )?
            .into_object()?;

        runtime.invoke_static(
            &names.commands_type,
            &MethodSignature::new(symbols::VALIDATE_PARSE_RESULTS, [results.runtime_type()]),
            &[Value::Object(results.clone())],
        )?;

        let builder = runtime
            .invoke(&results, &MethodSignature::nullary(symbols::GET_CONTEXT), &[])?
            .into_object()?;
        let context = runtime
            .invoke(
                &builder,
                &MethodSignature::new(symbols::BUILD, [&names.string_type]),
                &[Value::from(command)],
            )?
            .into_object()?;
        let chain = runtime.invoke_static(
            &names.context_chain_type,
            &MethodSignature::new(symbols::TRY_FLATTEN, [context.runtime_type()]),
            &[Value::Object(context)],
        )?;
        if !chain.is_null() {
            return Ok(None);
        }

        // Parsed completely but ends on a node without a command
        let reader = runtime.invoke(&results, &MethodSignature::nullary(symbols::GET_READER), &[])?;
        let factory = runtime
            .read_static_field(&names.syntax_exception_type, symbols::BUILT_IN_EXCEPTIONS)?
            .into_object()?;
        let unknown = runtime
            .invoke(
                &factory,
                &MethodSignature::nullary(symbols::DISPATCHER_UNKNOWN_COMMAND),
                &[],
            )?
            .into_object()?;
        let exception = runtime
            .invoke(
                &unknown,
                &MethodSignature::new(symbols::CREATE_WITH_CONTEXT, [&names.reader_type]),
                &[reader],
            )?
            .into_object()?;
        Ok(Some(exception))
    }

    fn describe(&self, exception: &ObjectHandle) -> Result<SyntaxFailure> {
        let runtime = &self.runtime;
        let raw = runtime
            .invoke(exception, &MethodSignature::nullary(symbols::GET_RAW_MESSAGE), &[])?
            .into_object()?;
        let message = runtime
            .invoke(&raw, &MethodSignature::nullary(symbols::GET_STRING), &[])?
            .as_str()?
            .to_string();
        let input = runtime
            .invoke(exception, &MethodSignature::nullary(symbols::GET_INPUT), &[])?
            .as_opt_str()?
            .map(str::to_string);
        let cursor = runtime
            .invoke(exception, &MethodSignature::nullary(symbols::GET_CURSOR), &[])?
            .as_int()?;

        Ok(SyntaxFailure {
            message,
            input,
            cursor,
        })
    }
}

/// Check every command in one file.
///
/// Blank lines and lines starting with `#` (after leading whitespace) are skipped but
/// still counted. `path` is resolved against `cwd` and reported as given. A file that
/// cannot be read yields a single diagnostic on line 0.
///
/// # Errors
/// Fails if the grammar could not be driven; see [`Grammar::check_command`].
pub fn check_file(grammar: &Grammar, cwd: &Path, path: &str) -> Result<Vec<Diagnostic>> {
    let contents = match std::fs::read_to_string(cwd.join(path)) {
        Ok(contents) => contents,
        Err(error) => {
            log::warn!("Cannot read {}: {}", path, error);
            return Ok(vec![Diagnostic::new(path, 0, error.to_string())]);
        }
    };

    let mut diagnostics = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let command = line.trim();
        if command.is_empty() || command.starts_with('#') {
            continue;
        }
        if let Some(failure) = grammar.check_command(command)? {
            diagnostics.push(failure.into_diagnostic(path, index + 1));
        }
    }
    Ok(diagnostics)
}

/// Check a batch of files, in order.
///
/// # Errors
/// Fails if the grammar could not be driven for any line.
pub fn check_batch<S: AsRef<str>>(
    grammar: &Grammar,
    cwd: &Path,
    paths: &[S],
) -> Result<Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    for path in paths {
        diagnostics.extend(check_file(grammar, cwd, path.as_ref())?);
    }
    Ok(diagnostics)
}
