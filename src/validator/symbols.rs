//! Names of the host types and members the validator calls through the bridge.

/// Host-specific symbol names.
///
/// The defaults match a Brigadier-based Minecraft server. Everything the validator calls
/// on the host is named here, so a host with renamed or relocated classes only needs a
/// different `GrammarSymbols`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarSymbols {
    /// Nullary getters leading from the host root to the command dispatcher
    pub accessor_chain: Vec<String>,
    /// Interface implemented by the synthesized always-authorize parse source
    pub permission_interface: String,
    /// Type declaring the static parse result validation
    pub commands_type: String,
    /// Type declaring the static context flattening
    pub context_chain_type: String,
    /// Exception type holding the built-in exception factories
    pub syntax_exception_type: String,
    /// Declared parameter type of the parse input
    pub string_type: String,
    /// Declared parameter type of the parse source
    pub object_type: String,
    /// Declared parameter type of `createWithContext`
    pub reader_type: String,
}

impl Default for GrammarSymbols {
    fn default() -> Self {
        GrammarSymbols {
            accessor_chain: vec!["getCommands".to_string(), "getDispatcher".to_string()],
            permission_interface: "net.minecraft.commands.PermissionSource".to_string(),
            commands_type: "net.minecraft.commands.Commands".to_string(),
            context_chain_type: "com.mojang.brigadier.context.ContextChain".to_string(),
            syntax_exception_type: "com.mojang.brigadier.exceptions.CommandSyntaxException"
                .to_string(),
            string_type: "java.lang.String".to_string(),
            object_type: "java.lang.Object".to_string(),
            reader_type: "com.mojang.brigadier.ImmutableStringReader".to_string(),
        }
    }
}

impl GrammarSymbols {
    /// Follow a different getter chain from the host root to the dispatcher.
    #[must_use]
    pub fn with_accessor_chain<I, S>(mut self, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accessor_chain = chain.into_iter().map(Into::into).collect();
        self
    }

    /// Synthesize the parse source from a different interface.
    #[must_use]
    pub fn with_permission_interface(mut self, interface: impl Into<String>) -> Self {
        self.permission_interface = interface.into();
        self
    }
}

pub(crate) const PARSE: &str = "parse";
pub(crate) const VALIDATE_PARSE_RESULTS: &str = "validateParseResults";
pub(crate) const GET_CONTEXT: &str = "getContext";
pub(crate) const GET_READER: &str = "getReader";
pub(crate) const BUILD: &str = "build";
pub(crate) const TRY_FLATTEN: &str = "tryFlatten";
pub(crate) const BUILT_IN_EXCEPTIONS: &str = "BUILT_IN_EXCEPTIONS";
pub(crate) const DISPATCHER_UNKNOWN_COMMAND: &str = "dispatcherUnknownCommand";
pub(crate) const CREATE_WITH_CONTEXT: &str = "createWithContext";
pub(crate) const GET_RAW_MESSAGE: &str = "getRawMessage";
pub(crate) const GET_STRING: &str = "getString";
pub(crate) const GET_INPUT: &str = "getInput";
pub(crate) const GET_CURSOR: &str = "getCursor";
