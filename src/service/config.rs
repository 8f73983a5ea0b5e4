use crate::{channel::ChannelConfig, validator::GrammarSymbols};

/// Configuration of a [`crate::service::ValidatorService`].
///
/// The channel's `timeout` does not apply on the service side: the service waits for
/// requests until it is stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Shared file and polling
    pub channel: ChannelConfig,
    /// Host symbol names used to drive the grammar
    pub symbols: GrammarSymbols,
}

impl ServiceConfig {
    /// Use `channel` instead of the default channel.
    #[must_use]
    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = channel;
        self
    }

    /// Use `symbols` instead of the default host symbols.
    #[must_use]
    pub fn with_symbols(mut self, symbols: GrammarSymbols) -> Self {
        self.symbols = symbols;
        self
    }
}
