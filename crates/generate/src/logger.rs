//! Planning-pass logger

/// Records user-facing planning messages and mirrors them to tracing
#[derive(Debug, Clone, Default)]
pub struct Logger {
    messages: Vec<String>,
}

impl Logger {
    /// Create an empty logger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a planning message
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.messages.push(message);
    }

    /// All recorded messages in order
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}
