//! Context error types.

use thiserror::Error;

/// Errors raised by the key/value facade.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ContextError {
    /// No context is reachable from the current continuation.
    ///
    /// Recoverable: register a context with `register()`, `run()` or
    /// `scope()` and retry.
    #[error("AsyncContext was not registered, call register() or run() before calling this method")]
    Unregistered,
}

/// Result type for context operations.
pub type Result<T> = std::result::Result<T, ContextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_message_is_fixed() {
        assert_eq!(
            ContextError::Unregistered.to_string(),
            "AsyncContext was not registered, call register() or run() before calling this method"
        );
    }
}
