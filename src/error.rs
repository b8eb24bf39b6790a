use thiserror::Error;

/// Errors surfaced to callers of the session controller.
///
/// Plumbing below the controller (database worker, transports, settings)
/// reports `anyhow::Error`; it is mapped onto this taxonomy at the
/// controller boundary so callers can tell bad input from a failed write.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Rejected user input. Nothing was written.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A write was attempted without an authenticated owner.
    #[error("an authenticated owner is required to save a session")]
    AuthRequired,

    /// Send or receive failure on the telemetry channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// The session record could not be written. Not retried.
    #[error("failed to persist session: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

impl SessionError {
    pub fn validation(message: impl Into<String>) -> Self {
        SessionError::Validation(message.into())
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("disk full").context("failed to insert session record");
        let err = SessionError::Persistence(inner);
        let rendered = err.to_string();
        assert!(rendered.contains("failed to insert session record"));
        assert!(rendered.contains("disk full"));
    }

    #[test]
    fn validation_helper_wraps_message() {
        let err = SessionError::validation("planned duration must be at least 1 minute");
        assert!(matches!(err, SessionError::Validation(ref m) if m.contains("at least 1")));
    }
}
