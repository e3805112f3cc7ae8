//! Error types for onair-sched
//!
//! Component-local recoverable conditions (narration fallback, stale video
//! index) are absorbed where they occur; everything here propagates.

use thiserror::Error;

/// Main error type for the scheduling core
#[derive(Error, Debug)]
pub enum Error {
    /// No approved audio or video content to build a playlist from
    #[error("No approved content available")]
    NoContent,

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Narration service failed or timed out
    ///
    /// Only produced by narration clients; the segment generator recovers
    /// with templated text.
    #[error("Narration service unavailable: {0}")]
    NarrationUnavailable(String),

    /// Managed process failed to start or its precondition was not met
    #[error("Process start failed: {0}")]
    ProcessStart(String),

    /// Control channel session failed (connect, write, read or timeout)
    #[error("Control channel error: {0}")]
    ControlChannel(String),

    /// The store refused a swap that would have left two active playlists
    #[error("Activation conflict: {0}")]
    ActivationConflict(String),

    /// Terminal job failure after all attempts
    #[error("Job '{job}' failed after {attempts} attempts: {}", history.last().map(String::as_str).unwrap_or("no error recorded"))]
    RetryExhausted {
        job: String,
        attempts: u32,
        history: Vec<String>,
    },

    /// Transcoder invocation or output errors
    #[error("Media tool error: {0}")]
    Media(String),

    /// A daily scheduling stage failed; later stages did not run
    #[error("Daily scheduling failed at {stage}: {source}")]
    Stage {
        stage: &'static str,
        source: Box<Error>,
    },

    /// Scheduler is shutting down or a lane is closed
    #[error("Scheduler unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Common error: {0}")]
    Common(#[from] onair_common::Error),
}

/// Convenience Result type using onair-sched Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors that may succeed when the same job runs again
    ///
    /// Selection with no content and missing records are operator-visible
    /// conditions, not transient ones.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.root(),
            Error::NoContent | Error::NotFound(_) | Error::ActivationConflict(_) | Error::RetryExhausted { .. }
        )
    }

    /// The underlying error, looking through stage wrappers
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_exhausted_message_names_last_error() {
        let err = Error::RetryExhausted {
            job: "generate_segment".to_string(),
            attempts: 4,
            history: vec!["timeout".to_string(), "connection refused".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("generate_segment"));
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_no_content_is_not_retryable() {
        assert!(!Error::NoContent.is_retryable());
        assert!(Error::Media("ffprobe exited 1".into()).is_retryable());
    }

    #[test]
    fn test_stage_error_names_stage_and_keeps_cause() {
        let err = Error::Stage {
            stage: "select",
            source: Box::new(Error::NoContent),
        };
        assert_eq!(err.to_string(), "Daily scheduling failed at select: No approved content available");
        assert!(matches!(err.root(), Error::NoContent));
        assert!(!err.is_retryable());
        assert!(std::error::Error::source(&err).is_some());
    }
}
