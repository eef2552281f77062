//! Typed error hierarchy for the director-client crate.
//!
//! `DirectorError` keeps one variant per failure boundary so callers can
//! branch on *what* failed (transport, decoding, timestamp parsing, a missing
//! endpoint, a failed or stuck task) without string matching. Each layer adds
//! its own description on the way up through [`DirectorError::Context`], so a
//! failed `clean_up` reads like
//! `cleaning up resources: task 42 finished in state 'error': ...`.
//!
//! [`DirectorError::kind`] looks through any number of context layers and
//! reports the root category, which is what callers normally want to match on.

use std::time::Duration;

use reqwest::StatusCode;

/// Unified error type for all director-client operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectorError {
    /// A network-level failure (DNS, TCP, TLS, request timeout, or a body
    /// stream that broke off). No usable status code is available.
    #[error("network error requesting '{path}': {source}")]
    Transport {
        /// Director path that was being requested.
        path: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// A response body could not be decoded into the expected shape.
    #[error("failed to decode response from '{path}': {source}")]
    Decode {
        /// Director path whose response failed to decode.
        path: String,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A request body or query string could not be serialized.
    #[error("failed to encode request for '{path}': {source}")]
    Encode {
        /// Director path the request was meant for.
        path: String,
        /// The underlying serializer error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A director timestamp matched none of the recognized formats.
    #[error("unrecognized timestamp '{raw}'")]
    Parse {
        /// The raw timestamp string as sent by the director.
        raw: String,
        /// Error from the last format that was attempted.
        #[source]
        source: Option<chrono::ParseError>,
    },

    /// The director answered 404 for an endpoint that older director versions
    /// do not provide.
    #[error("{operation} not supported by this director: {source}")]
    NotSupported {
        /// What the caller was trying to do.
        operation: String,
        /// The 404 endpoint error as received.
        #[source]
        source: Box<DirectorError>,
    },

    /// A background task reached a terminal state other than `done`.
    #[error("task {task_id} finished in state '{state}': {result}")]
    Task {
        /// Director task id.
        task_id: u64,
        /// Terminal state reported by the director (`error`, `cancelled`, `timeout`).
        state: String,
        /// The task's result text, usually the director's failure message.
        result: String,
    },

    /// The polling deadline expired before the task reached a terminal state.
    #[error("task {task_id} did not finish within {elapsed:?}")]
    TaskTimeout {
        /// Director task id.
        task_id: u64,
        /// Time spent waiting when the deadline was detected.
        elapsed: Duration,
    },

    /// The director returned a non-success status with no more specific meaning.
    #[error("director returned {status} for '{path}': {body}")]
    Endpoint {
        /// The HTTP status code.
        status: StatusCode,
        /// Director path that was requested.
        path: String,
        /// Response body text; may carry the director's error description.
        body: String,
    },

    /// Writing a streamed response body into the caller's sink failed.
    #[error("failed to write response body from '{path}': {source}")]
    Io {
        /// Director path whose body was being streamed.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The caller's cancellation signal fired before the operation completed.
    #[error("{operation} was cancelled")]
    Cancelled {
        /// What was in flight when the signal fired.
        operation: String,
    },

    /// Client configuration is invalid or could not be loaded.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
        /// The underlying I/O or TOML error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A lower-level error annotated with what this layer was doing.
    #[error("{context}: {source}")]
    Context {
        /// Description of the operation that failed.
        context: String,
        /// The wrapped error.
        #[source]
        source: Box<DirectorError>,
    },
}

/// Root category of a [`DirectorError`], independent of context layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`DirectorError::Transport`].
    Transport,
    /// See [`DirectorError::Decode`].
    Decode,
    /// See [`DirectorError::Encode`].
    Encode,
    /// See [`DirectorError::Parse`].
    Parse,
    /// See [`DirectorError::NotSupported`].
    NotSupported,
    /// See [`DirectorError::Task`].
    Task,
    /// See [`DirectorError::TaskTimeout`].
    TaskTimeout,
    /// See [`DirectorError::Endpoint`].
    Endpoint,
    /// See [`DirectorError::Io`].
    Io,
    /// See [`DirectorError::Cancelled`].
    Cancelled,
    /// See [`DirectorError::Config`].
    Config,
}

impl DirectorError {
    /// Wraps `self` with a description of the operation that failed.
    pub fn context(self, context: impl Into<String>) -> Self {
        DirectorError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Builds a `Config` error without an underlying cause.
    pub fn config(message: impl Into<String>) -> Self {
        DirectorError::Config {
            message: message.into(),
            source: None,
        }
    }

    /// The innermost error, with every `Context` layer removed.
    pub fn root(&self) -> &DirectorError {
        match self {
            DirectorError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// The root category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DirectorError::Context { source, .. } => source.kind(),
            DirectorError::Transport { .. } => ErrorKind::Transport,
            DirectorError::Decode { .. } => ErrorKind::Decode,
            DirectorError::Encode { .. } => ErrorKind::Encode,
            DirectorError::Parse { .. } => ErrorKind::Parse,
            DirectorError::NotSupported { .. } => ErrorKind::NotSupported,
            DirectorError::Task { .. } => ErrorKind::Task,
            DirectorError::TaskTimeout { .. } => ErrorKind::TaskTimeout,
            DirectorError::Endpoint { .. } => ErrorKind::Endpoint,
            DirectorError::Io { .. } => ErrorKind::Io,
            DirectorError::Cancelled { .. } => ErrorKind::Cancelled,
            DirectorError::Config { .. } => ErrorKind::Config,
        }
    }

    /// The HTTP status the director answered with, when the failure was a
    /// non-success response.
    pub fn status(&self) -> Option<StatusCode> {
        match self.root() {
            DirectorError::Endpoint { status, .. } => Some(*status),
            DirectorError::NotSupported { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Adds context wrapping to `Result<T, DirectorError>`.
pub trait ResultExt<T> {
    /// Wraps an error with a fixed description.
    fn wrap(self, context: &str) -> Result<T>;

    /// Wraps an error with a lazily formatted description.
    fn wrap_with<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn wrap(self, context: &str) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn wrap_with<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.context(f()))
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, DirectorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn not_found() -> DirectorError {
        DirectorError::Endpoint {
            status: StatusCode::NOT_FOUND,
            path: "/director/certificate_expiry".to_string(),
            body: "Not Found".to_string(),
        }
    }

    #[test]
    fn endpoint_error_displays_status_path_and_body() {
        let msg = not_found().to_string();
        assert!(msg.contains("404"), "display should include status code");
        assert!(msg.contains("/director/certificate_expiry"));
        assert!(msg.contains("Not Found"));
    }

    #[test]
    fn context_layers_accumulate_in_display() {
        let err = not_found()
            .context("Getting certificate expiry")
            .context("Checking director");
        assert_eq!(
            err.to_string(),
            "Checking director: Getting certificate expiry: director returned 404 Not Found \
             for '/director/certificate_expiry': Not Found"
        );
    }

    #[test]
    fn kind_and_status_look_through_context() {
        let err = not_found().context("outer").context("outermost");
        assert_eq!(err.kind(), ErrorKind::Endpoint);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(matches!(err.root(), DirectorError::Endpoint { .. }));
    }

    #[test]
    fn not_supported_keeps_404_as_source() {
        let err = DirectorError::NotSupported {
            operation: "certificate expiry information".to_string(),
            source: Box::new(not_found()),
        };
        assert_eq!(err.kind(), ErrorKind::NotSupported);
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert!(err.source().is_some());
    }

    #[test]
    fn task_error_includes_id_state_and_result() {
        let err = DirectorError::Task {
            task_id: 42,
            state: "error".to_string(),
            result: "Instance 'web/0' is locked".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("'error'"));
        assert!(msg.contains("locked"));
        assert_eq!(err.kind(), ErrorKind::Task);
    }

    #[test]
    fn task_timeout_includes_duration_and_task_id() {
        let err = DirectorError::TaskTimeout {
            task_id: 7,
            elapsed: Duration::from_secs(605),
        };
        let msg = err.to_string();
        assert!(msg.contains("task 7"));
        assert!(msg.contains("605"));
    }

    #[test]
    fn decode_error_chains_to_serde() {
        let json_err = serde_json::from_str::<Vec<String>>("{bad").unwrap_err();
        let err = DirectorError::Decode {
            path: "/orphaned_vms".to_string(),
            source: json_err,
        };
        assert!(err.to_string().contains("/orphaned_vms"));
        assert!(err.source().is_some());
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn result_ext_wraps_only_errors() {
        let ok: Result<u8> = Ok(1);
        assert_eq!(ok.wrap("unused").unwrap(), 1);

        let err: Result<u8> = Err(DirectorError::Cancelled {
            operation: "download".to_string(),
        });
        let wrapped = err.wrap_with(|| format!("Downloading resource '{}'", "abc")).unwrap_err();
        assert_eq!(wrapped.to_string(), "Downloading resource 'abc': download was cancelled");
        assert_eq!(wrapped.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DirectorError>();
    }
}
