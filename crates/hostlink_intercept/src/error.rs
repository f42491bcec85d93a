//! Error types for the interception pipeline.

use hostlink_reflect::ReflectError;

/// Failures raised while wiring the pipeline into a host or while using a
/// wired connection.
///
/// Wiring failures are fatal: they mean the host's shape does not match
/// what the pipeline expects. Per-message modifier failures never surface
/// here; they are logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    /// A class or member lookup failed
    #[error("Reflection error: {0}")]
    Reflect(#[from] ReflectError),

    /// A resolved member held something of the wrong kind
    #[error("Unexpected host shape: {what} ({detail})")]
    HostShape { what: String, detail: String },

    /// The interceptor has been shut down
    #[error("Interceptor is closed")]
    Closed,

    /// The host does not expose the named primitive
    #[error("Host has no {0} primitive")]
    Unsupported(&'static str),

    /// A send was accepted but its completion was never reported
    #[error("Send completion dropped for connection {0}")]
    CompletionDropped(u64),
}

impl InterceptError {
    pub(crate) fn shape(what: impl Into<String>, detail: impl Into<String>) -> Self {
        InterceptError::HostShape {
            what: what.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T, E = InterceptError> = std::result::Result<T, E>;
