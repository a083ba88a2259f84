use core::error::Error;

/// Errors that can occur during Kubernetes operations.
#[derive(Debug, derive_more::Display)]
pub enum KubernetesError {
    #[display("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
    #[display("Failed to list {scope}: {message}")]
    ListFailed { scope: String, message: String },
    #[display("Timed out after {seconds}s listing {scope}")]
    ListTimeout { scope: String, seconds: u64 },
    #[display("Failed to watch resources: {message}")]
    WatchFailed { message: String },
    #[display("Watch resource version expired: {message}")]
    WatchExpired { message: String },
    #[display("Invalid object in watch stream: {message}")]
    InvalidObject { message: String },
}

impl Error for KubernetesError {}
