//! Error types for talking to the notifier.

use core::error::Error;

use derive_more::Display;

/// Errors that can occur while probing or pushing to the notifier.
#[derive(Debug, Display)]
pub enum NotifierError {
    /// Client could not be built or an endpoint URL could not be formed
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// Request never produced a response
    #[display("Transport error: {message}")]
    Transport { message: String },

    /// Non-success HTTP status without a readable reply
    #[display("HTTP error: {status}")]
    Status { status: u16 },

    /// Response body does not follow the notifier contract
    #[display("Protocol error: {message}")]
    Protocol { message: String },

    /// Notifier answered with a non-200 reply code
    #[display("Notification rejected with code {code}: {message}")]
    Rejected { code: i64, message: String },
}

impl NotifierError {
    pub fn is_protocol(&self) -> bool {
        matches!(self, NotifierError::Protocol { .. })
    }
}

impl Error for NotifierError {}
