//! Crate-wide error type.
//!
//! Every fallible operation of the client surfaces one of these variants
//! synchronously to the caller. The only exception is reply-property decoding
//! during dispatch: a `MalformedProperty` error there is logged and the
//! message is still delivered.

use thiserror::Error;

use crate::routing::SubscriptionId;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum Error {
    /// The underlying MQTT engine rejected an operation.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Unsubscribe was called with a handle the registry does not know.
    #[error("subscription {0} not found")]
    NotFound(SubscriptionId),

    /// A reply property carried a value that is not a valid integer.
    #[error("malformed property {key}={value:?}")]
    MalformedProperty { key: String, value: String },

    /// The topic matcher rejected a filter or topic name.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
