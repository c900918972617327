//! The `client` module defines [`Client`], the application-facing handle.
//!
//! A client owns the subscriber registry and the transport. Application
//! threads publish, subscribe and unsubscribe through it while the
//! transport's network thread feeds inbound messages into its dispatcher.

pub mod mq_client;
pub use mq_client::Client;
