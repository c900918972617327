//! # replymq
//!
//! `replymq` is an MQTT v5 publish/subscribe client that adds request/reply
//! correlation on top of plain pub/sub and keeps its subscriber list safe to
//! mutate from inside subscriber callbacks.
//!
//! ## Core Modules
//!
//! - `client`: the application-facing [`Client`] (publish, subscribe, reply,
//!   connection lifecycle).
//! - `routing`: messages, MQTT topic matching, the subscriber registry and
//!   the dispatch loop.
//! - `protocol`: the reply-correlation properties (`sequenceNum`,
//!   `isEndSequence`, response topic, correlation data).
//! - `transport`: the seam to the MQTT engine, with `rumqttc` and in-memory
//!   implementations.
//! - `config`: layered settings from file and environment.
//! - `utils`: error type and logging bootstrap.

pub mod client;
pub mod config;
pub mod protocol;
pub mod routing;
pub mod transport;
pub mod utils;

pub use client::Client;
pub use routing::{Message, SubscriptionId, UserData};
pub use transport::{LastWill, QoS};
pub use utils::{Error, Result};
