//! Subscription routing: the message value handed to subscribers, MQTT topic
//! matching, the subscriber registry and the dispatch loop tying them
//! together.

pub mod dispatch;
pub mod message;
pub mod registry;
pub mod topic;

pub use dispatch::Dispatcher;
pub use message::Message;
pub use registry::{Callback, Registry, SharedRegistry, Subscription, SubscriptionId, UserData};

#[cfg(test)]
mod tests;
