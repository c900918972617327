//! Reply-correlation protocol layered on MQTT v5 properties.
//!
//! A request carries a response topic and correlation data. Each reply
//! carries the same correlation data plus two user properties,
//! `sequenceNum` and `isEndSequence`, which frame multi-part replies.

pub mod properties;
pub mod reply;

pub use properties::Properties;
pub use reply::{IS_END_SEQUENCE_KEY, SEQUENCE_NUM_KEY};
