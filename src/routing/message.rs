//! Message definitions for delivery
//!
//! `Message` is what a subscriber sees alongside the raw payload. It is built
//! fresh for every callback invocation and never mutated afterwards, so a
//! handler that wants to reply with a different sequence number works on a
//! copy (`msg.clone().with_sequence(..)`).
//!
//! Notes on fields:
//! - `topic`: the concrete topic the message arrived on
//! - `response_topic`: where a responder must publish its reply
//! - `correlation`: opaque token linking replies to their request
//! - `sequence`: position of this part in a multi-part reply, `0` when absent
//! - `is_end_sequence`: set on the final part of a reply

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub response_topic: Option<String>,
    pub correlation: Option<Vec<u8>>,
    pub sequence: i32,
    pub is_end_sequence: bool,
}

impl Message {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn with_response_topic(mut self, topic: impl Into<String>) -> Self {
        self.response_topic = Some(topic.into());
        self
    }

    pub fn with_correlation(mut self, correlation: impl Into<Vec<u8>>) -> Self {
        self.correlation = Some(correlation.into());
        self
    }

    pub fn with_sequence(mut self, sequence: i32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_end_sequence(mut self, is_end: bool) -> Self {
        self.is_end_sequence = is_end;
        self
    }

    /// Correlation bytes, empty when the sender attached none.
    pub fn correlation(&self) -> &[u8] {
        self.correlation.as_deref().unwrap_or_default()
    }

    /// True when the sender asked for a reply.
    pub fn expects_reply(&self) -> bool {
        self.response_topic.as_deref().is_some_and(|t| !t.is_empty())
    }
}
