//! Encoding and decoding of the reply-correlation properties.

use tracing::warn;

use crate::protocol::Properties;
use crate::routing::Message;
use crate::utils::{Error, Result};

/// User property carrying the decimal sequence number of a reply part.
pub const SEQUENCE_NUM_KEY: &str = "sequenceNum";
/// User property flagging the last reply part, `"0"` or `"1"`.
pub const IS_END_SEQUENCE_KEY: &str = "isEndSequence";

/// Properties for a publish that expects replies on `reply_topic`.
/// Sequence fields are not part of a request.
pub fn encode_request(reply_topic: &str, correlation: &[u8]) -> Properties {
    let mut props = Properties::new();
    props
        .set_response_topic(reply_topic)
        .set_correlation_data(correlation);
    props
}

/// Properties for one part of a reply.
pub fn encode_reply(correlation: &[u8], sequence: i32, is_end_sequence: bool) -> Properties {
    let mut props = Properties::new();
    props
        .set_correlation_data(correlation)
        .add_user_property(SEQUENCE_NUM_KEY, sequence.to_string())
        .add_user_property(IS_END_SEQUENCE_KEY, if is_end_sequence { "1" } else { "0" });
    props
}

/// Builds the [`Message`] handed to a subscriber for an inbound publish.
///
/// Never fails: a missing correlation or a malformed sequence value is
/// logged and the affected field keeps its default.
pub fn decode(topic: &str, properties: Option<&Properties>) -> Message {
    let mut msg = Message::new(topic);
    let Some(props) = properties else {
        return msg;
    };

    if let Some(response_topic) = &props.response_topic {
        msg.response_topic = Some(response_topic.clone());
    }

    match &props.correlation_data {
        Some(data) => msg.correlation = Some(data.clone()),
        None => warn!(topic = %topic, "no correlation data"),
    }

    for (key, value) in &props.user_properties {
        match key.as_str() {
            SEQUENCE_NUM_KEY => match parse_int(key, value) {
                Ok(sequence) => msg.sequence = sequence,
                Err(e) => warn!(topic = %topic, error = %e, "ignoring reply sequence"),
            },
            IS_END_SEQUENCE_KEY => match parse_int(key, value) {
                Ok(flag) => msg.is_end_sequence = flag == 1,
                Err(e) => warn!(topic = %topic, error = %e, "ignoring end-of-sequence flag"),
            },
            _ => warn!(topic = %topic, key = %key, value = %value, "unsupported property"),
        }
    }

    msg
}

/// Parses a reply property value as a decimal integer.
pub fn parse_int(key: &str, value: &str) -> Result<i32> {
    value
        .trim()
        .parse::<i32>()
        .map_err(|_| Error::MalformedProperty {
            key: key.to_string(),
            value: value.to_string(),
        })
}
