//! Transport-neutral view of the MQTT v5 PUBLISH properties this crate
//! reads and writes.

/// The subset of PUBLISH properties the reply protocol uses.
///
/// `user_properties` preserves insertion order and permits repeated keys,
/// as MQTT v5 does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    pub response_topic: Option<String>,
    pub correlation_data: Option<Vec<u8>>,
    pub user_properties: Vec<(String, String)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_response_topic(&mut self, topic: impl Into<String>) -> &mut Self {
        self.response_topic = Some(topic.into());
        self
    }

    pub fn set_correlation_data(&mut self, data: impl Into<Vec<u8>>) -> &mut Self {
        self.correlation_data = Some(data.into());
        self
    }

    pub fn add_user_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.user_properties.push((key.into(), value.into()));
        self
    }

    /// First value stored under `key`, if any.
    pub fn user_property(&self, key: &str) -> Option<&str> {
        self.user_properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.response_topic.is_none()
            && self.correlation_data.is_none()
            && self.user_properties.is_empty()
    }
}
