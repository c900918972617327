use serde::Deserialize;

use crate::transport::QoS;

/// Top-level configuration settings for the application.
///
/// Covers the broker connection, the client identity and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub mqtt: MqttSettings,
    pub client: ClientSettings,
    pub logging: LoggingSettings,
}

/// Broker connection parameters handed to the MQTT engine.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
    pub clean_session: bool,
    /// Capacity of the engine's request channel.
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ClientSettings {
    /// MQTT client id. `None` means a random one is generated.
    pub id: Option<String>,
    pub default_qos: QoS,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional; anything missing is taken from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub mqtt: Option<PartialMqttSettings>,
    pub client: Option<PartialClientSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialMqttSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub keep_alive_secs: Option<u64>,
    pub clean_session: Option<bool>,
    pub channel_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialClientSettings {
    pub id: Option<String>,
    pub default_qos: Option<QoS>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mqtt: MqttSettings {
                host: "127.0.0.1".to_string(),
                port: 1883,
                keep_alive_secs: 60,
                clean_session: true,
                channel_capacity: 64,
            },
            client: ClientSettings {
                id: None,
                default_qos: QoS::AtMostOnce,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge_onto(self, defaults: Settings) -> Settings {
        let mqtt = self.mqtt.unwrap_or_default();
        let client = self.client.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();

        Settings {
            mqtt: MqttSettings {
                host: mqtt.host.unwrap_or(defaults.mqtt.host),
                port: mqtt.port.unwrap_or(defaults.mqtt.port),
                keep_alive_secs: mqtt.keep_alive_secs.unwrap_or(defaults.mqtt.keep_alive_secs),
                clean_session: mqtt.clean_session.unwrap_or(defaults.mqtt.clean_session),
                channel_capacity: mqtt.channel_capacity.unwrap_or(defaults.mqtt.channel_capacity),
            },
            client: ClientSettings {
                id: client.id.or(defaults.client.id),
                default_qos: client.default_qos.unwrap_or(defaults.client.default_qos),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(defaults.logging.level),
            },
        }
    }
}
