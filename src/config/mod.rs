//! Configuration loading.
//!
//! Sources, lowest precedence first: built-in defaults, the optional file
//! `config/default.{toml,yaml,json,...}` (or an explicit path), then
//! environment variables prefixed with `REPLYMQ_` whose sections are split
//! by a double underscore, e.g. `REPLYMQ_MQTT__KEEP_ALIVE_SECS=30`.

mod settings;

use config::{Config, Environment, File};

use crate::utils::Result;

use settings::PartialSettings;

pub use settings::{ClientSettings, LoggingSettings, MqttSettings, Settings};

const DEFAULT_FILE: &str = "config/default";
const ENV_PREFIX: &str = "REPLYMQ";

/// Loads settings from `config/default` (if present) and the environment.
pub fn load_config() -> Result<Settings> {
    load(File::with_name(DEFAULT_FILE).required(false))
}

/// Loads settings from an explicit file, which must exist, and the
/// environment.
pub fn load_config_from(path: &str) -> Result<Settings> {
    load(File::with_name(path).required(true))
}

fn load<S>(file: S) -> Result<Settings>
where
    S: config::Source + Send + Sync + 'static,
{
    let config = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge_onto(Settings::default()))
}
