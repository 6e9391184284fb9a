mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    LogSettings, ServerSettings, SessionSettings, Settings, StoreBackend, StoreSettings,
};

/// Prefix of environment overrides, e.g. `SOCKMAP__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "SOCKMAP";

/// Loads the configuration from `config/default` (any format the `config`
/// crate understands), `.env` and `SOCKMAP__`-prefixed environment
/// variables, then merges it over the defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("session.seed")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(Settings::merge(partial))
}

#[cfg(test)]
mod tests;
