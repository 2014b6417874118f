use crate::presentation::config::{Environment, LoggingSettings};

pub struct TracingConfig {
    pub environment: Environment,
    pub filter: String,
    pub json_format: bool,
}

impl TracingConfig {
    pub const DEFAULT_FILTER: &'static str = "info,ragchat=debug,tower_http=debug";

    pub fn from_settings(settings: &LoggingSettings, environment: Environment) -> Self {
        Self {
            environment,
            filter: settings.filter.clone(),
            json_format: settings.json || environment == Environment::Prod,
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Local,
            filter: Self::DEFAULT_FILTER.to_string(),
            json_format: false,
        }
    }
}
