use std::collections::HashMap;

use config::{ConfigError, Environment, File, FileFormat};
use once_cell::sync::Lazy;
use serde::Deserialize;

const DEFAULTS: &str = include_str!("../config.yml");

#[derive(Deserialize)]
pub struct Config {
    pub logging: Logging,
    pub application: Application,
    pub oanda: Oanda,
    pub streaming: Streaming,
}

#[derive(Deserialize)]
pub struct Application {
    pub name: String,
}

#[derive(Deserialize)]
pub struct Oanda {
    #[serde(rename = "account")]
    pub account_id: String,
    pub rest: OandaRest,
    pub stream: OandaStream,
    pub auth: OandaAuth,
}

#[derive(Deserialize, Clone)]
pub struct OandaRest {
    pub url: String,
}

#[derive(Deserialize, Clone)]
pub struct OandaStream {
    pub url: String,
}

#[derive(Deserialize, Clone)]
pub struct OandaAuth {
    pub token: String,
}

// Keys are single words, the env sources split on `_`.
#[derive(Deserialize)]
pub struct Streaming {
    #[serde(rename = "pagesize")]
    pub page_size: u32,
    /// Terminate the stream after this many transactions, 0 follows it until Ctrl-C.
    #[serde(rename = "limit")]
    pub max_events: u64,
}

#[derive(Deserialize)]
pub struct Logging {
    level: String,
    crates: HashMap<String, String>,
}

impl Logging {
    pub fn levels(&self) -> String {
        let crate_levels = self.crates.iter().map(|(lib, loglevel)| format!("{lib}={loglevel}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{},{crate_levels}", self.level)
    }
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::load);

impl Config {
    fn load() -> Self {
        Self::try_load()
            .expect("Error during config creation")
    }

    pub fn try_load() -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Yaml))
            .add_source(Environment::with_prefix("APP")
                .try_parsing(true)
                .separator("_"))
            .add_source(Environment::with_prefix("TRANSACTIONS")
                .try_parsing(true)
                .separator("_"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Config {
        config::Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_point_to_practice_hosts() {
        let config = defaults();
        assert_eq!(config.application.name, "transactions");
        assert_eq!(config.oanda.rest.url, "https://api-fxpractice.oanda.com");
        assert_eq!(config.oanda.stream.url, "https://stream-fxpractice.oanda.com");
        assert!(config.oanda.account_id.is_empty());
        assert_eq!(config.streaming.page_size, 100);
        assert_eq!(config.streaming.max_events, 0);
    }

    #[test]
    fn test_env_overrides_defaults() {
        std::env::set_var("TRANSACTIONS_OANDA_ACCOUNT", "101-004-1");
        std::env::set_var("TRANSACTIONS_OANDA_AUTH_TOKEN", "secret");
        std::env::set_var("TRANSACTIONS_STREAMING_LIMIT", "5");
        std::env::set_var("TRANSACTIONS_STREAMING_PAGESIZE", "20");

        let config = Config::try_load().unwrap();
        assert_eq!(config.oanda.account_id, "101-004-1");
        assert_eq!(config.oanda.auth.token, "secret");
        assert_eq!(config.streaming.max_events, 5);
        assert_eq!(config.streaming.page_size, 20);
        assert_eq!(config.oanda.rest.url, "https://api-fxpractice.oanda.com");
    }

    #[test]
    fn test_logging_levels() {
        let logging = Logging {
            level: "INFO".to_string(),
            crates: HashMap::from([("oanda_eac".to_string(), "TRACE".to_string())]),
        };
        assert_eq!(logging.levels(), "INFO,oanda_eac=TRACE");
    }
}
