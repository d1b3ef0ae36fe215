/*
* Placement Manager Configuration
* -------------------------------
*
* Layered settings, lowest to highest priority:
*   1. Hardcoded defaults (set_default below)
*   2. <CONFIG_PATH>/default.toml   (optional)
*   3. <CONFIG_PATH>/local.toml     (optional, per-site overrides)
*   4. An explicit --config file    (required when given)
*   5. APP_* environment variables  (APP_SESSION__ENDPOINT, APP_MIGRATION__SIMULATE_ONLY, ...)
*   6. Command line flags (applied by the CLI after loading)
*
* Sections:
* --------
* 1. SessionSettings: where the management API lives and who we are to it.
* 2. MigrationSettings: poll cadence, optional wait timeout, dispatch width
*    and the simulate-only switch. Defaults keep the classic behaviour:
*    poll every 2s, wait forever, one migration at a time.
* 3. LoggingSettings: debug verbosity.
*
* Keep the password out of files if you can, APP_SESSION__PASSWORD exists for a reason.
*/

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    pub session: SessionSettings,
    pub migration: MigrationSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionSettings {
    pub endpoint: String,
    pub port: u16,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MigrationSettings {
    pub poll_interval_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    pub dispatch_concurrency: usize,
    pub simulate_only: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LoggingSettings {
    pub debug: bool,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 2,
            timeout_secs: None,
            dispatch_concurrency: 1,
            simulate_only: false,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn new_from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    fn load(extra: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = std::env::var("CONFIG_PATH")
            .unwrap_or_else(|_| "config".to_string());

        debug!("Loading configuration from path: {}", config_path);

        let mut builder = Config::builder()
            // Start with default settings
            .set_default("session.endpoint", "localhost")?
            .set_default("session.port", 443_i64)?
            .set_default("session.user", "")?
            .set_default("migration.poll_interval_secs", 2_i64)?
            .set_default("migration.dispatch_concurrency", 1_i64)?
            .set_default("migration.simulate_only", false)?
            .set_default("logging.debug", false)?

            // Add configuration from files
            .add_source(File::with_name(&format!("{}/default", config_path)).required(false))
            .add_source(File::with_name(&format!("{}/local", config_path)).required(false));

        if let Some(path) = extra {
            debug!("Loading configuration file: {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            // Add environment variables with prefix "APP_"
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

pub fn generate_default_config() -> Settings {
    Settings {
        session: SessionSettings {
            endpoint: "file://inventory.json".to_string(),
            port: 443,
            user: "administrator".to_string(),
            password: None,
        },
        migration: MigrationSettings::default(),
        logging: LoggingSettings::default(),
    }
}
