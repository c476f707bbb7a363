use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Upper bound on waiting for a slot's exclusive hold.
    #[serde(default = "default_hold_timeout_ms")]
    pub hold_timeout_ms: u64,
}

fn default_hold_timeout_ms() -> u64 { 5000 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self { hold_timeout_ms: default_hold_timeout_ms() }
    }
}

impl EngineConfig {
    pub fn hold_timeout(&self) -> Duration {
        Duration::from_millis(self.hold_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SeedConfig {
    #[serde(default)]
    pub enabled: bool,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    pub fn load_from(dir: &str) -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name(&format!("{}/default", dir)))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("{}/{}", dir, run_mode)).required(false))
            // Untracked local overrides
            .add_source(config::File::with_name(&format!("{}/local", dir)).required(false))
            // Eg. `EXOBOOKING_ENGINE__HOLD_TIMEOUT_MS=250`
            .add_source(config::Environment::with_prefix("EXOBOOKING").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
