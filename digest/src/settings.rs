use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

fn duration_from_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let ms = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(ms))
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub digest: DigestSettings,
    pub remote: RemoteSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DigestSettings {
    pub max_workers: usize,
    #[serde(deserialize_with = "duration_from_ms")]
    pub poll_interval_ms: Duration,
    /// Gap to the remote tip beyond which the poll loop refuses to follow
    /// synchronously.
    pub far_block_height: u64,
    /// Digest a far-behind gap in the background instead of only warning.
    pub force_follow: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteSettings {
    pub endpoint: String,
    pub page_size: u64,
    pub retry_attempts: usize,
    #[serde(deserialize_with = "duration_from_ms")]
    pub retry_delay_ms: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    pub db_path: String,
}

impl AppConfig {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(path).required(true))
            .add_source(Environment::with_prefix("DIGEST").try_parsing(true).separator("__"));
        let config = builder.build()?.try_deserialize();
        println!("{:#?}", config);
        config
    }
}
