use serde::Deserialize;
use std::net::SocketAddr;

use crate::import::DEFAULT_BATCH_SIZE;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub import: ImportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Hosted identity platform used to resolve bearer tokens.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Base URL of the platform's auth API, e.g. `https://project.example.co/auth/v1`.
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    pub batch_size: usize,
}

impl Config {
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "cert_tracker.db")?
            .set_default("auth.url", "http://localhost:54321/auth/v1")?
            .set_default("auth.timeout_secs", 10)?
            .set_default("import.batch_size", DEFAULT_BATCH_SIZE as i64)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CERT_TRACKER").separator("__"))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.import.batch_size == 0 {
            anyhow::bail!("import.batch_size must be greater than zero");
        }
        if self.auth.url.trim().is_empty() {
            anyhow::bail!("auth.url must be set");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))
    }
}
