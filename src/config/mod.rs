use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub github: GitHubConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL this service is reachable at; stable links are built on it.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// GitHub App identity. One app fronts every installed account; the private
/// key signs the app-level JWTs that mint per-installation tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// Numeric GitHub App ID
    pub app_id: i64,
    /// Path to the app's RSA private key in PEM format
    pub private_key_path: PathBuf,
    /// OAuth client ID of the app
    pub client_id: String,
    /// OAuth client secret of the app
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse configuration file")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str(
            r#"
            [github]
            app_id = 12345
            private_key_path = "/etc/artilink/app.pem"
            client_id = "Iv1.abc"
            client_secret = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.github.app_id, 12345);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.public_url, "http://localhost:8080");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_github_section_is_an_error() {
        let result: std::result::Result<Config, _> = toml::from_str("[server]\nport = 9000\n");
        assert!(result.is_err());
    }
}
