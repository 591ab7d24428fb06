use common::Environment;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "LOGO_API";

/// Process-level settings for the HTTP service. The detector itself is
/// configured through the YAML document at `default_config`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    /// Directory served read-only under `/configs`.
    pub configs_dir: PathBuf,
    /// Model configuration loaded at startup.
    pub default_config: PathBuf,
    /// Where documents uploaded through `POST /config` are written before loading.
    pub upload_config: PathBuf,
    pub max_upload_bytes: usize,
    pub otel_endpoint: Option<String>,
}

impl ServiceConfig {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    /// Defaults rooted at `configs_dir`, used by tests and embedders.
    pub fn with_configs_dir(configs_dir: impl Into<PathBuf>) -> Self {
        let configs_dir = configs_dir.into();
        Self {
            environment: Environment::Development,
            host: "127.0.0.1".to_string(),
            port: 8000,
            default_config: configs_dir.join("default.yaml"),
            upload_config: configs_dir.join("temp_config.yaml"),
            configs_dir,
            max_upload_bytes: 20 * 1024 * 1024,
            otel_endpoint: None,
        }
    }
}

/// Defaults overridden by `LOGO_API_*` environment variables,
/// e.g. `LOGO_API_PORT=9000`.
pub fn get_configuration() -> Result<ServiceConfig, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("environment", "development")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8000)?
        .set_default("configs_dir", "configs")?
        .set_default("default_config", "configs/default.yaml")?
        .set_default("upload_config", "configs/temp_config.yaml")?
        .set_default("max_upload_bytes", 20 * 1024 * 1024)?
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize::<ServiceConfig>()
}
