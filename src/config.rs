//! Конфигурация сервиса
//!
//! Порядок источников: значения по умолчанию -> `config/app.toml` (если есть)
//! -> переменные окружения `LINREG__<SECTION>__<KEY>`.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub training: TrainingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Директория локального blob store
    pub root: String,
    /// Имя блоба с артефактом модели
    pub model_blob: String,
    /// Блоб с обучающими записями (JSON-массив); без него - синтетические данные
    #[serde(default)]
    pub training_blob: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub target_column: String,
    pub test_fraction: f64,
    pub seed: u64,
    pub sample_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Директива EnvFilter, если RUST_LOG не задан
    pub level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default())
            .context("Failed to encode default configuration")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("LINREG")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let cfg: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if !(self.training.test_fraction > 0.0 && self.training.test_fraction < 1.0) {
            anyhow::bail!(
                "training.test_fraction must be in (0, 1), got {}",
                self.training.test_fraction
            );
        }
        if self.training.target_column.is_empty() {
            anyhow::bail!("training.target_column must not be empty");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| {
                format!("Invalid bind address {}:{}", self.server.host, self.server.port)
            })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            storage: StorageConfig {
                root: "./blobs".to_string(),
                model_blob: "model.json".to_string(),
                training_blob: None,
            },
            training: TrainingConfig {
                target_column: "target".to_string(),
                test_fraction: 0.2,
                seed: 42,
                sample_rows: 100,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
