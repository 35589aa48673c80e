use std::{path::PathBuf, time::Duration};

use chrono_tz::Tz;
use clap::{Parser, ValueEnum};
use engine::EngineSettings;
use serde::Deserialize;

use crate::error::{AppError, Result};

const DEFAULT_CONFIG_PATH: &str = "config/tally.toml";

/// Where records are read from and written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Http,
    File,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: Backend,
    pub base_url: String,
    pub data_path: PathBuf,
    /// IANA zone name the date filters are interpreted in.
    pub timezone: String,
    pub page_size: usize,
    pub undo_delay_ms: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            base_url: "http://127.0.0.1:3000".to_string(),
            data_path: PathBuf::from("data/transactions.json"),
            timezone: "UTC".to_string(),
            page_size: engine::DEFAULT_PAGE_SIZE,
            undo_delay_ms: 5000,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|err| AppError::InvalidConfig(format!("timezone {}: {err}", self.timezone)))?;
        if self.page_size == 0 {
            return Err(AppError::InvalidConfig(
                "page_size must be at least 1".to_string(),
            ));
        }
        Ok(EngineSettings {
            undo_delay: Duration::from_millis(self.undo_delay_ms),
            page_size: self.page_size,
            timezone,
        })
    }
}

#[derive(Debug, Parser)]
#[command(name = "tally", disable_version_flag = true)]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override the record backend.
    #[arg(long, value_enum)]
    backend: Option<Backend>,
    /// Override base URL (e.g. http://127.0.0.1:3000).
    #[arg(long)]
    base_url: Option<String>,
    /// Override the JSON file used by the file backend.
    #[arg(long)]
    data_path: Option<PathBuf>,
    /// Override timezone (IANA name).
    #[arg(long)]
    timezone: Option<String>,
    #[arg(long)]
    page_size: Option<usize>,
    /// Override the undo window, in milliseconds.
    #[arg(long)]
    undo_delay_ms: Option<u64>,
    #[arg(long, env = "TALLY_LOG")]
    log_level: Option<String>,
}

pub fn load() -> Result<AppConfig> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("TALLY").try_parsing(true));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(backend) = args.backend {
        settings.backend = backend;
    }
    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    if let Some(data_path) = args.data_path {
        settings.data_path = data_path;
    }
    if let Some(timezone) = args.timezone {
        settings.timezone = timezone;
    }
    if let Some(page_size) = args.page_size {
        settings.page_size = page_size;
    }
    if let Some(undo_delay_ms) = args.undo_delay_ms {
        settings.undo_delay_ms = undo_delay_ms;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }

    Ok(settings)
}
