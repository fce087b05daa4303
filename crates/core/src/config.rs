//! Application configuration.
//!
//! Values come from built-in defaults, then `<config dir>/scoreboard/config.toml`,
//! then `SCOREBOARD_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

const APP_DIR: &str = "scoreboard";

const DEFAULT_CONFIG: &str = r#"# Scoreboard configuration.
# Every value can also be set through SCOREBOARD_<NAME>, e.g. SCOREBOARD_OWNER_INITIALS.

# Initials the cabinet records for you.
owner_initials = "DMK"

# VPin Studio on the cabinet.
cabinet_url = "http://pinball.local"
studio_port = 8089

leaderboard_url = "https://www.vpin-mania.net/api/highscores/table"
catalog_url = "https://raw.githubusercontent.com/VirtualPinballSpreadsheet/vps-db/main/db/vpsdb.json"

# Where scores are stored. Defaults to the platform data directory.
# document_path = "/path/to/scores.json"

scan_concurrency = 8
progress_interval_ms = 250
request_timeout_secs = 30
"#;

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Initials the cabinet records for the owner.
    pub owner_initials: String,
    /// Scheme and host of the cabinet, without port.
    pub cabinet_url: String,
    /// VPin Studio port on the cabinet.
    pub studio_port: u16,
    /// Leaderboard endpoint; the web id is appended.
    pub leaderboard_url: String,
    /// Catalog JSON dump.
    pub catalog_url: String,
    /// Score document.
    pub document_path: PathBuf,
    /// Requests in flight during a scan.
    pub scan_concurrency: usize,
    /// Spacing of progress events.
    pub progress_interval_ms: u64,
    /// HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            owner_initials: "DMK".to_string(),
            cabinet_url: "http://pinball.local".to_string(),
            studio_port: 8089,
            leaderboard_url: "https://www.vpin-mania.net/api/highscores/table".to_string(),
            catalog_url:
                "https://raw.githubusercontent.com/VirtualPinballSpreadsheet/vps-db/main/db/vpsdb.json"
                    .to_string(),
            document_path: default_document_path(),
            scan_concurrency: 8,
            progress_interval_ms: 250,
            request_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load from the default config file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path` (which may be missing) and the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let defaults = AppConfig::default();
        let settings = Config::builder()
            .set_default("owner_initials", defaults.owner_initials)?
            .set_default("cabinet_url", defaults.cabinet_url)?
            .set_default("studio_port", i64::from(defaults.studio_port))?
            .set_default("leaderboard_url", defaults.leaderboard_url)?
            .set_default("catalog_url", defaults.catalog_url)?
            .set_default(
                "document_path",
                defaults.document_path.to_string_lossy().into_owned(),
            )?
            .set_default("scan_concurrency", defaults.scan_concurrency as i64)?
            .set_default("progress_interval_ms", defaults.progress_interval_ms as i64)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("SCOREBOARD").try_parsing(true))
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;

        settings
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Base of the VPin Studio REST API.
    pub fn studio_base_url(&self) -> String {
        format!(
            "{}:{}/api/v1",
            self.cabinet_url.trim_end_matches('/'),
            self.studio_port
        )
    }

    /// Progress event spacing.
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `<config dir>/scoreboard/config.toml`.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

/// `<data dir>/scoreboard/scores.json`.
pub fn default_document_path() -> PathBuf {
    data_dir().join("scores.json")
}

/// `<data dir>/scoreboard`, used for the document and logs.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Write the commented default config file if there is none yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!("wrote default configuration to {}", path.display());
    Ok(())
}
