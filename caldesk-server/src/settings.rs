//! Server configuration at ~/.config/caldesk/config.toml
//!
//! Values can be overridden with `CALDESK_*` environment variables
//! (`CALDESK_PORT=8080`, `CALDESK_WEEK_STARTS_ON=sunday`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use caldesk_core::{SchedulerConfig, WeekStart};
use config::{Config, Environment, File};
use serde::Deserialize;

static DEFAULT_DATA_PATH: &str = "~/.local/share/caldesk/events.json";
const DEFAULT_PORT: u16 = 5000;

fn default_data_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_PATH)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub week_starts_on: WeekStart,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
}

impl Settings {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("caldesk");

        Ok(config_dir.join("config.toml"))
    }

    /// Load settings, writing a commented default config file on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("CALDESK"))
            .build()
            .with_context(|| format!("Could not read {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        Ok(settings)
    }

    /// Where events are persisted, with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        let full_path_str = shellexpand::tilde(&self.data_path.to_string_lossy()).into_owned();
        PathBuf::from(full_path_str)
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig::new(self.week_starts_on)
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> Result<()> {
        let contents = format!(
            "\
# caldesk configuration

# First day of week and month grids (monday or sunday):
# week_starts_on = \"monday\"

# Port the API listens on:
# port = {}

# Where events are stored:
# data_path = \"{}\"
",
            DEFAULT_PORT, DEFAULT_DATA_PATH
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Could not create config directory")?;
        }

        std::fs::write(path, contents).context("Could not write config file")?;

        Ok(())
    }
}
