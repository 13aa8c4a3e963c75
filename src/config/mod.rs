mod file_config;

pub use file_config::FileConfig;

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: PathBuf,
    pub song_data: PathBuf,
    pub log_data: PathBuf,
    pub extension: String,
    pub reset: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            db_path: PathBuf::from("sparkify.db"),
            song_data: PathBuf::from("data/song_data"),
            log_data: PathBuf::from("data/log_data"),
            extension: "json".to_string(),
            reset: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub song_data: PathBuf,
    pub log_data: PathBuf,
    /// Without the leading dot.
    pub extension: String,
    pub reset: bool,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.db_path.clone());
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }
        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }

        let song_data = file
            .song_data
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.song_data.clone());
        validate_data_dir("song_data", &song_data)?;

        let log_data = file
            .log_data
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.log_data.clone());
        validate_data_dir("log_data", &log_data)?;

        let extension = file
            .extension
            .unwrap_or_else(|| cli.extension.clone())
            .trim_start_matches('.')
            .to_string();
        if extension.is_empty() {
            bail!("extension must not be empty");
        }

        let reset = file.reset.unwrap_or(cli.reset);

        Ok(AppConfig {
            db_path,
            song_data,
            log_data,
            extension,
            reset,
        })
    }
}

fn validate_data_dir(name: &str, dir: &Path) -> Result<()> {
    if !dir.exists() {
        bail!("{} directory does not exist: {:?}", name, dir);
    }
    if !dir.is_dir() {
        bail!("{} is not a directory: {:?}", name, dir);
    }
    Ok(())
}
