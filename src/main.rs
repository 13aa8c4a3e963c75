use anyhow::{Context, Result};
use clap::Parser;
use sparkify_etl::config::{AppConfig, CliConfig, FileConfig};
use sparkify_etl::{process_data, FileKind, SqliteWarehouseStore, WarehouseStore};
use std::path::PathBuf;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite warehouse database file.
    #[clap(long, value_parser = parse_path, default_value = "sparkify.db")]
    pub db_path: PathBuf,

    /// Directory holding the song metadata files.
    #[clap(long, value_parser = parse_path, default_value = "data/song_data")]
    pub song_data: PathBuf,

    /// Directory holding the listening log files.
    #[clap(long, value_parser = parse_path, default_value = "data/log_data")]
    pub log_data: PathBuf,

    /// Extension of the input files.
    #[clap(long, default_value = "json")]
    pub extension: String,

    /// Drop and recreate all tables before loading.
    #[clap(long)]
    pub reset: bool,

    /// Optional TOML config file. Its values override the flags above.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            song_data: self.song_data.clone(),
            log_data: self.log_data.clone(),
            extension: self.extension.clone(),
            reset: self.reset,
        }
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Opening SQLite warehouse database at {:?}...", config.db_path);
    let store = SqliteWarehouseStore::open(&config.db_path, config.reset)?;

    let songs = process_data(&store, &config.song_data, &config.extension, FileKind::Song);
    let logs = process_data(&store, &config.log_data, &config.extension, FileKind::Log);

    let counts = store.counts().context("Failed to count warehouse rows")?;
    info!(
        "Warehouse now holds {} songplays, {} users, {} songs, {} artists, {} time rows",
        counts.songplays, counts.users, counts.songs, counts.artists, counts.time
    );
    if songs.files_skipped + logs.files_skipped + songs.files_failed + logs.files_failed > 0 {
        warn!(
            "{} song files and {} log files were not loaded, see warnings above",
            songs.files_skipped + songs.files_failed,
            logs.files_skipped + logs.files_failed
        );
    }

    Ok(())
}
