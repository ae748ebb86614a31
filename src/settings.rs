use std::io;
use std::path::PathBuf;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const APP_DIR: &str = "assumerole";
const CACHE_FILE: &str = "cache.json";

#[derive(Debug, Clone)]
pub struct Settings {
    pub cache_file: PathBuf,
    pub verbosity: u8,
}

impl Settings {
    pub fn new(cache_file: Option<PathBuf>, verbosity: u8) -> anyhow::Result<Self> {
        let cache_file = match cache_file {
            Some(path) => path,
            None => default_cache_file()?,
        };
        Ok(Settings {
            cache_file,
            verbosity,
        })
    }

    pub fn level(&self) -> LevelFilter {
        match self.verbosity {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    pub fn init_logging(&self) -> anyhow::Result<()> {
        let filter = EnvFilter::builder()
            .with_default_directive(self.level().into())
            .from_env_lossy();

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to set up logging: {}", e))
    }
}

/// `~/.local/share/assumerole/cache.json`
pub fn default_cache_file() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("could not determine the home directory"))?;
    Ok(home
        .join(".local")
        .join("share")
        .join(APP_DIR)
        .join(CACHE_FILE))
}
