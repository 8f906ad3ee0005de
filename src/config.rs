//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "rest-timer")]
#[command(about = "A rest timer that stays in sync across every instance sharing a store")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Directory holding the shared timer state
    /// (defaults to ~/.config/rest-timer)
    #[arg(short, long)]
    pub store_dir: Option<PathBuf>,

    /// Keep state in memory only; nothing is shared with other processes
    #[arg(long, conflicts_with = "store_dir")]
    pub memory: bool,

    /// Seconds between fallback re-reads of the store
    #[arg(long, default_value = "5")]
    pub resync_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Store directory, falling back to the per-user default
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir.clone().unwrap_or_else(default_store_dir)
    }

    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_secs.max(1))
    }
}

fn default_store_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("rest-timer")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["rest-timer"]).unwrap();
        assert_eq!(config.address(), "127.0.0.1:20554");
        assert_eq!(config.log_level(), "info");
        assert!(config.store_dir().ends_with(".config/rest-timer"));
        assert_eq!(config.resync_period(), Duration::from_secs(5));
    }

    #[test]
    fn explicit_store_dir_and_zero_resync() {
        let config =
            Config::try_parse_from(["rest-timer", "--store-dir", "/tmp/rt", "--resync-secs", "0", "-v"])
                .unwrap();
        assert_eq!(config.store_dir(), PathBuf::from("/tmp/rt"));
        assert_eq!(config.resync_period(), Duration::from_secs(1));
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn memory_conflicts_with_store_dir() {
        assert!(Config::try_parse_from(["rest-timer", "--memory", "--store-dir", "/tmp/rt"]).is_err());
    }
}
