//! CLI argument definitions for the Teller service.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Teller, a banking-assistant chat service.
#[derive(Parser, Debug)]
#[command(name = "teller", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API bind host.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// API bind port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// SQLite database path.
    #[arg(short = 'd', long = "database")]
    pub database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Store a demo credential (user "demo", secret "demo-secret") at startup.
    #[arg(long = "seed-demo-user")]
    pub seed_demo_user: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TELLER_CONFIG env var > platform default (~/.teller/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TELLER_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API bind host.
    ///
    /// Priority: --host flag > config file value.
    pub fn resolve_host(&self, config_host: &str) -> String {
        if let Some(ref h) = self.host {
            return h.clone();
        }
        config_host.to_string()
    }

    /// Resolve the API bind port.
    ///
    /// Priority: --port flag > TELLER_PORT env var > config file value > 7600.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("TELLER_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        7600
    }

    /// Resolve the SQLite database path.
    ///
    /// Priority: --database flag > config file value.
    pub fn resolve_database(&self, config_path: &str) -> PathBuf {
        if let Some(ref p) = self.database {
            return p.clone();
        }
        PathBuf::from(config_path)
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > RUST_LOG (read by the subscriber).
    /// Returns `None` if not overridden.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".teller").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".teller").join("config.toml");
    }
    PathBuf::from("teller.toml")
}
