//! CLI argument definitions for the mediadex binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// mediadex - media indexing jobs over a shared, single-writer search index.
#[derive(Parser, Debug)]
#[command(name = "mediadex", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Port for the server being started.
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<u16>,

    /// Data directory for the saved index, progress database and artifacts.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the index service behind the shared-secret RPC endpoint.
    IndexServer,
    /// Run the job, progress and query server with its worker pool.
    Serve,
}

impl CliArgs {
    /// Priority: --config flag > MEDIADEX_CONFIG env var > ~/.mediadex/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("MEDIADEX_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --port flag > MEDIADEX_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("MEDIADEX_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Priority: config file value > MEDIADEX_SECRET env var.
    /// `None` means the secret file under the data directory is used.
    pub fn resolve_secret(&self, config_secret: &str) -> Option<String> {
        if !config_secret.trim().is_empty() {
            return Some(config_secret.to_string());
        }
        std::env::var("MEDIADEX_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".mediadex").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".mediadex").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let args = CliArgs::try_parse_from(["mediadex", "index-server"]).unwrap();
        assert_eq!(args.command, Command::IndexServer);

        let args = CliArgs::try_parse_from(["mediadex", "serve", "--port", "6000", "-d", "/tmp/m"])
            .unwrap();
        assert_eq!(args.command, Command::Serve);
        assert_eq!(args.resolve_port(5000), 6000);
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/tmp/m"));
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(CliArgs::try_parse_from(["mediadex"]).is_err());
        assert!(CliArgs::try_parse_from(["mediadex", "crawl"]).is_err());
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let args =
            CliArgs::try_parse_from(["mediadex", "serve", "--config", "/etc/mediadex.toml"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/mediadex.toml"));
    }

    #[test]
    fn test_configured_secret_wins() {
        let args = CliArgs::try_parse_from(["mediadex", "serve"]).unwrap();
        assert_eq!(args.resolve_secret("password").as_deref(), Some("password"));
    }
}
