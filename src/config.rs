//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

use crate::timer::SkipPolicy;

/// CLI argument parsing structure
#[derive(Debug, Clone, Parser)]
#[command(name = "pomodoro-sync")]
#[command(about = "Real-time pomodoro timer synchronization server")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Longest wait for a device to accept a message, in milliseconds
    #[arg(long, default_value = "2000")]
    pub send_timeout_ms: u64,

    /// Longest wait for the settings or task store, in milliseconds
    #[arg(long, default_value = "3000")]
    pub store_timeout_ms: u64,

    /// Whether the next session starts paused after a skip or completion
    #[arg(long, value_enum, default_value = "pause")]
    pub skip_policy: SkipPolicy,

    /// Outbound queue depth per device connection
    #[arg(long, default_value = "32")]
    pub channel_capacity: usize,

    /// JSON file with initial user settings and tasks
    #[arg(long)]
    pub data_file: Option<PathBuf>,

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
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_from(["pomodoro-sync"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.address(), "0.0.0.0:8000");
        assert_eq!(config.skip_policy, SkipPolicy::Pause);
        assert_eq!(config.store_timeout_ms, 3000);
        assert_eq!(config.log_level(), "info");
        assert!(config.data_file.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::parse_from([
            "pomodoro-sync",
            "--port",
            "9100",
            "--skip-policy",
            "resume",
            "--data-file",
            "seed.json",
            "-v",
        ]);
        assert_eq!(config.port, 9100);
        assert_eq!(config.skip_policy, SkipPolicy::Resume);
        assert_eq!(config.data_file, Some(PathBuf::from("seed.json")));
        assert_eq!(config.log_level(), "debug");
    }
}
