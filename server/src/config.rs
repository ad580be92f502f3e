use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Command-line flags for the location sharing relay server.
///
/// Every value field is optional and only serialized when given, so the CLI
/// layer overrides TOML and env values only for flags actually passed.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "locshare-server", version, about = "Real-time location sharing relay")]
pub struct CliArgs {
    /// Port to listen on [default: 8080]
    #[arg(long, env = "LOCSHARE_PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long, env = "LOCSHARE_BIND_ADDRESS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./locshare.toml")]
    #[serde(skip)]
    pub config: String,

    /// Directory of pre-built front-end assets served on every non-WebSocket path [default: frontend/dist]
    #[arg(long, env = "LOCSHARE_STATIC_DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "LOCSHARE_JSON_LOGS")]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_config: bool,

    /// Per-connection outbound queue capacity, in messages [default: 32]
    #[arg(long, env = "LOCSHARE_OUTBOUND_QUEUE")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_queue: Option<usize>,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub static_dir: String,
    pub json_logs: bool,
    pub generate_config: bool,
    pub outbound_queue: usize,

    /// Heartbeat configuration (loaded from [heartbeat] section in TOML)
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

/// WebSocket ping/pong keepalive settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Seconds between server pings; 0 disables the heartbeat (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing the connection (default: 10)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

impl HeartbeatConfig {
    pub fn enabled(&self) -> bool {
        self.ping_interval_secs > 0
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            static_dir: "frontend/dist".to_string(),
            json_logs: false,
            generate_config: false,
            outbound_queue: 32,
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (LOCSHARE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment(CliArgs::parse()).extract()
    }

    fn figment(cli: CliArgs) -> Figment {
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("LOCSHARE_").split("__"))
            .merge(Serialized::defaults(cli))
    }

    /// `bind_address:port` as passed to the TCP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Location Sharing Relay Configuration
# Place this file at ./locshare.toml or specify with --config <path>
# All settings can be overridden via environment variables (LOCSHARE_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Directory of pre-built front-end assets
# static_dir = "frontend/dist"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Messages buffered per client before broadcasts to it are skipped.
# Every broadcast carries the full location set, so a skipped message
# is superseded by the next one.
# outbound_queue = 32

# ---- Heartbeat ----
# [heartbeat]
# ping_interval_secs = 30  # 0 disables server pings
# pong_timeout_secs = 10
"#
    .to_string()
}
