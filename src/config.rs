//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and every field is optional; missing values fall back to the
//! defaults below, so an empty file is a valid configuration.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::calibration::{CalibrationSettings, MismatchPolicy};
use crate::error::{Result, SharedJoystickError};
use crate::wire::protocol::DEFAULT_PORT;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Server IPv4 address the client sends to; empty means ask at startup
    #[serde(default)]
    pub server_address: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Client configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Delay between frames; 0 sends as fast as possible
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
}

/// Server output backend
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Virtual joystick through /dev/uinput
    Uinput,
    /// Log applied values only
    Log,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    #[serde(default = "default_output")]
    pub output: OutputKind,

    #[serde(default = "default_sweep_on_start")]
    pub sweep_on_start: bool,

    #[serde(default = "default_sweep_step_ms")]
    pub sweep_step_ms: u64,
}

/// Calibration configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    #[serde(default)]
    pub on_axis_mismatch: MismatchPolicy,

    /// Where to persist calibration; empty disables persistence
    #[serde(default)]
    pub profile_path: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files; empty logs to stderr only
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_bind_address() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { DEFAULT_PORT }

fn default_send_interval_ms() -> u64 { 0 }

fn default_window_ms() -> u64 { 10 }
fn default_output() -> OutputKind { OutputKind::Uinput }
fn default_sweep_on_start() -> bool { true }
fn default_sweep_step_ms() -> u64 { 100 }

fn default_sample_interval_ms() -> u64 { 1 }

fn default_log_level() -> String { "info".to_string() }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: String::new(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            send_interval_ms: default_send_interval_ms(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            output: default_output(),
            sweep_on_start: default_sweep_on_start(),
            sweep_step_ms: default_sweep_step_ms(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            on_axis_mismatch: MismatchPolicy::default(),
            profile_path: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn invalid(message: impl std::fmt::Display) -> SharedJoystickError {
    SharedJoystickError::Config(toml::de::Error::custom(message))
}

fn parse_ipv4(name: &str, value: &str) -> Result<Ipv4Addr> {
    value
        .parse()
        .map_err(|_| invalid(format!("{} '{}' is not a valid IPv4 address", name, value)))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use shared_joystick::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.network.port == 0 {
            return Err(invalid("port must be between 1 and 65535"));
        }
        parse_ipv4("bind_address", &self.network.bind_address)?;
        if !self.network.server_address.is_empty() {
            parse_ipv4("server_address", &self.network.server_address)?;
        }

        if self.client.send_interval_ms > 1000 {
            return Err(invalid("send_interval_ms must be between 0 and 1000"));
        }

        if self.server.window_ms == 0 || self.server.window_ms > 1000 {
            return Err(invalid("window_ms must be between 1 and 1000"));
        }

        if self.server.sweep_step_ms == 0 || self.server.sweep_step_ms > 5000 {
            return Err(invalid("sweep_step_ms must be between 1 and 5000"));
        }

        if self.calibration.sample_interval_ms == 0 || self.calibration.sample_interval_ms > 100 {
            return Err(invalid("sample_interval_ms must be between 1 and 100"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "log level must be one of: {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}

impl NetworkConfig {
    /// Server socket address, or `None` if no server address is configured
    ///
    /// # Errors
    ///
    /// Returns `Config` if the address is not IPv4.
    pub fn server_socket_addr(&self) -> Result<Option<SocketAddr>> {
        if self.server_address.is_empty() {
            return Ok(None);
        }
        let ip = parse_ipv4("server_address", &self.server_address)?;
        Ok(Some(SocketAddrV4::new(ip, self.port).into()))
    }

    /// Local socket address the server listens on
    ///
    /// # Errors
    ///
    /// Returns `Config` if the address is not IPv4.
    pub fn bind_socket_addr(&self) -> Result<SocketAddr> {
        let ip = parse_ipv4("bind_address", &self.bind_address)?;
        Ok(SocketAddrV4::new(ip, self.port).into())
    }
}

impl ClientConfig {
    /// Send interval, or `None` when uncapped
    #[must_use]
    pub fn send_interval(&self) -> Option<Duration> {
        (self.send_interval_ms > 0).then(|| Duration::from_millis(self.send_interval_ms))
    }
}

impl ServerConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    #[must_use]
    pub fn sweep_step(&self) -> Duration {
        Duration::from_millis(self.sweep_step_ms)
    }
}

impl CalibrationConfig {
    #[must_use]
    pub fn settings(&self) -> CalibrationSettings {
        CalibrationSettings {
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            mismatch_policy: self.on_axis_mismatch,
        }
    }

    /// Profile location, or `None` when persistence is disabled
    #[must_use]
    pub fn profile_path(&self) -> Option<PathBuf> {
        (!self.profile_path.is_empty()).then(|| PathBuf::from(&self.profile_path))
    }
}
