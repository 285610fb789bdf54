//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{CommsError, Result};
use crate::shake::ShakeVariant;
use crate::uart::{self, DriverSettings, UART_NUM_PORTS};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub uart: UartConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub shake: ShakeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which hardware backend drives the UART ports
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-memory hardware, every sent byte is received back
    Loopback,
    /// Host serial devices
    Serial,
}

/// UART driver configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UartConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,

    #[serde(default = "default_tx_fifo_depth")]
    pub tx_fifo_depth: usize,

    #[serde(default = "default_rx_buffer_size")]
    pub rx_buffer_size: usize,

    #[serde(default = "default_ports")]
    pub ports: Vec<PortConfig>,
}

/// One UART port
#[derive(Debug, Deserialize, Clone)]
pub struct PortConfig {
    pub index: u8,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Serial device, only used by the serial backend
    #[serde(default)]
    pub device: String,
}

/// Radio beacon configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    #[serde(default = "default_whitening")]
    pub whitening: bool,

    #[serde(default)]
    pub pn9_preroll: u32,

    #[serde(default)]
    pub beacon_port: u8,

    #[serde(default = "default_beacon_interval_ms")]
    pub beacon_interval_ms: u64,
}

/// SHAKE configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ShakeConfig {
    #[serde(default = "default_shake_variant")]
    pub variant: ShakeVariant,

    #[serde(default = "default_shake_output_length")]
    pub output_length: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rolling log files; empty logs to stdout only
    #[serde(default)]
    pub directory: String,
}

// Default value functions
fn default_backend() -> Backend { Backend::Loopback }
fn default_tx_fifo_depth() -> usize { uart::DEFAULT_TX_FIFO_DEPTH }
fn default_rx_buffer_size() -> usize { uart::DEFAULT_RX_BUFFER_SIZE }
fn default_ports() -> Vec<PortConfig> {
    vec![PortConfig { index: 0, baud_rate: default_baud_rate(), device: String::new() }]
}
fn default_baud_rate() -> u32 { 115_200 }

fn default_whitening() -> bool { true }
fn default_beacon_interval_ms() -> u64 { 1000 }

fn default_shake_variant() -> ShakeVariant { ShakeVariant::Shake128 }
fn default_shake_output_length() -> usize { 32 }

fn default_log_level() -> String { "info".to_string() }

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            tx_fifo_depth: default_tx_fifo_depth(),
            rx_buffer_size: default_rx_buffer_size(),
            ports: default_ports(),
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            whitening: default_whitening(),
            pn9_preroll: 0,
            beacon_port: 0,
            beacon_interval_ms: default_beacon_interval_ms(),
        }
    }
}

impl Default for ShakeConfig {
    fn default() -> Self {
        Self {
            variant: default_shake_variant(),
            output_length: default_shake_output_length(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn invalid(message: impl std::fmt::Display) -> CommsError {
    CommsError::Config(toml::de::Error::custom(message))
}

impl UartConfig {
    /// Buffer sizing for [`UartDriver::new`](crate::uart::UartDriver::new)
    pub fn driver_settings(&self) -> DriverSettings {
        DriverSettings {
            tx_fifo_depth: self.tx_fifo_depth,
            rx_buffer_size: self.rx_buffer_size,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
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
    /// use obc_comms::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.uart.tx_fifo_depth == 0 {
            return Err(invalid("tx_fifo_depth must be greater than 0"));
        }

        if self.uart.rx_buffer_size == 0 {
            return Err(invalid("rx_buffer_size must be greater than 0"));
        }

        let mut seen = HashSet::new();
        for port in &self.uart.ports {
            if port.index as usize >= UART_NUM_PORTS {
                return Err(invalid(format!(
                    "port index {} must be less than {}",
                    port.index, UART_NUM_PORTS
                )));
            }

            if !seen.insert(port.index) {
                return Err(invalid(format!("port {} configured more than once", port.index)));
            }

            if !uart::is_supported_baud_rate(port.baud_rate) {
                return Err(invalid(format!(
                    "port {} baud_rate {} is not supported",
                    port.index, port.baud_rate
                )));
            }

            if self.uart.backend == Backend::Serial && port.device.is_empty() {
                return Err(invalid(format!(
                    "port {} needs a device for the serial backend",
                    port.index
                )));
            }
        }

        if !seen.contains(&self.radio.beacon_port) {
            return Err(invalid(format!(
                "beacon_port {} is not a configured port",
                self.radio.beacon_port
            )));
        }

        if self.radio.beacon_interval_ms == 0 || self.radio.beacon_interval_ms > 60000 {
            return Err(invalid("beacon_interval_ms must be between 1 and 60000"));
        }

        if self.shake.output_length == 0 {
            return Err(invalid("shake output_length must be greater than 0"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(invalid(format!(
                "log level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}
