//! Configuration handling for the fwup tool.
//!
//! Settings come from an optional YAML file, then environment variables,
//! then command-line flags (applied by the caller).

use anyhow::{Context, Result};
use fwup_session::{SessionConfig, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default key artifact written by `fwup keygen`
pub const DEFAULT_SECRETS_PATH: &str = "secret_build_output.txt";

/// Tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FwupConfig {
    /// Serial device node used by `fwup update`
    pub port: Option<PathBuf>,
    /// Line speed; the port is always opened 8N1 with no flow control
    pub baud_rate: u32,
    /// Key artifact path
    pub secrets: PathBuf,
    /// Byte written to request update mode
    pub handshake_byte: u8,
    /// Bound on the handshake echo wait
    pub handshake_timeout: Duration,
    /// Bound on every response wait
    pub response_timeout: Duration,
}

impl Default for FwupConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            secrets: PathBuf::from(DEFAULT_SECRETS_PATH),
            handshake_byte: session.handshake_byte,
            handshake_timeout: session.handshake_timeout,
            response_timeout: session.response_timeout,
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    fwup: Option<FileConfig>,
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    port: Option<PathBuf>,
    baud_rate: Option<u32>,
    secrets: Option<PathBuf>,
    handshake_byte: Option<u8>,
    handshake_timeout: Option<String>,
    response_timeout: Option<String>,
}

impl FwupConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root_config) => {
                    config.apply_root_config(root_config)?;
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => warn!(
                    "Failed to parse config file {:?} ({}), using defaults",
                    config_path.as_ref(),
                    e
                ),
            },
            Err(_) => info!(
                "Config file {:?} not found, using defaults",
                config_path.as_ref()
            ),
        }

        config.apply_environment_overrides()?;
        Ok(config)
    }

    /// Session settings derived from this configuration
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            handshake_byte: self.handshake_byte,
            handshake_timeout: self.handshake_timeout,
            response_timeout: self.response_timeout,
        }
    }

    fn apply_root_config(&mut self, root_config: RootConfig) -> Result<()> {
        let Some(file) = root_config.fwup else {
            return Ok(());
        };

        if let Some(port) = file.port {
            self.port = Some(port);
        }
        if let Some(baud_rate) = file.baud_rate {
            self.baud_rate = baud_rate;
        }
        if let Some(secrets) = file.secrets {
            self.secrets = secrets;
        }
        if let Some(byte) = file.handshake_byte {
            self.handshake_byte = byte;
        }
        if let Some(value) = file.handshake_timeout {
            self.handshake_timeout = humantime::parse_duration(&value)
                .with_context(|| format!("invalid handshake_timeout {:?}", value))?;
        }
        if let Some(value) = file.response_timeout {
            self.response_timeout = humantime::parse_duration(&value)
                .with_context(|| format!("invalid response_timeout {:?}", value))?;
        }
        Ok(())
    }

    fn apply_environment_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("FWUP_PORT") {
            info!("Serial port overridden by environment: {}", port);
            self.port = Some(PathBuf::from(port));
        }

        if let Some(baud) = lookup("FWUP_BAUD") {
            self.baud_rate = baud
                .parse()
                .with_context(|| format!("FWUP_BAUD is not a baud rate: {:?}", baud))?;
            info!("Baud rate overridden by environment: {}", self.baud_rate);
        }

        if let Some(secrets) = lookup("FWUP_SECRETS") {
            info!("Key artifact overridden by environment: {}", secrets);
            self.secrets = PathBuf::from(secrets);
        }

        if let Some(ms) = lookup("FWUP_RESPONSE_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("FWUP_RESPONSE_TIMEOUT_MS is not a number: {:?}", ms))?;
            self.response_timeout = Duration::from_millis(ms);
            info!("Response timeout overridden by environment: {}ms", ms);
        }

        if let Some(ms) = lookup("FWUP_HANDSHAKE_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("FWUP_HANDSHAKE_TIMEOUT_MS is not a number: {:?}", ms))?;
            self.handshake_timeout = Duration::from_millis(ms);
            info!("Handshake timeout overridden by environment: {}ms", ms);
        }

        Ok(())
    }
}
