//! Configuration for SetuOSC
//!
//! Loads configuration from a TOML file. Every section and key is optional;
//! missing values fall back to the conventional port layout.

use crate::error::{Error, Result};
use crate::transport::BulkLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Top-level gateway configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub network: NetworkConfig,
    pub bulk: BulkConfig,
    pub protocol: ProtocolConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

/// Socket addresses and ports
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local address both listeners bind to
    ///
    /// Examples:
    /// - `0.0.0.0` - All interfaces
    /// - `127.0.0.1` - Localhost only
    pub bind_address: String,
    /// UDP command port
    pub listen_port: u16,
    /// UDP port on the client host that replies are sent to
    pub reply_port: u16,
    /// TCP bulk-transfer port
    pub tcp_port: u16,
    /// Reply host used until the first datagram arrives
    pub default_reply_host: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            listen_port: 11000,
            reply_port: 11001,
            tcp_port: 11002,
            default_reply_host: "127.0.0.1".to_string(),
        }
    }
}

/// TCP bulk channel limits
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Time a client has to send its request token
    pub read_timeout_secs: u64,
    /// Largest accepted request token
    pub max_request_bytes: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: 30,
            max_request_bytes: 1024,
        }
    }
}

/// Address namespace
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Prefix of every address this gateway registers and emits
    pub address_prefix: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            address_prefix: "/live".to_string(),
        }
    }
}

/// Process loop cadence
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Interval between `process_pending` calls in the daemon
    pub tick_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use setu_osc::config::GatewayConfig;
    ///
    /// let config = GatewayConfig::from_file("setu-osc.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check values that would only fail later at bind time
    pub fn validate(&self) -> Result<()> {
        self.bind_ip()?;
        self.default_reply_ip()?;
        if !self.protocol.address_prefix.starts_with('/') {
            return Err(Error::Config(format!(
                "address_prefix must start with '/': {}",
                self.protocol.address_prefix
            )));
        }
        if self.bulk.max_request_bytes == 0 {
            return Err(Error::Config("max_request_bytes must be non-zero".into()));
        }
        Ok(())
    }

    fn bind_ip(&self) -> Result<IpAddr> {
        parse_ip("bind_address", &self.network.bind_address)
    }

    fn default_reply_ip(&self) -> Result<IpAddr> {
        parse_ip("default_reply_host", &self.network.default_reply_host)
    }

    pub fn udp_listen_addr(&self) -> Result<SocketAddr> {
        Ok(SocketAddr::new(self.bind_ip()?, self.network.listen_port))
    }

    pub fn tcp_listen_addr(&self) -> Result<SocketAddr> {
        Ok(SocketAddr::new(self.bind_ip()?, self.network.tcp_port))
    }

    /// Initial reply target: default host on the reply port
    pub fn default_reply_addr(&self) -> Result<SocketAddr> {
        Ok(SocketAddr::new(self.default_reply_ip()?, self.network.reply_port))
    }

    pub fn bulk_limits(&self) -> BulkLimits {
        BulkLimits {
            read_timeout: Duration::from_secs(self.bulk.read_timeout_secs),
            max_request_bytes: self.bulk.max_request_bytes,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.runtime.tick_interval_ms)
    }

    /// Prefix without a trailing slash
    pub fn prefix(&self) -> &str {
        self.protocol.address_prefix.trim_end_matches('/')
    }

    /// Address of the notification sent just before shutdown
    pub fn disconnect_address(&self) -> String {
        format!("{}/connection/disconnected", self.prefix())
    }

    /// Address of the notification sent once registration is complete
    pub fn startup_address(&self) -> String {
        format!("{}/startup", self.prefix())
    }
}

fn parse_ip(key: &str, value: &str) -> Result<IpAddr> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("{} is not an IP address: {}", key, value)))
}
