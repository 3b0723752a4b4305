use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TvStatusConfig {
    pub device: DeviceConfig,
    pub status: StatusConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DeviceConfig {
    /// TV address (IP or hostname)
    #[serde(default = "default_device_host")]
    pub host: String,

    /// Pre-shared key sent as X-Auth-PSK
    #[serde(default)]
    pub psk: String,

    /// Timeout for JSON control API requests in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Timeout for IRCC remote-control requests in milliseconds
    #[serde(default = "default_ircc_timeout_ms")]
    pub ircc_timeout_ms: u64,

    /// Use adb to find the foreground app when the API has no answer
    #[serde(default = "default_adb_enabled")]
    pub adb_enabled: bool,

    /// adb TCP port on the TV
    #[serde(default = "default_adb_port")]
    pub adb_port: u16,

    #[serde(default = "default_adb_connect_timeout_ms")]
    pub adb_connect_timeout_ms: u64,

    #[serde(default = "default_adb_probe_timeout_ms")]
    pub adb_probe_timeout_ms: u64,

    /// Bind outgoing requests to the local interface that routes to the TV
    #[serde(default = "default_bind_local_address")]
    pub bind_local_address: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StatusConfig {
    /// Seconds between background polls
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,

    /// Consecutive failures tolerated before a signal falls back to its sentinel
    #[serde(default = "default_max_error_iterations")]
    pub max_error_iterations: u32,

    /// Seconds during which polling is skipped after a manual override
    #[serde(default = "default_override_cooldown_seconds")]
    pub override_cooldown_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// IP address to bind to
    #[serde(default = "default_server_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Allow cross-origin requests from a separately served frontend
    #[serde(default = "default_cors")]
    pub cors: bool,
}

impl DeviceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ircc_timeout(&self) -> Duration {
        Duration::from_millis(self.ircc_timeout_ms)
    }

    pub fn adb_target(&self) -> String {
        format!("{}:{}", self.host, self.adb_port)
    }
}

impl StatusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn override_cooldown(&self) -> Duration {
        Duration::from_secs(self.override_cooldown_seconds)
    }
}

const ENV_PREFIX: &str = "TVSTATUS";

impl TvStatusConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("tvstatus.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_layered(path, ENV_PREFIX)
    }

    /// Defaults, then the optional file, then `<env_prefix>_<SECTION>__<KEY>` variables
    fn load_layered<P: AsRef<Path>>(path: P, env_prefix: &str) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("device.host", default_device_host())?
            .set_default("device.psk", "")?
            .set_default("device.request_timeout_ms", default_request_timeout_ms())?
            .set_default("device.ircc_timeout_ms", default_ircc_timeout_ms())?
            .set_default("device.adb_enabled", default_adb_enabled())?
            .set_default("device.adb_port", default_adb_port())?
            .set_default(
                "device.adb_connect_timeout_ms",
                default_adb_connect_timeout_ms(),
            )?
            .set_default("device.adb_probe_timeout_ms", default_adb_probe_timeout_ms())?
            .set_default("device.bind_local_address", default_bind_local_address())?
            .set_default(
                "status.poll_interval_seconds",
                default_poll_interval_seconds(),
            )?
            .set_default("status.max_error_iterations", default_max_error_iterations())?
            .set_default(
                "status.override_cooldown_seconds",
                default_override_cooldown_seconds(),
            )?
            .set_default("server.ip", default_server_ip())?
            .set_default("server.port", default_server_port())?
            .set_default("server.cors", default_cors())?
            .add_source(File::with_name(&path_str).required(false))
            // TVSTATUS_STATUS__POLL_INTERVAL_SECONDS=15
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: TvStatusConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config.redacted());

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.host.trim().is_empty() {
            return Err(ConfigError::Message(
                "Device host must not be empty".to_string(),
            ));
        }

        if self.device.request_timeout_ms == 0 || self.device.ircc_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Device request timeouts must be greater than 0".to_string(),
            ));
        }

        if self.device.adb_enabled
            && (self.device.adb_connect_timeout_ms == 0 || self.device.adb_probe_timeout_ms == 0)
        {
            return Err(ConfigError::Message(
                "adb timeouts must be greater than 0".to_string(),
            ));
        }

        if self.status.poll_interval_seconds == 0 {
            return Err(ConfigError::Message(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Server port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Copy with the PSK masked, for logging
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.device.psk.is_empty() {
            copy.device.psk = "***".to_string();
        }
        copy
    }
}

impl Default for TvStatusConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig {
                host: default_device_host(),
                psk: String::new(),
                request_timeout_ms: default_request_timeout_ms(),
                ircc_timeout_ms: default_ircc_timeout_ms(),
                adb_enabled: default_adb_enabled(),
                adb_port: default_adb_port(),
                adb_connect_timeout_ms: default_adb_connect_timeout_ms(),
                adb_probe_timeout_ms: default_adb_probe_timeout_ms(),
                bind_local_address: default_bind_local_address(),
            },
            status: StatusConfig {
                poll_interval_seconds: default_poll_interval_seconds(),
                max_error_iterations: default_max_error_iterations(),
                override_cooldown_seconds: default_override_cooldown_seconds(),
            },
            server: ServerConfig {
                ip: default_server_ip(),
                port: default_server_port(),
                cors: default_cors(),
            },
        }
    }
}

// Default value functions
fn default_device_host() -> String {
    "192.168.1.100".to_string()
}
fn default_request_timeout_ms() -> u64 {
    5000
}
fn default_ircc_timeout_ms() -> u64 {
    5000
}
fn default_adb_enabled() -> bool {
    true
}
fn default_adb_port() -> u16 {
    5555
}
fn default_adb_connect_timeout_ms() -> u64 {
    2000
}
fn default_adb_probe_timeout_ms() -> u64 {
    3000
}
fn default_bind_local_address() -> bool {
    true
}

fn default_poll_interval_seconds() -> u64 {
    10
}
fn default_max_error_iterations() -> u32 {
    3
}
fn default_override_cooldown_seconds() -> u64 {
    5
}

fn default_server_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_server_port() -> u16 {
    5000
}
fn default_cors() -> bool {
    true
}
