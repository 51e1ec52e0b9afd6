use serde::Deserialize;
use std::fmt;

// Re-export credential file paths as the [security] section
pub use crate::security::CredentialFiles;

/// Default endpoint name when neither config nor host name provide one
pub const DEFAULT_ENDPOINT: &str = "SimulatedClient";

/// Complete simulator configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: CredentialFiles,
    #[serde(default)]
    pub objects: ObjectsConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub temperature: TemperatureConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Local endpoint identity
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointConfig {
    /// Endpoint name; host name (then DEFAULT_ENDPOINT) when unset
    #[serde(default)]
    pub name: Option<String>,
    /// Local address to bind; any when unset
    #[serde(default)]
    pub local_address: Option<String>,
    /// Local port; 0 picks an ephemeral port
    #[serde(default)]
    pub local_port: u16,
}

impl EndpointConfig {
    pub fn resolve_name(&self) -> String {
        self.name_or_else(host_name)
    }

    fn name_or_else(&self, host: impl FnOnce() -> Option<String>) -> String {
        self.name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(host)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }
}

fn host_name() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
}

/// Target server
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// "host:port" of the management or bootstrap server; scheme is derived
    /// from the credentials
    #[serde(default)]
    pub address: Option<String>,
    /// Register through a bootstrap server first
    #[serde(default)]
    pub bootstrap: bool,
}

/// Object types to instantiate
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectsConfig {
    #[serde(default = "default_enabled_objects")]
    pub enabled: Vec<u16>,
}

fn default_enabled_objects() -> Vec<u16> {
    vec![3, 6, 3303]
}

impl Default for ObjectsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_objects(),
        }
    }
}

/// Device object identity and clock
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_manufacturer")]
    pub manufacturer: String,
    #[serde(default = "default_model_number")]
    pub model_number: String,
    #[serde(default = "default_serial_number")]
    pub serial_number: String,
    #[serde(default = "default_firmware_version")]
    pub firmware_version: String,
    #[serde(default = "default_device_type")]
    pub device_type: String,
    #[serde(default = "default_hardware_version")]
    pub hardware_version: String,
    #[serde(default = "default_software_version")]
    pub software_version: String,
    /// How often the current-time resource is notified (seconds)
    #[serde(default = "default_clock_period")]
    pub clock_period_secs: u64,
}

fn default_manufacturer() -> String {
    "Sensorsim Demo Device".to_string()
}

fn default_model_number() -> String {
    "Model 500".to_string()
}

fn default_serial_number() -> String {
    "SS-500-000-0001".to_string()
}

fn default_firmware_version() -> String {
    "1.0.0".to_string()
}

fn default_device_type() -> String {
    "Demo".to_string()
}

fn default_hardware_version() -> String {
    "1.0.1".to_string()
}

fn default_software_version() -> String {
    "1.0.2".to_string()
}

fn default_clock_period() -> u64 {
    5
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            manufacturer: default_manufacturer(),
            model_number: default_model_number(),
            serial_number: default_serial_number(),
            firmware_version: default_firmware_version(),
            device_type: default_device_type(),
            hardware_version: default_hardware_version(),
            software_version: default_software_version(),
            clock_period_secs: default_clock_period(),
        }
    }
}

/// Location object
#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    /// Initial position as "lat:long", e.g. "48.131:11.459"
    #[serde(default)]
    pub position: Option<String>,
    /// Multiplier applied to random-walk and manual steps
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
    #[serde(default = "default_sample_period")]
    pub period_secs: u64,
}

fn default_scale_factor() -> f64 {
    1.0
}

fn default_sample_period() -> u64 {
    2
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            position: None,
            scale_factor: default_scale_factor(),
            period_secs: default_sample_period(),
        }
    }
}

impl LocationConfig {
    /// Parsed initial position; (0, 0) when unset.
    pub fn initial_position(&self) -> Result<(f64, f64), ConfigError> {
        match &self.position {
            Some(pos) => parse_position(pos),
            None => Ok((0.0, 0.0)),
        }
    }
}

/// Parse "lat:long" into two floats.
pub fn parse_position(pos: &str) -> Result<(f64, f64), ConfigError> {
    let invalid = || {
        ConfigError::Invalid(format!(
            "position '{}' must be two floats separated by a colon, e.g. 48.131:11.459",
            pos
        ))
    };

    let (lat, long) = pos.split_once(':').ok_or_else(invalid)?;
    let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let longitude: f64 = long.trim().parse().map_err(|_| invalid())?;
    Ok((latitude, longitude))
}

/// Temperature sensor object
#[derive(Debug, Clone, Deserialize)]
pub struct TemperatureConfig {
    /// Reading at startup (degrees Celsius)
    #[serde(default = "default_initial_temperature")]
    pub initial: f64,
    #[serde(default = "default_sample_period")]
    pub period_secs: u64,
}

fn default_initial_temperature() -> f64 {
    20.0
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            initial: default_initial_temperature(),
            period_secs: default_sample_period(),
        }
    }
}

/// External telemetry source; random walks when `url` is unset
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_telemetry_timeout")]
    pub timeout_ms: u64,
}

fn default_telemetry_timeout() -> u64 {
    1000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_telemetry_timeout(),
        }
    }
}

/// Observation channel
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Events buffered before new ones are dropped
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<SimConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: SimConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration, falling back to defaults when the file does not exist
pub fn load_config_or_default(path: &str) -> Result<SimConfig, ConfigError> {
    match load_config(path) {
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            let config = SimConfig::default();
            config.validate()?;
            Ok(config)
        }
        other => other,
    }
}

impl SimConfig {
    /// Checks values serde cannot (periods, positions, scale factor).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.clock_period_secs == 0
            || self.location.period_secs == 0
            || self.temperature.period_secs == 0
        {
            return Err(ConfigError::Invalid(
                "sampling periods must be at least one second".to_string(),
            ));
        }
        if !self.location.scale_factor.is_finite() {
            return Err(ConfigError::Invalid(
                "location scale_factor must be a finite number".to_string(),
            ));
        }
        self.location.initial_position()?;
        Ok(())
    }
}
