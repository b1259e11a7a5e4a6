//! Configuration management for Heliotrope
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{HeliotropeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Power meter connection configuration
    pub meter: MeterConfig,

    /// Vehicle command transport configuration
    pub vehicle: VehicleConfig,

    /// MQTT broker and topic configuration
    pub mqtt: MqttConfig,

    /// Control loop tuning
    pub controls: ControlsConfig,

    /// Status reporting configuration
    pub report: ReportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Power meter (eGauge) connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Base URL of the meter web API, e.g. "http://egauge.local"
    pub base_url: String,

    /// API username
    pub username: String,

    /// API password
    pub password: String,

    /// Register name reporting PV generation (kW)
    pub generation_register: String,

    /// Register name reporting total household usage (kW)
    pub usage_register: String,

    /// Register name reporting the vehicle charger circuit (kW)
    pub charger_register: String,

    /// Local sensor name carrying the charger CT current (A)
    pub charger_sensor: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Which transport executes vehicle commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleTransport {
    /// Local `tesla-control` binary over BLE
    BleCli,
    /// HTTP command proxy
    HttpProxy,
}

/// Vehicle command transport parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    /// Selected transport
    pub transport: VehicleTransport,

    /// Path to the tesla-control binary (BLE CLI transport)
    pub control_bin: String,

    /// Path to the command-authentication key file (BLE CLI transport)
    pub key_file: String,

    /// Base URL of the HTTP command proxy (HTTP transport)
    pub proxy_url: String,

    /// Vehicle identification number (HTTP transport)
    pub vin: String,

    /// Per-command timeout in seconds
    pub command_timeout_secs: u64,
}

/// MQTT topics consumed and produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// Inbound: solar-only policy flag ("True"/"False")
    pub solar_only: String,

    /// Inbound: TeslaMate geofence name
    pub geofence: String,

    /// Inbound: TeslaMate plugged-in flag ("true"/"false")
    pub plugged_in: String,

    /// Inbound: TeslaMate battery level percent
    pub battery_level: String,

    /// Inbound: TeslaMate charge limit percent
    pub charge_limit: String,

    /// Inbound: TeslaMate vehicle state string
    pub vehicle_state: String,

    /// Inbound: charge-delay deadline (RFC 3339 or unix epoch seconds)
    pub charge_delay_until: String,

    /// Outbound: periodic status string
    pub status: String,

    /// Outbound: confirmed charge rate in amps
    pub charge_rate: String,
}

/// MQTT broker parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host name or address
    pub host: String,

    /// Broker TCP port
    pub port: u16,

    /// Client identifier
    pub client_id: String,

    /// Optional username
    pub username: Option<String>,

    /// Optional password
    pub password: Option<String>,

    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,

    /// Geofence payload that maps to "at home"
    pub home_geofence: String,

    /// Topic map
    pub topics: TopicsConfig,
}

/// Comparison used when verifying a requested charge rate against the
/// rounded metered rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyComparison {
    /// Metered rate must reach at least the requested value
    AtLeast,
    /// Metered rate must equal the requested value exactly
    Exact,
}

/// Control loop tuning and safety limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Floor current in amps; below this the controller stops rather than
    /// trickle-charges
    pub min_charge_a: i64,

    /// Default charge limit percent, used until the event bus reports one
    pub charge_limit_pct: u8,

    /// Tick period while charging is being actively managed (seconds)
    pub fast_poll_secs: u64,

    /// Tick period while ineligible or idle (seconds)
    pub slow_poll_secs: u64,

    /// Sub-interval safety check during slow sleeps (seconds)
    pub slow_poll_check_secs: u64,

    /// Dwell time before acting on a start condition (seconds)
    pub start_delay_secs: u64,

    /// Dwell time before acting on an exhaustion stop (seconds)
    pub stop_delay_secs: u64,

    /// Wait after a wake command before starting (seconds)
    pub wake_settle_secs: u64,

    /// Wait after start_charging before verifying current flow (seconds)
    pub start_settle_secs: u64,

    /// Bounded attempts when verifying a commanded rate against the meter
    pub verify_attempts: u32,

    /// Spacing between verification attempts (milliseconds)
    pub verify_interval_ms: u64,

    /// Cool-down after a stop rejected for pre-cooling before the next stop
    /// attempt (seconds)
    pub stop_cooldown_secs: u64,

    /// Comparison used by rate verification
    pub verify_comparison: VerifyComparison,
}

/// Status reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Interval between published status strings (seconds)
    pub interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file or directory
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            base_url: "http://egauge.local".to_string(),
            username: String::new(),
            password: String::new(),
            generation_register: "Generation".to_string(),
            usage_register: "Usage".to_string(),
            charger_register: "Car Charger".to_string(),
            charger_sensor: "CT7".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            transport: VehicleTransport::BleCli,
            control_bin: "/usr/bin/tesla-control".to_string(),
            key_file: "/etc/heliotrope/private.pem".to_string(),
            proxy_url: String::new(),
            vin: String::new(),
            command_timeout_secs: 30,
        }
    }
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            solar_only: "heliotrope/solar_only".to_string(),
            geofence: "teslamate/cars/1/geofence".to_string(),
            plugged_in: "teslamate/cars/1/plugged_in".to_string(),
            battery_level: "teslamate/cars/1/battery_level".to_string(),
            charge_limit: "teslamate/cars/1/charge_limit_soc".to_string(),
            vehicle_state: "teslamate/cars/1/state".to_string(),
            charge_delay_until: "heliotrope/charge_delay_until".to_string(),
            status: "heliotrope/status".to_string(),
            charge_rate: "heliotrope/charge_rate".to_string(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "heliotrope".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 60,
            home_geofence: "Home".to_string(),
            topics: TopicsConfig::default(),
        }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            min_charge_a: 7,
            charge_limit_pct: 80,
            fast_poll_secs: 1,
            slow_poll_secs: 30,
            slow_poll_check_secs: 5,
            start_delay_secs: 30,
            stop_delay_secs: 30,
            wake_settle_secs: 5,
            start_settle_secs: 10,
            verify_attempts: 6,
            verify_interval_ms: 500,
            stop_cooldown_secs: 60,
            verify_comparison: VerifyComparison::AtLeast,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/heliotrope.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default search paths
    pub fn load() -> Result<Self> {
        let default_paths = [
            "heliotrope_config.yaml",
            "/data/heliotrope_config.yaml",
            "/etc/heliotrope/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.meter.base_url.is_empty() {
            return Err(HeliotropeError::validation(
                "meter.base_url",
                "Meter URL cannot be empty",
            ));
        }

        if self.controls.min_charge_a <= 0 {
            return Err(HeliotropeError::validation(
                "controls.min_charge_a",
                "Floor current must be positive",
            ));
        }

        if self.controls.charge_limit_pct == 0 || self.controls.charge_limit_pct > 100 {
            return Err(HeliotropeError::validation(
                "controls.charge_limit_pct",
                "Charge limit must be within 1-100",
            ));
        }

        if self.controls.fast_poll_secs == 0 || self.controls.slow_poll_secs == 0 {
            return Err(HeliotropeError::validation(
                "controls.fast_poll_secs",
                "Tick intervals must be greater than 0",
            ));
        }

        if self.controls.slow_poll_check_secs > self.controls.slow_poll_secs {
            return Err(HeliotropeError::validation(
                "controls.slow_poll_check_secs",
                "Safety sub-interval cannot exceed the slow tick interval",
            ));
        }

        if self.controls.verify_attempts == 0 {
            return Err(HeliotropeError::validation(
                "controls.verify_attempts",
                "Verification needs at least one attempt",
            ));
        }

        match self.vehicle.transport {
            VehicleTransport::BleCli => {
                if self.vehicle.control_bin.is_empty() {
                    return Err(HeliotropeError::validation(
                        "vehicle.control_bin",
                        "BLE CLI transport needs a control binary path",
                    ));
                }
            }
            VehicleTransport::HttpProxy => {
                if self.vehicle.proxy_url.is_empty() || self.vehicle.vin.is_empty() {
                    return Err(HeliotropeError::validation(
                        "vehicle.proxy_url",
                        "HTTP transport needs a proxy URL and VIN",
                    ));
                }
            }
        }

        if self.mqtt.host.is_empty() {
            return Err(HeliotropeError::validation(
                "mqtt.host",
                "Broker host cannot be empty",
            ));
        }

        if self.report.interval_secs == 0 {
            return Err(HeliotropeError::validation(
                "report.interval_secs",
                "Report interval must be greater than 0",
            ));
        }

        Ok(())
    }
}
