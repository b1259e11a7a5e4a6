//! Power meter client for eGauge telemetry
//!
//! This module defines the sampling boundary the controller depends on and
//! an HTTP/JSON adapter for an eGauge meter: register rates for generation,
//! household usage, and the vehicle charger circuit, plus the local sensor
//! endpoint carrying the split-phase voltage and the charger CT current.

use crate::config::MeterConfig;
use crate::error::{HeliotropeError, Result};
use crate::logging::get_logger;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;

/// One full meter reading consumed by the rate estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerSample {
    /// PV generation in watts
    pub generation_w: f64,

    /// Total household usage in watts (includes the vehicle charger)
    pub usage_w: f64,

    /// Vehicle charger circuit draw in watts
    pub vehicle_charger_w: f64,

    /// Measured charger voltage: sum of both legs of the split-phase feed
    pub charger_voltage: f64,

    /// Directly metered charge current in amps
    pub metered_charge_current_a: f64,
}

/// The cheap sensor-only reading used for verification and the slow-poll
/// safety check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Measured charger voltage (both legs)
    pub charger_voltage: f64,

    /// Directly metered charge current in amps
    pub metered_charge_current_a: f64,
}

/// Sampling capability the control loop depends on
#[async_trait::async_trait]
pub trait PowerMeter: Send {
    /// Take a full register + sensor sample
    async fn sample(&mut self) -> Result<PowerSample>;

    /// Take a sensor-only sample (voltage and metered current)
    async fn sample_sensor(&mut self) -> Result<SensorSample>;
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    jwt: String,
}

#[derive(Debug, Deserialize)]
struct RegisterEntry {
    name: String,
    rate: f64,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    registers: Vec<RegisterEntry>,
}

#[derive(Debug, Deserialize)]
struct SensorEntry {
    name: String,
    rate: f64,
}

#[derive(Debug, Deserialize)]
struct SensorResponse {
    sensors: Vec<SensorEntry>,
}

/// HTTP client for the eGauge web API
pub struct EgaugeMeter {
    http: reqwest::Client,
    config: MeterConfig,
    token: Option<String>,
    logger: crate::logging::StructuredLogger,
}

impl EgaugeMeter {
    /// Create a new meter client; does not touch the network
    pub fn new(config: &MeterConfig) -> Result<Self> {
        let logger = get_logger("meter");
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config: config.clone(),
            token: None,
            logger,
        })
    }

    /// Authenticate against the meter and verify it is reachable.
    ///
    /// Failure here is fatal at startup; the controller cannot run without a
    /// meter.
    pub async fn connect(&mut self) -> Result<()> {
        let url = format!("{}/api/auth/login", self.config.base_url);
        let body = serde_json::json!({
            "usr": self.config.username,
            "pwd": self.config.password,
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| HeliotropeError::meter(format!("Failed to reach meter: {}", e)))?;

        if !resp.status().is_success() {
            return Err(HeliotropeError::meter(format!(
                "Meter authentication failed: {}",
                resp.status()
            )));
        }

        let auth: AuthResponse = resp.json().await?;
        self.token = Some(auth.jwt);
        self.logger.info(&format!(
            "Connected to eGauge meter at {} (user {})",
            self.config.base_url, self.config.username
        ));
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut req = self.http.get(&url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let call = async {
            let resp = req.send().await?;
            if !resp.status().is_success() {
                return Err(HeliotropeError::meter(format!(
                    "Meter returned {} for {}",
                    resp.status(),
                    path
                )));
            }
            Ok(resp.json::<T>().await?)
        };

        match timeout(Duration::from_secs(self.config.timeout_secs), call).await {
            Ok(result) => result,
            Err(_) => Err(HeliotropeError::timeout(format!(
                "Meter request timed out: {}",
                path
            ))),
        }
    }

    async fn sample_registers(&self) -> Result<(f64, f64, f64)> {
        let resp: RegisterResponse = self.get_json("/api/register?rate=true&time=now").await?;
        decode_registers(&resp, &self.config)
    }
}

/// Pick the three power registers out of a register response, converting the
/// meter's kW rates to watts
fn decode_registers(resp: &RegisterResponse, config: &MeterConfig) -> Result<(f64, f64, f64)> {
    let rate_of = |name: &str| -> Result<f64> {
        resp.registers
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.rate * 1000.0)
            .ok_or_else(|| HeliotropeError::meter(format!("Register not reported: {}", name)))
    };

    Ok((
        rate_of(&config.generation_register)?,
        rate_of(&config.usage_register)?,
        rate_of(&config.charger_register)?,
    ))
}

/// Extract the split-phase voltage sum and the charger CT current from a
/// local sensor response
fn decode_sensors(resp: &SensorResponse, config: &MeterConfig) -> Result<SensorSample> {
    let rate_of = |name: &str| -> Result<f64> {
        resp.sensors
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.rate)
            .ok_or_else(|| HeliotropeError::meter(format!("Sensor not reported: {}", name)))
    };

    let l1 = rate_of("L1")?;
    let l2 = rate_of("L2")?;
    let current = rate_of(&config.charger_sensor)?;
    Ok(SensorSample {
        charger_voltage: l1 + l2,
        metered_charge_current_a: current,
    })
}

#[async_trait::async_trait]
impl PowerMeter for EgaugeMeter {
    async fn sample(&mut self) -> Result<PowerSample> {
        let (generation_w, usage_w, vehicle_charger_w) = self.sample_registers().await?;
        let sensor = self.sample_sensor().await?;
        let sample = PowerSample {
            generation_w,
            usage_w,
            vehicle_charger_w,
            charger_voltage: sensor.charger_voltage,
            metered_charge_current_a: sensor.metered_charge_current_a,
        };
        self.logger.debug(&format!(
            "Sample: gen={:.0}W use={:.0}W charger={:.0}W V={:.1} I={:.2}A",
            sample.generation_w,
            sample.usage_w,
            sample.vehicle_charger_w,
            sample.charger_voltage,
            sample.metered_charge_current_a
        ));
        Ok(sample)
    }

    async fn sample_sensor(&mut self) -> Result<SensorSample> {
        let resp: SensorResponse = self.get_json("/api/local?l=L1:L2&s=all").await?;
        decode_sensors(&resp, &self.config)
    }
}
