//! Vehicle command transports
//!
//! The controller drives charging through an abstract command interface;
//! this module provides the BLE CLI transport (the `tesla-control` binary
//! with a local key file) and an HTTP command-proxy transport. Raw transport
//! failures are classified into a structured cause so the state machine can
//! treat "already charging" and "pre-cooling" outcomes specially instead of
//! string-matching error text at call sites.

use crate::config::VehicleConfig;
use crate::error::{HeliotropeError, Result};
use crate::logging::get_logger;
use std::time::Duration;
use tokio::time::timeout;

/// Classified cause attached to a command result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCause {
    /// Command succeeded
    None,
    /// start_charging rejected because a session is already running
    AlreadyCharging,
    /// stop_charging rejected because the vehicle is pre-cooling the battery
    NotChargingPrecool,
    /// Command did not complete within the configured timeout
    Timeout,
    /// Transport could not be reached at all
    TransportClosed,
    /// Anything else
    Unknown,
}

/// Outcome of one vehicle command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResult {
    pub ok: bool,
    pub cause: CommandCause,
}

impl CommandResult {
    /// A plain success
    pub fn success() -> Self {
        Self {
            ok: true,
            cause: CommandCause::None,
        }
    }

    /// A classified failure
    pub fn failed(cause: CommandCause) -> Self {
        Self { ok: false, cause }
    }
}

/// Command execution capability the control loop depends on
#[async_trait::async_trait]
pub trait VehicleCommand: Send + Sync {
    /// Startup reachability check; failure here is fatal
    async fn probe(&self) -> Result<()>;

    /// Wake the vehicle from sleep
    async fn wake(&mut self) -> CommandResult;

    /// Begin a charging session
    async fn start_charging(&mut self) -> CommandResult;

    /// End the charging session
    async fn stop_charging(&mut self) -> CommandResult;

    /// Set the charge rate in whole amps
    async fn set_charge_rate(&mut self, amps: i64) -> CommandResult;
}

#[async_trait::async_trait]
impl VehicleCommand for Box<dyn VehicleCommand> {
    async fn probe(&self) -> Result<()> {
        (**self).probe().await
    }

    async fn wake(&mut self) -> CommandResult {
        (**self).wake().await
    }

    async fn start_charging(&mut self) -> CommandResult {
        (**self).start_charging().await
    }

    async fn stop_charging(&mut self) -> CommandResult {
        (**self).stop_charging().await
    }

    async fn set_charge_rate(&mut self, amps: i64) -> CommandResult {
        (**self).set_charge_rate(amps).await
    }
}

/// Classify raw failure text from either transport into a command cause
pub(crate) fn classify_failure(text: &str) -> CommandCause {
    let lower = text.to_lowercase();
    if lower.contains("is_charging") || lower.contains("already") {
        CommandCause::AlreadyCharging
    } else if lower.contains("not_charging")
        || lower.contains("precondition")
        || lower.contains("precool")
    {
        CommandCause::NotChargingPrecool
    } else if lower.contains("timed out") || lower.contains("timeout") {
        CommandCause::Timeout
    } else if lower.contains("closed") || lower.contains("connection refused") {
        CommandCause::TransportClosed
    } else {
        CommandCause::Unknown
    }
}

/// Local `tesla-control` CLI over Bluetooth LE
pub struct TeslaControlCli {
    control_bin: String,
    key_file: String,
    command_timeout: Duration,
    logger: crate::logging::StructuredLogger,
}

impl TeslaControlCli {
    pub fn new(config: &VehicleConfig) -> Self {
        let logger = get_logger("vehicle");
        Self {
            control_bin: config.control_bin.clone(),
            key_file: config.key_file.clone(),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            logger,
        }
    }

    async fn run(&self, args: &[&str]) -> CommandResult {
        let mut cmd = tokio::process::Command::new(&self.control_bin);
        cmd.arg("-ble").arg("-key-file").arg(&self.key_file);
        cmd.args(args);
        self.logger
            .debug(&format!("Executing {} {:?}", self.control_bin, args));

        let output = match timeout(self.command_timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                self.logger
                    .warn(&format!("Failed to spawn {}: {}", self.control_bin, e));
                return CommandResult::failed(CommandCause::TransportClosed);
            }
            Err(_) => {
                self.logger
                    .warn(&format!("Command timed out: {:?}", args));
                return CommandResult::failed(CommandCause::Timeout);
            }
        };

        if output.status.success() {
            return CommandResult::success();
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let cause = classify_failure(&stderr);
        self.logger.warn(&format!(
            "Command {:?} failed ({:?}): {}",
            args,
            cause,
            stderr.trim()
        ));
        CommandResult::failed(cause)
    }
}

#[async_trait::async_trait]
impl VehicleCommand for TeslaControlCli {
    async fn probe(&self) -> Result<()> {
        tokio::fs::metadata(&self.control_bin).await.map_err(|e| {
            HeliotropeError::vehicle(format!(
                "Control binary not available at {}: {}",
                self.control_bin, e
            ))
        })?;
        Ok(())
    }

    async fn wake(&mut self) -> CommandResult {
        self.run(&["-domain", "vcsec", "wake"]).await
    }

    async fn start_charging(&mut self) -> CommandResult {
        self.run(&["charging-start"]).await
    }

    async fn stop_charging(&mut self) -> CommandResult {
        self.run(&["charging-stop"]).await
    }

    async fn set_charge_rate(&mut self, amps: i64) -> CommandResult {
        self.run(&["charging-set-amps", &amps.to_string()]).await
    }
}

/// HTTP command proxy transport
pub struct HttpVehicleProxy {
    http: reqwest::Client,
    proxy_url: String,
    vin: String,
    logger: crate::logging::StructuredLogger,
}

impl HttpVehicleProxy {
    pub fn new(config: &VehicleConfig) -> Result<Self> {
        let logger = get_logger("vehicle");
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.command_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            proxy_url: config.proxy_url.trim_end_matches('/').to_string(),
            vin: config.vin.clone(),
            logger,
        })
    }

    async fn post_command(&self, name: &str, body: serde_json::Value) -> CommandResult {
        let url = format!(
            "{}/api/1/vehicles/{}/command/{}",
            self.proxy_url, self.vin, name
        );
        self.logger.debug(&format!("POST {}", url));

        let resp = match self.http.post(&url).json(&body).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                self.logger.warn(&format!("Command {} timed out", name));
                return CommandResult::failed(CommandCause::Timeout);
            }
            Err(e) => {
                self.logger
                    .warn(&format!("Command {} transport error: {}", name, e));
                return CommandResult::failed(CommandCause::TransportClosed);
            }
        };

        let payload: serde_json::Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                self.logger
                    .warn(&format!("Command {} returned invalid JSON: {}", name, e));
                return CommandResult::failed(CommandCause::Unknown);
            }
        };

        let result = payload
            .get("response")
            .and_then(|r| r.get("result"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if result {
            return CommandResult::success();
        }

        let reason = payload
            .get("response")
            .and_then(|r| r.get("reason"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let cause = classify_failure(reason);
        self.logger
            .warn(&format!("Command {} failed ({:?}): {}", name, cause, reason));
        CommandResult::failed(cause)
    }
}

#[async_trait::async_trait]
impl VehicleCommand for HttpVehicleProxy {
    async fn probe(&self) -> Result<()> {
        let url = format!("{}/api/1/vehicles/{}", self.proxy_url, self.vin);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| HeliotropeError::vehicle(format!("Command proxy unreachable: {}", e)))?;
        if !resp.status().is_success() {
            return Err(HeliotropeError::vehicle(format!(
                "Command proxy returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn wake(&mut self) -> CommandResult {
        self.post_command("wake_up", serde_json::json!({})).await
    }

    async fn start_charging(&mut self) -> CommandResult {
        self.post_command("charge_start", serde_json::json!({}))
            .await
    }

    async fn stop_charging(&mut self) -> CommandResult {
        self.post_command("charge_stop", serde_json::json!({}))
            .await
    }

    async fn set_charge_rate(&mut self, amps: i64) -> CommandResult {
        self.post_command("set_charging_amps", serde_json::json!({ "charging_amps": amps }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognizes_benign_outcomes() {
        assert_eq!(
            classify_failure("Failed to execute command: car could not execute command: is_charging"),
            CommandCause::AlreadyCharging
        );
        assert_eq!(
            classify_failure("car could not execute command: not_charging"),
            CommandCause::NotChargingPrecool
        );
        assert_eq!(
            classify_failure("vehicle is in precondition mode"),
            CommandCause::NotChargingPrecool
        );
    }

    #[test]
    fn classify_recognizes_transport_failures() {
        assert_eq!(
            classify_failure("ble connection timed out"),
            CommandCause::Timeout
        );
        assert_eq!(
            classify_failure("connection refused"),
            CommandCause::TransportClosed
        );
        assert_eq!(classify_failure("something else"), CommandCause::Unknown);
    }

    #[test]
    fn boxed_transport_is_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Box<dyn VehicleCommand>>();
        assert_send_sync::<TeslaControlCli>();
        assert_send_sync::<HttpVehicleProxy>();
    }

    #[test]
    fn command_result_constructors() {
        let ok = CommandResult::success();
        assert!(ok.ok);
        assert_eq!(ok.cause, CommandCause::None);

        let failed = CommandResult::failed(CommandCause::Timeout);
        assert!(!failed.ok);
        assert_eq!(failed.cause, CommandCause::Timeout);
    }
}
