//! The adaptive charge-control state machine
//!
//! One tick: take a policy snapshot, take a meter sample, evaluate the gates
//! in priority order, then run the start sequence or the steady-state rate
//! adjustment. The loop is fail-open toward stopping and fail-closed toward
//! starting: ambiguity defers a start, while a stop is attempted wherever
//! metered truth shows current flowing against the policy.

use crate::config::{ControlsConfig, VerifyComparison};
use crate::error::Result;
use crate::estimator::{self, floor_amps, round_amps};
use crate::events::EventPublisher;
use crate::logging::get_logger;
use crate::meter::PowerMeter;
use crate::policy::{PolicySnapshot, PolicyStore};
use crate::report::{format_status, StatusFields, StatusReporter};
use crate::timer::DebounceTimer;
use crate::vehicle::{CommandCause, VehicleCommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};

/// Tick pacing chosen by the last tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPace {
    /// Actively managing a session or eligible to start one
    Fast,
    /// Idle or ineligible
    Slow,
}

/// The single authoritative mutable state of the controller
#[derive(Debug, Default)]
pub struct ControllerState {
    /// The controller believes current is flowing at or above the floor.
    /// Reconciled against the meter before rate decisions trust it.
    pub charging: bool,

    start_debounce: DebounceTimer,
    stop_debounce: DebounceTimer,

    /// Stop attempts are suppressed until this passes, set after a stop was
    /// rejected because the vehicle is pre-cooling
    stop_cooldown_until: Option<Instant>,

    /// Sufficiency of the last successful estimate, consulted by the
    /// slow-sleep safety check where only a sensor read is available
    last_sufficient: bool,
}

/// The control loop over the meter, vehicle, and policy boundaries
pub struct ControlLoop<M, V> {
    meter: M,
    vehicle: V,
    policy: Arc<PolicyStore>,
    publisher: Arc<dyn EventPublisher>,
    config: ControlsConfig,
    state: ControllerState,
    reporter: StatusReporter,
    last_status: StatusFields,
    logger: crate::logging::StructuredLogger,
}

impl<M: PowerMeter, V: VehicleCommand> ControlLoop<M, V> {
    pub fn new(
        meter: M,
        vehicle: V,
        policy: Arc<PolicyStore>,
        publisher: Arc<dyn EventPublisher>,
        config: ControlsConfig,
        report_interval: Duration,
    ) -> Self {
        Self {
            meter,
            vehicle,
            policy,
            publisher,
            config,
            state: ControllerState::default(),
            reporter: StatusReporter::new(report_interval),
            last_status: StatusFields::default(),
            logger: get_logger("controller"),
        }
    }

    /// Run ticks until the shutdown channel fires
    pub async fn run(&mut self, mut shutdown: mpsc::Receiver<()>) -> Result<()> {
        self.logger.info("Control loop started");
        loop {
            let pace = self.tick().await;
            self.maybe_report().await;

            match pace {
                TickPace::Fast => {
                    tokio::select! {
                        _ = sleep(Duration::from_secs(self.config.fast_poll_secs)) => {}
                        _ = shutdown.recv() => break,
                    }
                }
                TickPace::Slow => {
                    // Sliced sleep so a stop-worthy or start-worthy event
                    // during the long idle interval is honored early
                    let deadline = Instant::now() + Duration::from_secs(self.config.slow_poll_secs);
                    loop {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            break;
                        }
                        let step =
                            remaining.min(Duration::from_secs(self.config.slow_poll_check_secs));
                        tokio::select! {
                            _ = sleep(step) => {}
                            _ = shutdown.recv() => {
                                self.logger.info("Control loop stopping");
                                return Ok(());
                            }
                        }
                        if self.idle_safety_check().await {
                            break;
                        }
                    }
                }
            }
        }
        self.logger.info("Control loop stopping");
        Ok(())
    }

    /// Evaluate one control tick and report the pacing for the next sleep
    pub async fn tick(&mut self) -> TickPace {
        let now = Instant::now();
        let policy = self.policy.snapshot();

        let sample = match self.meter.sample().await {
            Ok(sample) => sample,
            Err(e) => {
                // Keep the prior believed state and target; retry next tick
                self.logger.warn(&format!("Meter sample failed: {}", e));
                return if self.state.charging {
                    TickPace::Fast
                } else {
                    TickPace::Slow
                };
            }
        };

        let target = estimator::estimate(&sample, self.config.min_charge_a);
        let metered_a = round_amps(sample.metered_charge_current_a);
        let enabled = policy.charge_enabled();
        let delayed = policy.delay_active(chrono::Utc::now());
        self.state.last_sufficient = target.sufficient;

        self.last_status = StatusFields {
            enabled,
            delayed,
            charging: self.state.charging,
            metered_a,
            target_a: floor_amps(target.target_rate_a),
        };

        // Gate: delay override or policy-disabled. Stop wherever metered
        // truth shows current flowing, regardless of believed state.
        if delayed || !enabled {
            if self.state.charging || metered_a >= self.config.min_charge_a {
                if delayed {
                    self.logger
                        .info("Charge delay active; stopping active session");
                }
                self.issue_stop(now).await;
                self.state.charging = false;
                self.state.stop_debounce.clear();
            }
            self.state.start_debounce.clear();
            self.last_status.charging = false;
            return TickPace::Slow;
        }

        if !self.state.charging {
            if !target.sufficient {
                // A cloud gap restarts the start dwell from scratch
                self.state.start_debounce.clear();
                // Metered truth: current flowing without surplus under a
                // solar-only policy is grid draw and is stopped on the spot
                if policy.solar_only && metered_a >= self.config.min_charge_a {
                    self.logger.warn(&format!(
                        "Current flowing at {}A without surplus under solar-only; stopping",
                        metered_a
                    ));
                    self.issue_stop(now).await;
                }
                return TickPace::Slow;
            }
            if metered_a >= self.config.min_charge_a {
                // Already drawing current, e.g. a session from a previous
                // run; adopt it without re-running the start sequence
                self.logger
                    .info(&format!("Found active session at {}A; adopting", metered_a));
                self.state.charging = true;
                self.last_status.charging = true;
                return TickPace::Fast;
            }
            let due = self
                .state
                .start_debounce
                .poll(true, Duration::from_secs(self.config.start_delay_secs), now);
            if due && self.attempt_start(&policy).await {
                self.last_status.charging = true;
            }
            return TickPace::Fast;
        }

        // Charging steady state
        if target.sufficient {
            self.state.stop_debounce.clear();
            let new_rate = floor_amps(target.target_rate_a);
            if new_rate != metered_a {
                self.adjust_rate(new_rate).await;
            }
        } else if metered_a > self.config.min_charge_a {
            // Surplus is fading; step down to the floor before giving up
            self.adjust_rate(self.config.min_charge_a).await;
        } else {
            // Exhaustion: already at the floor with insufficient generation
            let due = self
                .state
                .stop_debounce
                .poll(true, Duration::from_secs(self.config.stop_delay_secs), now);
            if due && self.issue_stop(now).await {
                self.logger.info("Surplus exhausted; session stopped");
                self.state.charging = false;
                self.state.stop_debounce.clear();
                self.last_status.charging = false;
                return TickPace::Slow;
            }
        }
        TickPace::Fast
    }

    /// Wake if needed, start the session, and confirm current actually flows
    /// before believing it. Any unverified step leaves the state idle.
    async fn attempt_start(&mut self, policy: &PolicySnapshot) -> bool {
        if policy.vehicle_state.needs_wake() {
            let result = self.vehicle.wake().await;
            if !result.ok {
                self.logger
                    .warn(&format!("Wake failed ({:?}); retrying next tick", result.cause));
                return false;
            }
            sleep(Duration::from_secs(self.config.wake_settle_secs)).await;
        }

        let result = self.vehicle.start_charging().await;
        if !result.ok && result.cause != CommandCause::AlreadyCharging {
            self.logger
                .warn(&format!("Start failed ({:?}); retrying next tick", result.cause));
            return false;
        }

        sleep(Duration::from_secs(self.config.start_settle_secs)).await;
        for _ in 0..self.config.verify_attempts {
            if let Ok(sensor) = self.meter.sample_sensor().await {
                if round_amps(sensor.metered_charge_current_a) >= self.config.min_charge_a {
                    self.logger.info("Charge session started and confirmed");
                    self.state.charging = true;
                    self.state.start_debounce.clear();
                    return true;
                }
            }
            sleep(Duration::from_millis(self.config.verify_interval_ms)).await;
        }

        self.logger
            .warn("Start not confirmed by the meter; staying idle");
        false
    }

    /// Request a new rate and, once the command succeeds, confirm it against
    /// the meter before publishing it as the active rate
    async fn adjust_rate(&mut self, new_rate: i64) {
        let result = self.vehicle.set_charge_rate(new_rate).await;
        if !result.ok {
            self.logger.warn(&format!(
                "Rate change to {}A failed ({:?})",
                new_rate, result.cause
            ));
            return;
        }
        if self.verify_charge_rate(new_rate).await {
            self.logger.debug(&format!("Rate confirmed at {}A", new_rate));
            if let Err(e) = self.publisher.publish_charge_rate(new_rate).await {
                self.logger.warn(&format!("Rate publish failed: {}", e));
            }
        } else {
            self.logger
                .warn(&format!("Rate change to {}A not confirmed", new_rate));
        }
    }

    /// Bounded re-sampling until the rounded metered rate matches the
    /// request under the configured comparison
    async fn verify_charge_rate(&mut self, requested: i64) -> bool {
        for _ in 0..self.config.verify_attempts {
            sleep(Duration::from_millis(self.config.verify_interval_ms)).await;
            if let Ok(sensor) = self.meter.sample_sensor().await {
                let metered = round_amps(sensor.metered_charge_current_a);
                let confirmed = match self.config.verify_comparison {
                    VerifyComparison::AtLeast => metered >= requested,
                    VerifyComparison::Exact => metered == requested,
                };
                if confirmed {
                    return true;
                }
            }
        }
        false
    }

    /// Issue a stop unless a pre-cool cool-down is pending. A stop rejected
    /// for pre-cooling counts as stopped for state purposes and starts the
    /// cool-down.
    async fn issue_stop(&mut self, now: Instant) -> bool {
        if let Some(until) = self.state.stop_cooldown_until {
            if now < until {
                self.logger
                    .debug("Stop suppressed during pre-cool cool-down");
                return false;
            }
            self.state.stop_cooldown_until = None;
        }

        let result = self.vehicle.stop_charging().await;
        match result.cause {
            CommandCause::None => true,
            CommandCause::NotChargingPrecool => {
                self.logger.info(
                    "Stop rejected while pre-cooling; deferring the next stop attempt",
                );
                self.state.stop_cooldown_until =
                    Some(now + Duration::from_secs(self.config.stop_cooldown_secs));
                true
            }
            cause => {
                self.logger
                    .warn(&format!("Stop failed ({:?}); will retry", cause));
                result.ok
            }
        }
    }

    /// Sub-interval check during the slow sleep: a cheap sensor read catches
    /// current still flowing against the policy, and a policy flip to
    /// chargeable cuts the sleep short. Returns true to end the sleep early.
    async fn idle_safety_check(&mut self) -> bool {
        let policy = self.policy.snapshot();
        let delayed = policy.delay_active(chrono::Utc::now());
        let enabled = policy.charge_enabled();

        // The sensor carries no generation figure, so sufficiency is the
        // last full estimate's verdict
        if enabled && !delayed && self.state.last_sufficient {
            return true;
        }

        let must_stop = delayed
            || !enabled
            || (policy.solar_only && !self.state.last_sufficient);
        match self.meter.sample_sensor().await {
            Ok(sensor) => {
                let metered = round_amps(sensor.metered_charge_current_a);
                if must_stop && metered >= self.config.min_charge_a {
                    self.logger.warn(&format!(
                        "Current flowing at {}A while ineligible; stopping",
                        metered
                    ));
                    self.issue_stop(Instant::now()).await;
                    self.state.charging = false;
                }
                false
            }
            Err(e) => {
                self.logger
                    .debug(&format!("Safety check sample failed: {}", e));
                false
            }
        }
    }

    /// Publish a status line when the reporter's cadence says one is owed
    async fn maybe_report(&mut self) {
        if self.reporter.due(Instant::now()) {
            let line = format_status(&self.last_status);
            if let Err(e) = self.publisher.publish_status(&line).await {
                self.logger.warn(&format!("Status publish failed: {}", e));
            }
        }
    }
}
