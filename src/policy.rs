//! Externally pushed vehicle and policy state
//!
//! The event channel writes individual fields as messages arrive; the
//! control loop takes a whole immutable snapshot at the start of each tick
//! so one tick is internally consistent even if new events land mid-tick.

use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// Last reported vehicle wake state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VehicleState {
    #[default]
    Unknown,
    Asleep,
    Suspended,
    Awake,
    Charging,
}

impl VehicleState {
    /// Parse a TeslaMate state payload. Unrecognized states (driving,
    /// updating, offline, ...) map to `Unknown`.
    pub fn parse(payload: &str) -> Self {
        match payload.trim().to_lowercase().as_str() {
            "asleep" => VehicleState::Asleep,
            "suspended" => VehicleState::Suspended,
            "online" => VehicleState::Awake,
            "charging" => VehicleState::Charging,
            _ => VehicleState::Unknown,
        }
    }

    /// Whether the vehicle needs a wake command before it will accept a
    /// charging command
    pub fn needs_wake(self) -> bool {
        matches!(self, VehicleState::Asleep | VehicleState::Suspended)
    }
}

/// The latest known values of all externally reported signals
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    /// Vehicle is inside the home geofence
    pub at_home: bool,

    /// Charge cable is plugged in
    pub plugged_in: bool,

    /// Battery level percent
    pub battery_pct: u8,

    /// Charge limit percent; charging is pointless at or above this
    pub charge_limit_pct: u8,

    /// Last reported wake state
    pub vehicle_state: VehicleState,

    /// Grid charging is forbidden when generation is insufficient
    pub solar_only: bool,

    /// Charging is deferred until this deadline passes
    pub charge_delay_until: Option<DateTime<Utc>>,
}

impl PolicySnapshot {
    /// Whether charging is allowed at all by the external state
    pub fn charge_enabled(&self) -> bool {
        self.at_home && self.plugged_in && self.battery_pct < self.charge_limit_pct
    }

    /// Whether a charge-delay window is currently active
    pub fn delay_active(&self, now: DateTime<Utc>) -> bool {
        self.charge_delay_until.is_some_and(|until| until > now)
    }
}

/// Concurrency-safe store for the policy snapshot.
///
/// One writer context (event delivery) and one reader (the control tick);
/// each field update is independently meaningful, last write wins.
pub struct PolicyStore {
    inner: RwLock<PolicySnapshot>,
}

impl PolicyStore {
    /// Create a store with conservative initial values: not at home, not
    /// plugged in, solar-only enforced until told otherwise
    pub fn new(default_charge_limit_pct: u8) -> Self {
        Self {
            inner: RwLock::new(PolicySnapshot {
                at_home: false,
                plugged_in: false,
                battery_pct: 0,
                charge_limit_pct: default_charge_limit_pct,
                vehicle_state: VehicleState::Unknown,
                solar_only: true,
                charge_delay_until: None,
            }),
        }
    }

    /// Take a whole immutable copy under a single lock acquisition
    pub fn snapshot(&self) -> PolicySnapshot {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn with_mut(&self, f: impl FnOnce(&mut PolicySnapshot)) {
        match self.inner.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn set_at_home(&self, value: bool) {
        self.with_mut(|s| s.at_home = value);
    }

    pub fn set_plugged_in(&self, value: bool) {
        self.with_mut(|s| s.plugged_in = value);
    }

    pub fn set_battery_pct(&self, value: u8) {
        self.with_mut(|s| s.battery_pct = value);
    }

    pub fn set_charge_limit_pct(&self, value: u8) {
        self.with_mut(|s| s.charge_limit_pct = value);
    }

    pub fn set_vehicle_state(&self, value: VehicleState) {
        self.with_mut(|s| s.vehicle_state = value);
    }

    pub fn set_solar_only(&self, value: bool) {
        self.with_mut(|s| s.solar_only = value);
    }

    pub fn set_charge_delay_until(&self, value: Option<DateTime<Utc>>) {
        self.with_mut(|s| s.charge_delay_until = value);
    }
}
