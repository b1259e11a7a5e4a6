//! # Heliotrope - Adaptive Solar EV Charge Controller
//!
//! A Rust implementation of an adaptive charge controller that tracks
//! on-site solar generation and steers an EV's charge rate to consume the
//! surplus, without drawing grid power under a solar-only policy.
//!
//! ## Features
//!
//! - **Surplus Tracking**: Charge rate follows measured PV surplus
//! - **Hysteresis**: Debounce dwells keep noisy samples from flipping state
//! - **Fail-Safe Sequencing**: Fail-open toward stopping, fail-closed toward
//!   starting; metered truth overrides believed state
//! - **eGauge Metering**: HTTP register and sensor sampling
//! - **Vehicle Commands**: BLE CLI or HTTP proxy transport with classified
//!   failure causes
//! - **MQTT Policy Bus**: TeslaMate-sourced vehicle state and operator
//!   overrides in, status and confirmed rate out
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `estimator`: Pure surplus-to-amps rate computation
//! - `meter`: Power meter boundary and eGauge adapter
//! - `vehicle`: Vehicle command boundary and transports
//! - `policy`: Externally pushed policy/vehicle state store
//! - `events`: MQTT subscription and publication
//! - `timer`: Debounce timers
//! - `controller`: The charge-control state machine and run loop
//! - `report`: Periodic status formatting

pub mod config;
pub mod controller;
pub mod error;
pub mod estimator;
pub mod events;
pub mod logging;
pub mod meter;
pub mod policy;
pub mod report;
pub mod timer;
pub mod vehicle;

// Re-export commonly used types
pub use config::Config;
pub use controller::ControlLoop;
pub use error::{HeliotropeError, Result};
