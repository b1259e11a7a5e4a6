//! Surplus-to-amps rate estimation
//!
//! Pure computations turning a power sample into a target charge rate. The
//! controller floors the target when deciding how much to request (stay just
//! under the available surplus) and rounds the metered rate when comparing
//! (avoid request storms when sitting exactly on a boundary).

use crate::meter::PowerSample;

/// A computed charge target for one control tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeTarget {
    /// Target charge rate in amps, before rounding rules are applied
    pub target_rate_a: f64,

    /// Whether the floored target reaches the configured floor current
    pub sufficient: bool,
}

/// Compute the charge target for a sample.
///
/// The surplus is generation minus household usage, with the vehicle
/// charger's own draw added back so an active charge session does not count
/// against itself. Watts convert to amps through the measured split-phase
/// voltage, never a nominal constant: voltage sag under load materially
/// changes the amp figure.
pub fn estimate(sample: &PowerSample, min_charge_a: i64) -> ChargeTarget {
    let voltage = sample.charger_voltage;
    if !voltage.is_finite() || voltage <= 0.0 {
        return ChargeTarget {
            target_rate_a: 0.0,
            sufficient: false,
        };
    }

    let surplus_w = sample.generation_w - (sample.usage_w - sample.vehicle_charger_w);
    let target_rate_a = surplus_w / voltage;
    ChargeTarget {
        target_rate_a,
        sufficient: floor_amps(target_rate_a) >= min_charge_a,
    }
}

/// Whether generation currently covers at least the floor current
pub fn sufficient_generation(sample: &PowerSample, min_charge_a: i64) -> bool {
    estimate(sample, min_charge_a).sufficient
}

/// Floor a fractional amp figure to the whole-amp request value
pub fn floor_amps(rate_a: f64) -> i64 {
    rate_a.floor() as i64
}

/// Round a metered amp figure for boundary-stable comparisons
pub fn round_amps(rate_a: f64) -> i64 {
    rate_a.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(generation_w: f64, usage_w: f64, charger_w: f64, voltage: f64) -> PowerSample {
        PowerSample {
            generation_w,
            usage_w,
            vehicle_charger_w: charger_w,
            charger_voltage: voltage,
            metered_charge_current_a: 0.0,
        }
    }

    #[test]
    fn estimate_tracks_surplus() {
        // 4000 W generated, 1000 W used, charger idle, 240 V split-phase
        let target = estimate(&sample(4000.0, 1000.0, 0.0, 240.0), 7);
        assert!((target.target_rate_a - 12.5).abs() < 1e-9);
        assert_eq!(floor_amps(target.target_rate_a), 12);
        assert!(target.sufficient);
    }

    #[test]
    fn estimate_adds_back_charger_draw() {
        // Charger pulling 2400 W is part of usage and must not count against
        // the surplus
        let target = estimate(&sample(4000.0, 3400.0, 2400.0, 240.0), 7);
        assert!((target.target_rate_a - 12.5).abs() < 1e-9);
    }

    #[test]
    fn sufficiency_matches_floored_target() {
        for generation in [0.0, 1500.0, 1680.0, 1750.0, 4000.0, 9999.0] {
            let s = sample(generation, 0.0, 0.0, 240.0);
            let t = estimate(&s, 7);
            assert_eq!(t.sufficient, floor_amps(t.target_rate_a) >= 7);
            assert_eq!(sufficient_generation(&s, 7), t.sufficient);
        }
    }

    #[test]
    fn estimate_is_pure() {
        let s = sample(3200.0, 800.0, 0.0, 238.5);
        assert_eq!(estimate(&s, 7), estimate(&s, 7));
    }

    #[test]
    fn degenerate_voltage_yields_zero_target() {
        for v in [0.0, -240.0, f64::NAN, f64::INFINITY] {
            let t = estimate(&sample(4000.0, 1000.0, 0.0, v), 7);
            assert_eq!(t.target_rate_a, 0.0);
            assert!(!t.sufficient);
        }
    }

    #[test]
    fn negative_surplus_is_insufficient() {
        let t = estimate(&sample(500.0, 3000.0, 0.0, 240.0), 7);
        assert!(t.target_rate_a < 0.0);
        assert!(!t.sufficient);
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(floor_amps(12.9), 12);
        assert_eq!(round_amps(12.9), 13);
        assert_eq!(round_amps(6.4), 6);
        assert_eq!(round_amps(6.5), 7);
    }
}
