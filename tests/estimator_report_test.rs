use heliotrope::estimator::{estimate, floor_amps, round_amps, sufficient_generation};
use heliotrope::meter::PowerSample;
use heliotrope::report::{format_status, StatusFields};

fn sample(generation_w: f64, usage_w: f64, charger_w: f64) -> PowerSample {
    PowerSample {
        generation_w,
        usage_w,
        vehicle_charger_w: charger_w,
        charger_voltage: 240.0,
        metered_charge_current_a: 0.0,
    }
}

#[test]
fn afternoon_surplus_maps_to_a_twelve_amp_request() {
    let s = sample(4000.0, 1000.0, 0.0);
    let target = estimate(&s, 7);
    assert!((target.target_rate_a - 12.5).abs() < 1e-9);
    assert_eq!(floor_amps(target.target_rate_a), 12);
    assert!(target.sufficient);
    assert!(sufficient_generation(&s, 7));
}

#[test]
fn household_load_spike_drops_below_the_floor() {
    // Oven turns on while the car charges at 10 A
    let s = sample(4000.0, 6000.0, 2400.0);
    let target = estimate(&s, 7);
    assert_eq!(floor_amps(target.target_rate_a), 6);
    assert!(!target.sufficient);
}

#[test]
fn estimate_feeds_the_status_line() {
    let s = PowerSample {
        metered_charge_current_a: 10.2,
        ..sample(4000.0, 3400.0, 2400.0)
    };
    let target = estimate(&s, 7);
    let line = format_status(&StatusFields {
        enabled: true,
        delayed: false,
        charging: true,
        metered_a: round_amps(s.metered_charge_current_a),
        target_a: floor_amps(target.target_rate_a),
    });
    assert_eq!(line, "Status: En:1 Dly:0 Chg:1 Cur:10 New:12");
}
