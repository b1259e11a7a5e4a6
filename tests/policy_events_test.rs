use heliotrope::config::MqttConfig;
use heliotrope::events::apply_policy_message;
use heliotrope::policy::{PolicyStore, VehicleState};

/// Replay the message sequence of a typical afternoon: car arrives home,
/// plugs in, reports its battery, then an operator sets a delay window.
#[test]
fn message_sequence_builds_a_chargeable_snapshot() {
    let store = PolicyStore::new(80);
    let cfg = MqttConfig::default();
    let topics = cfg.topics.clone();

    assert!(!store.snapshot().charge_enabled());

    apply_policy_message(&store, &cfg, &topics.geofence, "Home");
    apply_policy_message(&store, &cfg, &topics.plugged_in, "true");
    apply_policy_message(&store, &cfg, &topics.battery_level, "55");
    apply_policy_message(&store, &cfg, &topics.vehicle_state, "asleep");

    let snap = store.snapshot();
    assert!(snap.charge_enabled());
    assert_eq!(snap.vehicle_state, VehicleState::Asleep);
    assert!(snap.vehicle_state.needs_wake());

    apply_policy_message(&store, &cfg, &topics.charge_delay_until, "2030-06-01T18:00:00Z");
    let snap = store.snapshot();
    assert!(snap.delay_active(chrono::Utc::now()));

    // Clearing the delay re-opens charging
    apply_policy_message(&store, &cfg, &topics.charge_delay_until, "");
    assert!(!store.snapshot().delay_active(chrono::Utc::now()));
}

#[test]
fn driving_away_disables_charging() {
    let store = PolicyStore::new(80);
    let cfg = MqttConfig::default();

    apply_policy_message(&store, &cfg, &cfg.topics.geofence, "Home");
    apply_policy_message(&store, &cfg, &cfg.topics.plugged_in, "true");
    apply_policy_message(&store, &cfg, &cfg.topics.battery_level, "55");
    assert!(store.snapshot().charge_enabled());

    apply_policy_message(&store, &cfg, &cfg.topics.geofence, "");
    assert!(!store.snapshot().charge_enabled());
}

#[test]
fn reaching_the_limit_disables_charging() {
    let store = PolicyStore::new(80);
    let cfg = MqttConfig::default();

    apply_policy_message(&store, &cfg, &cfg.topics.geofence, "Home");
    apply_policy_message(&store, &cfg, &cfg.topics.plugged_in, "true");
    apply_policy_message(&store, &cfg, &cfg.topics.battery_level, "79");
    assert!(store.snapshot().charge_enabled());

    apply_policy_message(&store, &cfg, &cfg.topics.battery_level, "80");
    assert!(!store.snapshot().charge_enabled());

    // A raised limit from the car re-opens it
    apply_policy_message(&store, &cfg, &cfg.topics.charge_limit, "90");
    assert!(store.snapshot().charge_enabled());
}
