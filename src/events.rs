//! MQTT event channel
//!
//! Inbound: policy topics (solar-only flag, TeslaMate geofence/plug/battery/
//! state, charge-delay deadline) written into the shared `PolicyStore`.
//! Outbound: the periodic status string and the confirmed charge rate.

use crate::config::MqttConfig;
use crate::error::{HeliotropeError, Result};
use crate::logging::get_logger;
use crate::policy::{PolicyStore, VehicleState};
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::sync::Arc;
use std::time::Duration;

/// Outbound publication capability consumed by the controller and reporter
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one formatted status string
    async fn publish_status(&self, status: &str) -> Result<()>;

    /// Publish a confirmed charge rate in amps
    async fn publish_charge_rate(&self, amps: i64) -> Result<()>;
}

/// MQTT adapter over rumqttc
pub struct MqttChannel {
    client: AsyncClient,
    config: MqttConfig,
    logger: crate::logging::StructuredLogger,
}

impl MqttChannel {
    /// Build the client and its event loop from configuration
    pub fn new(config: &MqttConfig) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user.clone(), pass.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, 50);
        let channel = Self {
            client,
            config: config.clone(),
            logger: get_logger("mqtt"),
        };
        (channel, eventloop)
    }

    /// Queue subscriptions for all inbound policy topics
    pub async fn subscribe_policy_topics(&self) -> Result<()> {
        let topics = &self.config.topics;
        for topic in [
            &topics.solar_only,
            &topics.geofence,
            &topics.plugged_in,
            &topics.battery_level,
            &topics.charge_limit,
            &topics.vehicle_state,
            &topics.charge_delay_until,
        ] {
            self.client
                .subscribe(topic.clone(), QoS::AtLeastOnce)
                .await
                .map_err(|e| HeliotropeError::mqtt(format!("Subscribe failed: {}", e)))?;
        }
        self.logger.info("Subscribed to policy topics");
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventPublisher for MqttChannel {
    async fn publish_status(&self, status: &str) -> Result<()> {
        self.client
            .publish(
                self.config.topics.status.clone(),
                QoS::AtLeastOnce,
                false,
                status.as_bytes().to_vec(),
            )
            .await
            .map_err(|e| HeliotropeError::mqtt(format!("Status publish failed: {}", e)))
    }

    async fn publish_charge_rate(&self, amps: i64) -> Result<()> {
        self.client
            .publish(
                self.config.topics.charge_rate.clone(),
                QoS::AtLeastOnce,
                false,
                amps.to_string().into_bytes(),
            )
            .await
            .map_err(|e| HeliotropeError::mqtt(format!("Charge rate publish failed: {}", e)))
    }
}

/// Wait for the broker to acknowledge the connection. Called once at
/// startup; failure is fatal there.
pub async fn await_connected(eventloop: &mut EventLoop, wait: Duration) -> Result<()> {
    let connect = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => return Ok(()),
                Ok(_) => continue,
                Err(e) => {
                    return Err(HeliotropeError::mqtt(format!(
                        "Broker connection failed: {}",
                        e
                    )));
                }
            }
        }
    };

    match tokio::time::timeout(wait, connect).await {
        Ok(result) => result,
        Err(_) => Err(HeliotropeError::timeout(
            "Timed out waiting for broker connection".to_string(),
        )),
    }
}

/// Drive the MQTT event loop, writing policy updates into the store.
/// Reconnects with a short backoff on error; runs until the task is
/// dropped at shutdown.
pub async fn run_event_loop(mut eventloop: EventLoop, store: Arc<PolicyStore>, config: MqttConfig) {
    let logger = get_logger("mqtt");
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                let payload = match std::str::from_utf8(&publish.payload) {
                    Ok(s) => s.to_string(),
                    Err(_) => {
                        logger.warn(&format!(
                            "Non-UTF-8 payload on {}; dropping",
                            publish.topic
                        ));
                        continue;
                    }
                };
                if !apply_policy_message(&store, &config, &publish.topic, &payload) {
                    logger.debug(&format!("Ignored message on {}", publish.topic));
                }
            }
            Ok(_) => {}
            Err(e) => {
                logger.warn(&format!("MQTT error: {}; reconnecting shortly", e));
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

/// Apply one inbound message to the policy store. Returns false for topics
/// or payloads that were not understood.
pub fn apply_policy_message(
    store: &PolicyStore,
    config: &MqttConfig,
    topic: &str,
    payload: &str,
) -> bool {
    let topics = &config.topics;
    let payload = payload.trim();

    if topic == topics.solar_only {
        // Anything not matching "true"/"True" maps to false
        store.set_solar_only(payload.eq_ignore_ascii_case("true"));
        true
    } else if topic == topics.geofence {
        store.set_at_home(payload == config.home_geofence);
        true
    } else if topic == topics.plugged_in {
        store.set_plugged_in(payload.eq_ignore_ascii_case("true"));
        true
    } else if topic == topics.battery_level {
        match payload.parse::<u8>() {
            Ok(pct) if pct <= 100 => {
                store.set_battery_pct(pct);
                true
            }
            _ => false,
        }
    } else if topic == topics.charge_limit {
        match payload.parse::<u8>() {
            Ok(pct) if (1..=100).contains(&pct) => {
                store.set_charge_limit_pct(pct);
                true
            }
            _ => false,
        }
    } else if topic == topics.vehicle_state {
        store.set_vehicle_state(VehicleState::parse(payload));
        true
    } else if topic == topics.charge_delay_until {
        match parse_delay_deadline(payload) {
            Some(deadline) => {
                store.set_charge_delay_until(deadline);
                true
            }
            None => false,
        }
    } else {
        false
    }
}

/// Parse a charge-delay payload: RFC 3339 or unix epoch seconds. An empty
/// or zero payload clears the delay. Returns None for unparseable input.
fn parse_delay_deadline(payload: &str) -> Option<Option<DateTime<Utc>>> {
    if payload.is_empty() || payload == "0" {
        return Some(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(payload) {
        return Some(Some(dt.with_timezone(&Utc)));
    }
    if let Ok(epoch) = payload.parse::<i64>() {
        return DateTime::from_timestamp(epoch, 0).map(Some);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (PolicyStore, MqttConfig) {
        (PolicyStore::new(80), MqttConfig::default())
    }

    #[test]
    fn solar_only_payloads() {
        let (store, cfg) = setup();
        assert!(apply_policy_message(
            &store,
            &cfg,
            &cfg.topics.solar_only,
            "False"
        ));
        assert!(!store.snapshot().solar_only);
        apply_policy_message(&store, &cfg, &cfg.topics.solar_only, "True");
        assert!(store.snapshot().solar_only);
        // Anything not matching "True" maps to false
        apply_policy_message(&store, &cfg, &cfg.topics.solar_only, "banana");
        assert!(!store.snapshot().solar_only);
    }

    #[test]
    fn geofence_matches_configured_name() {
        let (store, cfg) = setup();
        apply_policy_message(&store, &cfg, &cfg.topics.geofence, "Home");
        assert!(store.snapshot().at_home);
        apply_policy_message(&store, &cfg, &cfg.topics.geofence, "Work");
        assert!(!store.snapshot().at_home);
    }

    #[test]
    fn battery_and_limit_parsing() {
        let (store, cfg) = setup();
        assert!(apply_policy_message(
            &store,
            &cfg,
            &cfg.topics.battery_level,
            "73"
        ));
        assert_eq!(store.snapshot().battery_pct, 73);
        assert!(!apply_policy_message(
            &store,
            &cfg,
            &cfg.topics.battery_level,
            "150"
        ));
        assert!(!apply_policy_message(
            &store,
            &cfg,
            &cfg.topics.battery_level,
            "lots"
        ));

        assert!(apply_policy_message(
            &store,
            &cfg,
            &cfg.topics.charge_limit,
            "90"
        ));
        assert_eq!(store.snapshot().charge_limit_pct, 90);
        assert!(!apply_policy_message(
            &store,
            &cfg,
            &cfg.topics.charge_limit,
            "0"
        ));
    }

    #[test]
    fn vehicle_state_updates() {
        let (store, cfg) = setup();
        apply_policy_message(&store, &cfg, &cfg.topics.vehicle_state, "asleep");
        assert_eq!(store.snapshot().vehicle_state, VehicleState::Asleep);
        apply_policy_message(&store, &cfg, &cfg.topics.vehicle_state, "online");
        assert_eq!(store.snapshot().vehicle_state, VehicleState::Awake);
    }

    #[test]
    fn delay_deadline_payloads() {
        let (store, cfg) = setup();
        assert!(apply_policy_message(
            &store,
            &cfg,
            &cfg.topics.charge_delay_until,
            "2030-01-01T08:00:00Z"
        ));
        assert!(store.snapshot().charge_delay_until.is_some());

        assert!(apply_policy_message(
            &store,
            &cfg,
            &cfg.topics.charge_delay_until,
            ""
        ));
        assert!(store.snapshot().charge_delay_until.is_none());

        assert!(apply_policy_message(
            &store,
            &cfg,
            &cfg.topics.charge_delay_until,
            "1893456000"
        ));
        assert!(store.snapshot().charge_delay_until.is_some());

        assert!(!apply_policy_message(
            &store,
            &cfg,
            &cfg.topics.charge_delay_until,
            "tomorrow-ish"
        ));
    }

    #[test]
    fn unknown_topic_is_ignored() {
        let (store, cfg) = setup();
        assert!(!apply_policy_message(&store, &cfg, "some/other/topic", "1"));
    }
}
