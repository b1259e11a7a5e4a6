use anyhow::Result;
use heliotrope::config::{Config, VehicleTransport};
use heliotrope::controller::ControlLoop;
use heliotrope::events::{self, MqttChannel};
use heliotrope::meter::EgaugeMeter;
use heliotrope::policy::PolicyStore;
use heliotrope::vehicle::{HttpVehicleProxy, TeslaControlCli, VehicleCommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;
    heliotrope::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Heliotrope solar charge controller starting up");

    // Startup reachability is fatal; the loop cannot run without a meter or
    // a command transport
    let mut meter = EgaugeMeter::new(&config.meter)
        .map_err(|e| anyhow::anyhow!("Failed to create meter client: {}", e))?;
    meter
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("Meter unreachable: {}", e))?;

    let vehicle: Box<dyn VehicleCommand> = match config.vehicle.transport {
        VehicleTransport::BleCli => Box::new(TeslaControlCli::new(&config.vehicle)),
        VehicleTransport::HttpProxy => Box::new(
            HttpVehicleProxy::new(&config.vehicle)
                .map_err(|e| anyhow::anyhow!("Failed to create command proxy client: {}", e))?,
        ),
    };
    vehicle
        .probe()
        .await
        .map_err(|e| anyhow::anyhow!("Vehicle command transport unavailable: {}", e))?;

    let policy = Arc::new(PolicyStore::new(config.controls.charge_limit_pct));

    let (channel, mut eventloop) = MqttChannel::new(&config.mqtt);
    channel
        .subscribe_policy_topics()
        .await
        .map_err(|e| anyhow::anyhow!("MQTT subscribe failed: {}", e))?;
    events::await_connected(&mut eventloop, Duration::from_secs(10))
        .await
        .map_err(|e| anyhow::anyhow!("MQTT broker unreachable: {}", e))?;

    let event_task = tokio::spawn(events::run_event_loop(
        eventloop,
        Arc::clone(&policy),
        config.mqtt.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(()).await;
        }
    });

    let mut control = ControlLoop::new(
        meter,
        vehicle,
        policy,
        Arc::new(channel),
        config.controls.clone(),
        Duration::from_secs(config.report.interval_secs),
    );

    let result = control.run(shutdown_rx).await;
    event_task.abort();
    match result {
        Ok(()) => {
            info!("Controller shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Controller failed with error: {}", e);
            Err(anyhow::anyhow!("Controller error: {}", e))
        }
    }
}
