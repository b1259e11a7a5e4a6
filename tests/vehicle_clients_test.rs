use heliotrope::config::VehicleConfig;
use heliotrope::vehicle::{CommandCause, CommandResult, HttpVehicleProxy, TeslaControlCli, VehicleCommand};

#[test]
fn command_result_shapes() {
    let ok = CommandResult::success();
    assert!(ok.ok);
    assert_eq!(ok.cause, CommandCause::None);

    let precool = CommandResult::failed(CommandCause::NotChargingPrecool);
    assert!(!precool.ok);
    assert_eq!(precool.cause, CommandCause::NotChargingPrecool);
}

#[tokio::test]
async fn ble_probe_fails_for_missing_binary() {
    let config = VehicleConfig {
        control_bin: "/nonexistent/tesla-control".to_string(),
        ..VehicleConfig::default()
    };
    let cli = TeslaControlCli::new(&config);
    assert!(cli.probe().await.is_err());
}

#[test]
fn proxy_client_builds_from_config() {
    let config = VehicleConfig {
        proxy_url: "http://proxy.local:4443/".to_string(),
        vin: "5YJ3E1EA7KF000000".to_string(),
        ..VehicleConfig::default()
    };
    assert!(HttpVehicleProxy::new(&config).is_ok());
}
