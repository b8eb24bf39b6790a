use std::{sync::Arc, time::Duration};

use crampwave_lib::{
    channel::MemoryTransport,
    db::Database,
    models::{DeviceCommand, VibrationMode},
    simulator::DeviceSimulator,
    AuthContext, ControllerConfig, SessionController,
};

async fn wait_for_command(simulator: &DeviceSimulator, wanted: &DeviceCommand) -> Vec<DeviceCommand> {
    for _ in 0..250 {
        let received = simulator.received().await;
        if received.last() == Some(wanted) {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("simulator never received {wanted:?}");
}

#[tokio::test]
async fn simulated_device_sees_the_whole_session() {
    let (transport, endpoint) = MemoryTransport::pair();
    let mut simulator = DeviceSimulator::spawn(endpoint, Duration::from_millis(20), 11);
    let controller = SessionController::new(
        Database::in_memory().unwrap(),
        AuthContext::signed_in("owner-sim"),
        Arc::new(transport),
        ControllerConfig {
            device_id: "sim-pad".into(),
            tick_interval: Duration::from_millis(50),
            ..ControllerConfig::default()
        },
    );

    controller.start_session().await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    controller.stop().await.unwrap();

    let received = wait_for_command(&simulator, &DeviceCommand::SetVibration { level: 0 }).await;
    assert_eq!(
        received.first(),
        Some(&DeviceCommand::Init {
            device_id: "sim-pad".into()
        })
    );
    assert!(received.contains(&DeviceCommand::StartVibration {
        mode: VibrationMode::Auto
    }));
    // The simulated pressure and temperature always drive a non-zero level.
    assert!(received
        .iter()
        .any(|command| matches!(command, DeviceCommand::SetVibration { level } if *level > 0)));

    let record = controller.save(15, 5, None).await.unwrap();
    assert!(!record.sensor_summary.vibration_history.is_empty());
    assert!(record.sensor_summary.last_pressure > 0.0 || record.sensor_summary.last_temperature > 0.0);

    controller.shutdown().await.unwrap();
    simulator.shutdown().await.unwrap();
}
