use std::sync::Arc;
use std::time::Duration;

use log::LevelFilter;
use rustyecho::api::peripheral_event::ConnectionHandle;
use rustyecho::simulated::SimulatedStack;
use rustyecho::{BluetoothServer, ServerConfig};

#[tokio::main]
async fn main() {
    pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .init();

    let stack = Arc::new(SimulatedStack::new());
    let config = ServerConfig::default()
        .with_poll_intervals(Duration::from_secs(1), Duration::from_millis(500));

    let server = match BluetoothServer::start(stack.clone(), config).await {
        Ok(server) => server,
        Err(e) => {
            log::error!("Failed to start server: {e}");
            return;
        }
    };

    // Echo every message back to the centrals
    let notifier = server.notifier();
    server.set_write_callback(move |text| {
        log::info!("Web client sent: {text}");
        notifier.send_data(format!("Echo: {text}"));
    });
    log::info!("Bluetooth server started, waiting for a central");

    tokio::select! {
        _ = server.run_status_loop() => {}
        _ = simulate_central(stack, server.clone()) => {}
    }
}

/// Plays a browser client: connect, send a few lines, leave.
async fn simulate_central(stack: Arc<SimulatedStack>, server: BluetoothServer) {
    let connection = ConnectionHandle(1);
    let rx = server.characteristics().rx;

    tokio::time::sleep(Duration::from_secs(1)).await;
    if let Err(e) = stack.connect(connection) {
        log::error!("{e}");
        return;
    }

    for line in ["hello", "echo-me"] {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        if let Err(e) = stack.write(connection, rx, line.as_bytes()) {
            log::error!("{e}");
        }
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    for notification in stack.notifications() {
        log::info!("Central got: {}", String::from_utf8_lossy(&notification.value));
    }

    if let Err(e) = stack.disconnect(connection) {
        log::error!("{e}");
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
}
