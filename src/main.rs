use std::{
    process,
    sync::{Arc, OnceLock},
};

use rtl433_bridge::{
    config::Config,
    core::{
        capture::Rtl433Capture,
        executor::{local_hostname, Executor},
    },
    logger::LoggerManager,
    print_error,
};
use rtl433_bridge_mqtt::MqttBroker;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::new().unwrap_or_else(|e| {
            print_error!("{}", e);
            process::exit(1);
        })
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config();
    let mut logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting rtl433-bridge version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg.transport);

    let hostname = local_hostname();
    let broker = MqttBroker::new(cfg.transport.clone(), &hostname).unwrap_or_else(|e| {
        error!("Invalid MQTT settings: {}", e);
        process::exit(1);
    });
    info!(
        "MQTT broker {}:{} as '{}'",
        cfg.transport.host,
        cfg.transport.port,
        broker.client_id()
    );

    let capture = Rtl433Capture::new(&cfg.capture);
    let executor = Executor::new(
        Arc::new(capture),
        Arc::new(broker),
        cfg.transport.topic_prefix(&hostname),
        cfg.bridge.cycle_pause(),
    )
    .with_failure_pause(cfg.bridge.failure_pause());

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    executor.run(cancel).await;
    info!("Shutdown complete");
    Ok(())
}
