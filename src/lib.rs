// Edge gateway library root. `main.rs` stays a thin bootstrap; every
// component is wired here, mirroring the teacher's `main.rs` -> `lib::run()`
// split.

#[macro_use]
mod logging;

mod alarms;
mod api;
mod cache;
mod config;
mod families;
mod logwriter;
mod modbus;
mod poller;
mod publisher;
mod registermap;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use alarms::{AlarmEngine, NullNotifier, WebhookNotifier};
use config::GatewayConfig;
use families::FamilyRegistry;
use logwriter::LogWriter;
use modbus::{ModbusPool, TransportConfig};
use poller::GatewayState;
use publisher::Publisher;

/// Wire every component and run until a shutdown signal arrives.
pub async fn run() -> Result<(), String> {
    dotenvy::dotenv().ok();
    let config = GatewayConfig::from_env();

    if let Err(e) = logging::init_file_logging(&config.log_dir) {
        eprintln!("warning: file logging disabled: {}", e);
    }

    tlog!("[main] starting pollgate for site {}", config.site_id);

    let families = FamilyRegistry::load(&config)
        .await
        .map_err(|e| format!("failed to load families: {}", e))?;

    let pool = ModbusPool::new(Duration::from_millis(2500), Duration::from_secs(60));
    let transport_config = TransportConfig::default();
    let publisher = Publisher::connect(&config);
    let log_writer = LogWriter::spawn(
        config.log_dir.clone(),
        config.config_dir.clone(),
        config.site_id.clone(),
        Duration::from_millis(config.log_min_interval_ms),
    );

    let notifier: Box<dyn alarms::Notifier> = match &config.webhook_url {
        Some(url) => Box::new(WebhookNotifier::new(url.clone())),
        None => Box::new(NullNotifier),
    };
    let alarm_engine = Arc::new(AlarmEngine::new(
        config.config_dir.join("alarmConfig.json"),
        config.connectivity_alarm_ms,
        notifier,
    ));

    let gateway_state = Arc::new(GatewayState {
        config: config.clone(),
        families: Arc::new(families),
        pool,
        transport_config,
        publisher,
        log_writer,
        alarm_engine: alarm_engine.clone(),
    });

    let api_state = Arc::new(api::AppState {
        config: config.clone(),
        families: gateway_state.families.clone(),
        alarm_engine,
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let cadence_handle = tokio::spawn(poller::run_cadence(gateway_state.clone(), shutdown_rx));
    let server_handle = tokio::spawn(api::serve(api_state));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for shutdown signal: {}", e))?;
    tlog!("[main] shutdown signal received");

    let _ = shutdown_tx.send(true);
    if let Err(e) = cadence_handle.await {
        tlog!("[main] cadence task join error: {}", e);
    }
    gateway_state.log_writer.shutdown().await;
    server_handle.abort();

    logging::stop_file_logging();
    tlog!("[main] shutdown complete");
    Ok(())
}
