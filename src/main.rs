// Demo entry point - Dependency injection and a periodic vitals snapshot
use std::sync::Arc;
use std::time::Duration;

use vitals_monitor::application::events::MonitorEvent;
use vitals_monitor::application::monitor_service::MonitorService;
use vitals_monitor::application::settings_repository::SettingsRepository;
use vitals_monitor::infrastructure::config::load_monitor_config;
use vitals_monitor::infrastructure::demo_provider::DemoProvider;
use vitals_monitor::infrastructure::settings_store::JsonSettingsStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let monitor_config = load_monitor_config()?;

    // Create the settings store (infrastructure layer)
    let settings: Arc<dyn SettingsRepository> = match &monitor_config.settings_path {
        Some(path) => Arc::new(JsonSettingsStore::load(path)?),
        None => Arc::new(JsonSettingsStore::in_memory()),
    };

    // Create the monitor service (application layer) and register providers
    let monitor = Arc::new(MonitorService::new(settings.clone()));
    monitor
        .register_provider(Arc::new(DemoProvider::new(settings.clone())))
        .await;
    monitor
        .initialize()
        .await
        .map_err(|err| anyhow::anyhow!("failed to initialize monitor: {err}"))?;

    let providers = monitor.available_providers().await;
    tracing::info!(?providers, "vitals-monitor initialized");

    if monitor_config.auto_start {
        monitor
            .start_acquisition()
            .await
            .map_err(|err| anyhow::anyhow!("failed to start acquisition: {err}"))?;
    }

    let mut events = monitor.subscribe();
    let snapshot_interval = Duration::from_secs(monitor_config.snapshot_interval_secs.max(1));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(MonitorEvent::ConnectionStatusChanged(status)) => {
                        tracing::info!(?status, "connection status changed");
                    }
                    Ok(MonitorEvent::ActiveProviderChanged(name)) => {
                        tracing::info!(provider = name, "active provider changed");
                    }
                    Ok(MonitorEvent::ErrorOccurred { code, message }) => {
                        tracing::error!(code, message, "provider error");
                    }
                    Err(_) => {}
                }
            }
            _ = tokio::time::sleep(snapshot_interval) => {
                for model in monitor.all_parameter_models().await {
                    tracing::info!(
                        parameter = model.display_name(),
                        value = model.value(),
                        unit = model.unit(),
                        severity = ?model.alarm_severity(),
                        "vitals snapshot"
                    );
                }
            }
        }
    }

    monitor.stop_acquisition().await;
    Ok(())
}
