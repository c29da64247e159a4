use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Path of the JSON settings store. None keeps settings in memory only.
    pub settings_path: Option<String>,
    /// Start acquisition immediately after initialization.
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
    /// Seconds between vitals snapshots logged by the demo binary.
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,
}

fn default_auto_start() -> bool {
    true
}

fn default_snapshot_interval() -> u64 {
    5
}

pub fn load_monitor_config() -> anyhow::Result<MonitorConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/monitor").required(false))
        .build()?;

    Ok(settings.try_deserialize()?)
}
