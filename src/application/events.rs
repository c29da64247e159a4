// Event types flowing between providers, models, and the monitor service
use crate::domain::signal::{AlarmSeverity, ConnectionStatus};

/// Events emitted by a data provider and consumed by the routing task.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// A batch of waveform samples sharing one timestamp.
    Waveform {
        waveform_id: i32,
        timestamp_ms: i64,
        samples: Vec<f32>,
    },
    /// A single parameter value.
    Parameter {
        parameter_id: i32,
        timestamp_ms: i64,
        value: f32,
    },
    Status(ConnectionStatus),
    Error { code: i32, message: String },
}

/// Notifications emitted by waveform and parameter models.
///
/// `PropertiesChanged` is only emitted on a real change; consumers may treat
/// it as authoritative evidence that something was updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEvent {
    DataUpdated,
    PropertiesChanged,
    ActiveStateChanged(bool),
    AlarmStateChanged(AlarmSeverity),
}

/// Events emitted by the monitor service to its subscribers.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    ActiveProviderChanged(String),
    ConnectionStatusChanged(ConnectionStatus),
    ErrorOccurred { code: i32, message: String },
}
