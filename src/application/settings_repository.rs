// Repository trait for settings access - configuration is injected, not global
use crate::domain::signal::{ParameterKind, WaveformKind};
use std::collections::HashMap;

/// A flat configuration map, persisted as-is by the backing store.
///
/// Recognized keys depend on the consumer: waveform models read
/// `active`/`color`/`minValue`/`maxValue`/`bufferSize`, parameter models
/// additionally read the four alarm thresholds, and providers define their
/// own key sets. Unrecognized keys are preserved untouched.
pub type SettingsMap = HashMap<String, serde_json::Value>;

/// Access to persisted configuration for providers and models.
///
/// Models load their configuration at construction and persist it back when
/// dropped, so implementations must be cheap to call and must never block on
/// I/O for longer than a local file write.
pub trait SettingsRepository: Send + Sync {
    fn provider_config(&self, name: &str) -> SettingsMap;
    fn set_provider_config(&self, name: &str, config: SettingsMap);

    fn waveform_config(&self, kind: WaveformKind) -> SettingsMap;
    fn set_waveform_config(&self, kind: WaveformKind, config: SettingsMap);

    fn parameter_config(&self, kind: ParameterKind) -> SettingsMap;
    fn set_parameter_config(&self, kind: ParameterKind, config: SettingsMap);

    /// Name of the provider that was active when the last session ended.
    fn last_provider(&self) -> Option<String>;
    fn set_last_provider(&self, name: &str);
}
