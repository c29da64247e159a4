// Parameter model - current value plus threshold-derived alarm severity
use crate::application::events::ModelEvent;
use crate::application::settings_repository::{SettingsMap, SettingsRepository};
use crate::domain::catalog;
use crate::domain::signal::{AlarmSeverity, ParameterKind, Rgb};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct ParameterState {
    value: f32,
    timestamp_ms: i64,
    color: Rgb,
    min_value: f32,
    max_value: f32,
    low_critical: f32,
    low_warning: f32,
    high_warning: f32,
    high_critical: f32,
    severity: AlarmSeverity,
    active: bool,
}

/// Severity is a pure function of the value and the four thresholds.
///
/// High-threshold checks run before low-threshold checks. With pathological
/// threshold configurations (e.g. highWarning below lowCritical) this order
/// decides which state wins; it is a deliberate tie-break that downstream
/// alarm handling depends on.
fn derive_severity(value: f32, state: &ParameterState) -> AlarmSeverity {
    if value > state.high_critical {
        AlarmSeverity::HighCritical
    } else if value > state.high_warning {
        AlarmSeverity::HighWarning
    } else if value < state.low_critical {
        AlarmSeverity::LowCritical
    } else if value < state.low_warning {
        AlarmSeverity::LowWarning
    } else {
        AlarmSeverity::Normal
    }
}

/// Holds one parameter's latest value and evaluates its alarm state.
///
/// Threshold transitions are stateless re-evaluations; there is no
/// hysteresis band.
pub struct ParameterModel {
    kind: ParameterKind,
    state: RwLock<ParameterState>,
    events: broadcast::Sender<ModelEvent>,
    settings: Arc<dyn SettingsRepository>,
}

impl ParameterModel {
    pub fn new(kind: ParameterKind, settings: Arc<dyn SettingsRepository>) -> Self {
        let (min_value, max_value) = catalog::default_parameter_range(kind);
        let limits = catalog::default_alarm_limits(kind);
        let mut state = ParameterState {
            value: 0.0,
            timestamp_ms: Utc::now().timestamp_millis(),
            color: catalog::default_parameter_color(kind),
            min_value,
            max_value,
            low_critical: limits.low_critical,
            low_warning: limits.low_warning,
            high_warning: limits.high_warning,
            high_critical: limits.high_critical,
            severity: AlarmSeverity::Normal,
            active: false,
        };

        let config = settings.parameter_config(kind);
        if let Some(active) = config.get("active").and_then(|v| v.as_bool()) {
            state.active = active;
        }
        if let Some(color) = config.get("color").and_then(Rgb::from_json) {
            state.color = color;
        }
        for (key, slot) in [
            ("minValue", &mut state.min_value),
            ("maxValue", &mut state.max_value),
            ("lowCritical", &mut state.low_critical),
            ("lowWarning", &mut state.low_warning),
            ("highWarning", &mut state.high_warning),
            ("highCritical", &mut state.high_critical),
        ] {
            if let Some(value) = config.get(key).and_then(|v| v.as_f64()) {
                *slot = value as f32;
            }
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        ParameterModel {
            kind,
            state: RwLock::new(state),
            events,
            settings,
        }
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    pub fn parameter_id(&self) -> i32 {
        self.kind.id()
    }

    pub fn display_name(&self) -> &'static str {
        catalog::parameter_display_name(self.kind)
    }

    pub fn unit(&self) -> &'static str {
        catalog::parameter_unit(self.kind)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.events.subscribe()
    }

    /// Store a new value and re-derive the alarm severity.
    ///
    /// Emits `PropertiesChanged` only when the value or the severity
    /// actually changed; a repeated identical update is silent.
    pub fn update_value(&self, timestamp_ms: i64, value: f32) {
        let mut pending = Vec::new();
        {
            let mut state = self.state.write().unwrap();
            let old_value = state.value;
            let old_severity = state.severity;

            let severity = derive_severity(value, &state);
            state.severity = severity;
            state.value = value;
            state.timestamp_ms = if timestamp_ms > 0 {
                timestamp_ms
            } else {
                Utc::now().timestamp_millis()
            };

            tracing::debug!(
                parameter = self.display_name(),
                value,
                severity = ?state.severity,
                "parameter updated"
            );

            if old_value != state.value || old_severity != state.severity {
                pending.push(ModelEvent::PropertiesChanged);
            }
            if old_severity != state.severity {
                pending.push(ModelEvent::AlarmStateChanged(state.severity));
            }
        }
        for event in pending {
            let _ = self.events.send(event);
        }
    }

    /// Replace all four alarm thresholds atomically and re-derive severity.
    ///
    /// Always emits `PropertiesChanged`; emits `AlarmStateChanged` only when
    /// the re-derived severity differs from the previous one.
    pub fn set_alarm_limits(
        &self,
        low_critical: f32,
        low_warning: f32,
        high_warning: f32,
        high_critical: f32,
    ) {
        let mut pending = vec![ModelEvent::PropertiesChanged];
        {
            let mut state = self.state.write().unwrap();
            let old_severity = state.severity;

            state.low_critical = low_critical;
            state.low_warning = low_warning;
            state.high_warning = high_warning;
            state.high_critical = high_critical;
            let severity = derive_severity(state.value, &state);
            state.severity = severity;

            if old_severity != state.severity {
                pending.push(ModelEvent::AlarmStateChanged(state.severity));
            }
        }
        for event in pending {
            let _ = self.events.send(event);
        }
    }

    /// Flag a sensor/equipment fault. Technical severity is never derived
    /// from thresholds; the next value update clears it by re-deriving.
    pub fn set_technical_fault(&self) {
        {
            let mut state = self.state.write().unwrap();
            if state.severity == AlarmSeverity::Technical {
                return;
            }
            state.severity = AlarmSeverity::Technical;
        }
        let _ = self
            .events
            .send(ModelEvent::AlarmStateChanged(AlarmSeverity::Technical));
        let _ = self.events.send(ModelEvent::PropertiesChanged);
    }

    pub fn value(&self) -> f32 {
        self.state.read().unwrap().value
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let state = self.state.read().unwrap();
        Utc.timestamp_millis_opt(state.timestamp_ms).single()
    }

    pub fn color(&self) -> Rgb {
        self.state.read().unwrap().color
    }

    pub fn set_color(&self, color: Rgb) {
        {
            let mut state = self.state.write().unwrap();
            if state.color == color {
                return;
            }
            state.color = color;
        }
        let _ = self.events.send(ModelEvent::PropertiesChanged);
    }

    pub fn min_value(&self) -> f32 {
        self.state.read().unwrap().min_value
    }

    pub fn max_value(&self) -> f32 {
        self.state.read().unwrap().max_value
    }

    pub fn alarm_limits(&self) -> catalog::AlarmLimits {
        let state = self.state.read().unwrap();
        catalog::AlarmLimits {
            low_critical: state.low_critical,
            low_warning: state.low_warning,
            high_warning: state.high_warning,
            high_critical: state.high_critical,
        }
    }

    pub fn alarm_severity(&self) -> AlarmSeverity {
        self.state.read().unwrap().severity
    }

    pub fn is_active(&self) -> bool {
        self.state.read().unwrap().active
    }

    pub fn set_active(&self, active: bool) {
        {
            let mut state = self.state.write().unwrap();
            if state.active == active {
                return;
            }
            state.active = active;
        }
        let _ = self.events.send(ModelEvent::ActiveStateChanged(active));
        let _ = self.events.send(ModelEvent::PropertiesChanged);
    }
}

impl Drop for ParameterModel {
    fn drop(&mut self) {
        let state = self.state.read().unwrap();
        let mut config = SettingsMap::new();
        config.insert("active".into(), serde_json::json!(state.active));
        config.insert("color".into(), state.color.to_json());
        config.insert("minValue".into(), serde_json::json!(state.min_value));
        config.insert("maxValue".into(), serde_json::json!(state.max_value));
        config.insert("lowCritical".into(), serde_json::json!(state.low_critical));
        config.insert("lowWarning".into(), serde_json::json!(state.low_warning));
        config.insert("highWarning".into(), serde_json::json!(state.high_warning));
        config.insert("highCritical".into(), serde_json::json!(state.high_critical));
        self.settings.set_parameter_config(self.kind, config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::settings_store::JsonSettingsStore;

    fn heart_rate_model() -> ParameterModel {
        let settings = Arc::new(JsonSettingsStore::in_memory());
        let model = ParameterModel::new(ParameterKind::Hr, settings);
        model.set_alarm_limits(40.0, 50.0, 120.0, 150.0);
        model
    }

    fn drain(rx: &mut broadcast::Receiver<ModelEvent>) -> Vec<ModelEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn severity_ladder_for_heart_rate() {
        let model = heart_rate_model();

        model.update_value(1, 160.0);
        assert_eq!(model.alarm_severity(), AlarmSeverity::HighCritical);

        model.update_value(2, 125.0);
        assert_eq!(model.alarm_severity(), AlarmSeverity::HighWarning);

        model.update_value(3, 90.0);
        assert_eq!(model.alarm_severity(), AlarmSeverity::Normal);

        model.update_value(4, 35.0);
        assert_eq!(model.alarm_severity(), AlarmSeverity::LowCritical);

        model.update_value(5, 45.0);
        assert_eq!(model.alarm_severity(), AlarmSeverity::LowWarning);
    }

    #[test]
    fn repeated_identical_update_is_silent() {
        let model = heart_rate_model();
        model.update_value(1, 90.0);

        let mut rx = model.subscribe();
        model.update_value(1, 90.0);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(model.alarm_severity(), AlarmSeverity::Normal);
    }

    #[test]
    fn severity_is_independent_of_threshold_update_order() {
        let settings = Arc::new(JsonSettingsStore::in_memory());
        let a = ParameterModel::new(ParameterKind::Spo2, settings.clone());
        let b = ParameterModel::new(ParameterKind::Spo2, settings);

        a.set_alarm_limits(85.0, 90.0, 100.0, 100.0);
        a.update_value(1, 87.0);

        b.update_value(1, 87.0);
        b.set_alarm_limits(85.0, 90.0, 100.0, 100.0);

        assert_eq!(a.alarm_severity(), b.alarm_severity());
        assert_eq!(a.alarm_severity(), AlarmSeverity::LowWarning);
    }

    #[test]
    fn high_checks_win_over_low_with_misconfigured_thresholds() {
        let model = heart_rate_model();
        // highWarning below lowCritical: 30 is both < lowCritical and
        // > highWarning; the high branch must win.
        model.set_alarm_limits(40.0, 50.0, 20.0, 200.0);
        model.update_value(1, 30.0);
        assert_eq!(model.alarm_severity(), AlarmSeverity::HighWarning);
    }

    #[test]
    fn set_alarm_limits_always_emits_properties() {
        let model = heart_rate_model();
        model.update_value(1, 90.0);
        let mut rx = model.subscribe();

        // Same severity after the change: properties only.
        model.set_alarm_limits(40.0, 50.0, 120.0, 150.0);
        assert_eq!(drain(&mut rx), vec![ModelEvent::PropertiesChanged]);

        // Severity flips to HighCritical: both notifications.
        model.set_alarm_limits(10.0, 20.0, 30.0, 40.0);
        let events = drain(&mut rx);
        assert!(events.contains(&ModelEvent::PropertiesChanged));
        assert!(events.contains(&ModelEvent::AlarmStateChanged(AlarmSeverity::HighCritical)));
    }

    #[test]
    fn technical_fault_is_injected_not_derived() {
        let model = heart_rate_model();
        model.update_value(1, 90.0);
        model.set_technical_fault();
        assert_eq!(model.alarm_severity(), AlarmSeverity::Technical);

        // The next value update re-derives from thresholds.
        model.update_value(2, 91.0);
        assert_eq!(model.alarm_severity(), AlarmSeverity::Normal);
    }

    #[test]
    fn configuration_round_trips_through_drop() {
        let settings = Arc::new(JsonSettingsStore::in_memory());
        {
            let model = ParameterModel::new(ParameterKind::Etco2, settings.clone());
            model.set_alarm_limits(10.0, 15.0, 55.0, 60.0);
            model.set_active(true);
            model.set_color(Rgb::new(1, 2, 3));
        }
        let restored = ParameterModel::new(ParameterKind::Etco2, settings);
        let limits = restored.alarm_limits();
        assert_eq!(limits.low_critical, 10.0);
        assert_eq!(limits.high_critical, 60.0);
        assert!(restored.is_active());
        assert_eq!(restored.color(), Rgb::new(1, 2, 3));
    }
}
