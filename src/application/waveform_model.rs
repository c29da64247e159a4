// Waveform model - bounded rolling sample history plus display metadata
use crate::application::events::ModelEvent;
use crate::application::settings_repository::{SettingsMap, SettingsRepository};
use crate::domain::catalog;
use crate::domain::signal::{Rgb, WaveformKind};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct WaveformState {
    color: Rgb,
    min_value: f32,
    max_value: f32,
    capacity: usize,
    samples: VecDeque<f32>,
    last_timestamp_ms: Option<i64>,
    active: bool,
    demo: bool,
}

/// Rolling buffer of one waveform's most recent samples.
///
/// The buffer always holds exactly `capacity` samples once constructed; it
/// is seeded with a low-amplitude sine so first renders are not a flatline.
/// Incoming batches must carry strictly increasing timestamps - anything
/// else is dropped without touching the buffer.
pub struct WaveformModel {
    kind: WaveformKind,
    state: RwLock<WaveformState>,
    events: broadcast::Sender<ModelEvent>,
    settings: Arc<dyn SettingsRepository>,
}

impl WaveformModel {
    pub fn new(kind: WaveformKind, settings: Arc<dyn SettingsRepository>) -> Self {
        let (min_value, max_value) = catalog::default_waveform_range(kind);
        let mut state = WaveformState {
            color: catalog::default_waveform_color(kind),
            min_value,
            max_value,
            capacity: catalog::DEFAULT_BUFFER_SAMPLES,
            samples: VecDeque::new(),
            last_timestamp_ms: None,
            active: true,
            demo: true,
        };

        let config = settings.waveform_config(kind);
        if let Some(active) = config.get("active").and_then(|v| v.as_bool()) {
            state.active = active;
        }
        if let Some(color) = config.get("color").and_then(Rgb::from_json) {
            state.color = color;
        }
        if let Some(min) = config.get("minValue").and_then(|v| v.as_f64()) {
            state.min_value = min as f32;
        }
        if let Some(max) = config.get("maxValue").and_then(|v| v.as_f64()) {
            state.max_value = max as f32;
        }
        if let Some(size) = config.get("bufferSize").and_then(|v| v.as_u64()) {
            if size > 0 {
                state.capacity = size as usize;
            }
        }
        if state.min_value >= state.max_value {
            state.max_value = state.min_value + 1.0;
        }

        state.samples = seed_buffer(state.capacity);

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        WaveformModel {
            kind,
            state: RwLock::new(state),
            events,
            settings,
        }
    }

    pub fn kind(&self) -> WaveformKind {
        self.kind
    }

    pub fn waveform_id(&self) -> i32 {
        self.kind.id()
    }

    pub fn display_name(&self) -> &'static str {
        catalog::waveform_display_name(self.kind)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.events.subscribe()
    }

    /// Append a batch of samples stamped with `timestamp_ms`.
    ///
    /// Rejected without mutation when the model is inactive, the batch is
    /// empty, or the timestamp does not advance past the last accepted one.
    /// A batch at least as large as the buffer replaces it with the batch
    /// tail; smaller batches shift the buffer left, keeping its length fixed.
    pub fn add_samples(&self, timestamp_ms: i64, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        {
            let mut state = self.state.write().unwrap();
            if !state.active {
                return;
            }
            if let Some(last) = state.last_timestamp_ms {
                if timestamp_ms <= last {
                    tracing::warn!(
                        waveform = self.display_name(),
                        last,
                        got = timestamp_ms,
                        "out-of-order waveform batch dropped"
                    );
                    return;
                }
            }
            state.last_timestamp_ms = Some(timestamp_ms);

            let capacity = state.capacity;
            if samples.len() >= capacity {
                state.samples.clear();
                state
                    .samples
                    .extend(samples[samples.len() - capacity..].iter().copied());
            } else {
                state.samples.drain(..samples.len());
                state.samples.extend(samples.iter().copied());
            }
        }
        let _ = self.events.send(ModelEvent::DataUpdated);
    }

    /// Snapshot of the buffer contents, oldest sample first.
    pub fn data(&self) -> Vec<f32> {
        let state = self.state.read().unwrap();
        state.samples.iter().copied().collect()
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

    /// Update the display scaling range. An inverted or empty range is
    /// repaired by clamping the maximum above the minimum.
    pub fn set_scaling_range(&self, min: f32, max: f32) {
        let mut max = max;
        if min >= max {
            tracing::warn!(
                waveform = self.display_name(),
                min,
                max,
                "invalid scaling range, clamping"
            );
            max = min + 1.0;
        }
        {
            let mut state = self.state.write().unwrap();
            if state.min_value == min && state.max_value == max {
                return;
            }
            state.min_value = min;
            state.max_value = max;
        }
        let _ = self.events.send(ModelEvent::PropertiesChanged);
    }

    pub fn max_buffer_size(&self) -> usize {
        self.state.read().unwrap().capacity
    }

    /// Resize the buffer to exactly `size` samples, dropping the oldest
    /// samples when shrinking and padding the oldest end when growing.
    pub fn set_max_buffer_size(&self, size: usize) {
        if size == 0 {
            tracing::warn!(waveform = self.display_name(), "ignoring zero buffer size");
            return;
        }
        {
            let mut state = self.state.write().unwrap();
            if state.capacity == size {
                return;
            }
            if size < state.samples.len() {
                let excess = state.samples.len() - size;
                state.samples.drain(..excess);
            } else {
                for _ in 0..size - state.samples.len() {
                    state.samples.push_front(0.0);
                }
            }
            state.capacity = size;
        }
        let _ = self.events.send(ModelEvent::PropertiesChanged);
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

    pub fn is_demo(&self) -> bool {
        self.state.read().unwrap().demo
    }

    pub fn set_demo(&self, demo: bool) {
        {
            let mut state = self.state.write().unwrap();
            if state.demo == demo {
                return;
            }
            state.demo = demo;
        }
        let _ = self.events.send(ModelEvent::PropertiesChanged);
    }

    /// Timestamp of the last accepted batch, if any was accepted yet.
    pub fn last_update_time(&self) -> Option<DateTime<Utc>> {
        let state = self.state.read().unwrap();
        state
            .last_timestamp_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

impl Drop for WaveformModel {
    fn drop(&mut self) {
        let state = self.state.read().unwrap();
        let mut config = SettingsMap::new();
        config.insert("active".into(), serde_json::json!(state.active));
        config.insert("color".into(), state.color.to_json());
        config.insert("minValue".into(), serde_json::json!(state.min_value));
        config.insert("maxValue".into(), serde_json::json!(state.max_value));
        config.insert("bufferSize".into(), serde_json::json!(state.capacity));
        self.settings.set_waveform_config(self.kind, config);
    }
}

/// Low-amplitude sine seed so a freshly created buffer renders visibly.
fn seed_buffer(capacity: usize) -> VecDeque<f32> {
    (0..capacity)
        .map(|i| {
            let phase = i as f32 / capacity as f32 * 2.0 * PI;
            0.5 * phase.sin()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::settings_store::JsonSettingsStore;

    fn model_with_capacity(capacity: usize) -> WaveformModel {
        let settings = Arc::new(JsonSettingsStore::in_memory());
        let model = WaveformModel::new(WaveformKind::EcgII, settings);
        model.set_max_buffer_size(capacity);
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
    fn buffer_starts_full_with_sine_seed() {
        let settings = Arc::new(JsonSettingsStore::in_memory());
        let model = WaveformModel::new(WaveformKind::EcgII, settings);
        let data = model.data();
        assert_eq!(data.len(), catalog::DEFAULT_BUFFER_SAMPLES);
        assert!(data.iter().any(|v| v.abs() > 0.3));
    }

    #[test]
    fn small_batches_shift_fifo() {
        let model = model_with_capacity(5);
        model.add_samples(1, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        model.add_samples(2, &[6.0, 7.0]);
        assert_eq!(model.data(), vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn sequential_batches_keep_most_recent_window() {
        let model = model_with_capacity(5);
        model.add_samples(1, &[1.0, 2.0, 3.0]);
        model.add_samples(2, &[4.0, 5.0, 6.0]);
        assert_eq!(model.data(), vec![2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn oversize_batch_becomes_exact_tail() {
        let model = model_with_capacity(3);
        model.add_samples(1, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(model.data(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn buffer_length_is_invariant_after_many_batches() {
        let model = model_with_capacity(7);
        for i in 0..50 {
            model.add_samples(i + 1, &[i as f32, i as f32 + 0.5]);
            assert_eq!(model.data().len(), 7);
        }
    }

    #[test]
    fn non_increasing_timestamps_are_rejected() {
        let model = model_with_capacity(4);
        model.add_samples(10, &[1.0, 2.0]);
        let before = model.data();

        model.add_samples(10, &[9.0, 9.0]);
        model.add_samples(5, &[9.0, 9.0]);

        assert_eq!(model.data(), before);
        assert_eq!(
            model.last_update_time(),
            Utc.timestamp_millis_opt(10).single()
        );
    }

    #[test]
    fn inactive_and_empty_batches_are_dropped() {
        let model = model_with_capacity(4);
        let before = model.data();
        model.add_samples(1, &[]);
        assert_eq!(model.data(), before);

        model.set_active(false);
        model.add_samples(1, &[1.0]);
        assert_eq!(model.data(), before);
        assert_eq!(model.last_update_time(), None);
    }

    #[test]
    fn set_active_is_idempotent_for_notifications() {
        let model = model_with_capacity(4);
        let mut rx = model.subscribe();

        model.set_active(true);
        assert!(drain(&mut rx).is_empty());

        model.set_active(false);
        let events = drain(&mut rx);
        assert!(events.contains(&ModelEvent::ActiveStateChanged(false)));
        assert!(events.contains(&ModelEvent::PropertiesChanged));
    }

    #[test]
    fn scaling_range_changes_emit_only_on_difference() {
        let model = model_with_capacity(4);
        model.set_scaling_range(-2.0, 2.0);
        let mut rx = model.subscribe();

        model.set_scaling_range(-2.0, 2.0);
        assert!(drain(&mut rx).is_empty());

        model.set_scaling_range(-3.0, 3.0);
        assert_eq!(drain(&mut rx), vec![ModelEvent::PropertiesChanged]);
    }

    #[test]
    fn inverted_scaling_range_is_clamped() {
        let model = model_with_capacity(4);
        model.set_scaling_range(5.0, 1.0);
        assert_eq!(model.min_value(), 5.0);
        assert!(model.max_value() > model.min_value());
    }

    #[test]
    fn resize_preserves_most_recent_samples() {
        let model = model_with_capacity(5);
        model.add_samples(1, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        model.set_max_buffer_size(3);
        assert_eq!(model.data(), vec![3.0, 4.0, 5.0]);

        model.set_max_buffer_size(5);
        assert_eq!(model.data(), vec![0.0, 0.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn configuration_round_trips_through_drop() {
        let settings = Arc::new(JsonSettingsStore::in_memory());
        {
            let model = WaveformModel::new(WaveformKind::Abp, settings.clone());
            model.set_scaling_range(0.0, 4.0);
            model.set_max_buffer_size(500);
            model.set_active(false);
        }
        let restored = WaveformModel::new(WaveformKind::Abp, settings);
        assert_eq!(restored.min_value(), 0.0);
        assert_eq!(restored.max_value(), 4.0);
        assert_eq!(restored.max_buffer_size(), 500);
        assert!(!restored.is_active());
    }
}
