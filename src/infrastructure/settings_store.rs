// JSON-file settings store - loaded at construction, saved when dirty
use crate::application::settings_repository::{SettingsMap, SettingsRepository};
use crate::domain::signal::{ParameterKind, WaveformKind};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSettings {
    #[serde(default)]
    providers: HashMap<String, SettingsMap>,
    // Keyed by the stringified numeric type id.
    #[serde(default)]
    waveforms: HashMap<String, SettingsMap>,
    #[serde(default)]
    parameters: HashMap<String, SettingsMap>,
    #[serde(default)]
    last_provider: Option<String>,
}

struct StoreState {
    settings: StoredSettings,
    dirty: bool,
}

/// Settings repository backed by a single JSON file.
///
/// All reads and writes go through an in-memory copy; the file is written
/// on an explicit `save` and on drop when there are unsaved changes. An
/// in-memory store without a path behaves identically minus persistence,
/// which is what tests use.
pub struct JsonSettingsStore {
    path: Option<PathBuf>,
    state: Mutex<StoreState>,
}

impl JsonSettingsStore {
    pub fn in_memory() -> Self {
        JsonSettingsStore {
            path: None,
            state: Mutex::new(StoreState {
                settings: StoredSettings::default(),
                dirty: false,
            }),
        }
    }

    /// Open a file-backed store. A missing file starts an empty store; it
    /// is created on first save.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let settings = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse settings file {}", path.display()))?
        } else {
            StoredSettings::default()
        };

        Ok(JsonSettingsStore {
            path: Some(path),
            state: Mutex::new(StoreState {
                settings,
                dirty: false,
            }),
        })
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut state = self.state.lock().unwrap();
        let raw = serde_json::to_string_pretty(&state.settings)?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        state.dirty = false;
        Ok(())
    }

    fn get(&self, section: Section, key: &str) -> SettingsMap {
        let state = self.state.lock().unwrap();
        let maps = match section {
            Section::Providers => &state.settings.providers,
            Section::Waveforms => &state.settings.waveforms,
            Section::Parameters => &state.settings.parameters,
        };
        maps.get(key).cloned().unwrap_or_default()
    }

    fn set(&self, section: Section, key: &str, config: SettingsMap) {
        let mut state = self.state.lock().unwrap();
        let maps = match section {
            Section::Providers => &mut state.settings.providers,
            Section::Waveforms => &mut state.settings.waveforms,
            Section::Parameters => &mut state.settings.parameters,
        };
        maps.insert(key.to_string(), config);
        state.dirty = true;
    }
}

#[derive(Clone, Copy)]
enum Section {
    Providers,
    Waveforms,
    Parameters,
}

impl SettingsRepository for JsonSettingsStore {
    fn provider_config(&self, name: &str) -> SettingsMap {
        self.get(Section::Providers, name)
    }

    fn set_provider_config(&self, name: &str, config: SettingsMap) {
        self.set(Section::Providers, name, config);
    }

    fn waveform_config(&self, kind: WaveformKind) -> SettingsMap {
        self.get(Section::Waveforms, &kind.id().to_string())
    }

    fn set_waveform_config(&self, kind: WaveformKind, config: SettingsMap) {
        self.set(Section::Waveforms, &kind.id().to_string(), config);
    }

    fn parameter_config(&self, kind: ParameterKind) -> SettingsMap {
        self.get(Section::Parameters, &kind.id().to_string())
    }

    fn set_parameter_config(&self, kind: ParameterKind, config: SettingsMap) {
        self.set(Section::Parameters, &kind.id().to_string(), config);
    }

    fn last_provider(&self) -> Option<String> {
        self.state.lock().unwrap().settings.last_provider.clone()
    }

    fn set_last_provider(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.settings.last_provider = Some(name.to_string());
        state.dirty = true;
    }
}

impl Drop for JsonSettingsStore {
    fn drop(&mut self) {
        let dirty = self.state.lock().unwrap().dirty;
        if dirty {
            if let Err(err) = self.save() {
                tracing::warn!("failed to persist settings on shutdown: {err:#}");
            }
        }
    }
}
