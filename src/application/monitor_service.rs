// Monitor service - provider lifecycle, model ownership, and data routing
use crate::application::data_provider::DataProvider;
use crate::application::events::{MonitorEvent, ProviderEvent};
use crate::application::parameter_model::ParameterModel;
use crate::application::settings_repository::{SettingsMap, SettingsRepository};
use crate::application::waveform_model::WaveformModel;
use crate::domain::error::MonitorError;
use crate::domain::signal::{ParameterKind, WaveformKind};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct ServiceState {
    providers: Vec<Arc<dyn DataProvider>>,
    current: Option<Arc<dyn DataProvider>>,
    router: Option<JoinHandle<()>>,
    waveforms: HashMap<i32, Arc<WaveformModel>>,
    parameters: HashMap<i32, Arc<ParameterModel>>,
}

/// Central coordination point for physiological data.
///
/// Owns the provider registry and the per-signal models, routes provider
/// events to the matching model by numeric id, and manages active-provider
/// switching with a strict stop-before-start ordering so two providers are
/// never attached at once, even transiently.
pub struct MonitorService {
    settings: Arc<dyn SettingsRepository>,
    events: broadcast::Sender<MonitorEvent>,
    inner: Mutex<ServiceState>,
}

impl MonitorService {
    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        MonitorService {
            settings,
            events,
            inner: Mutex::new(ServiceState {
                providers: Vec::new(),
                current: None,
                router: None,
                waveforms: HashMap::new(),
                parameters: HashMap::new(),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Make a provider available for selection. A provider with the same
    /// name replaces the earlier registration.
    pub async fn register_provider(&self, provider: Arc<dyn DataProvider>) {
        let mut state = self.inner.lock().await;
        let name = provider.name().to_string();
        state.providers.retain(|p| p.name() != name);
        state.providers.push(provider);
        tracing::debug!(provider = name, "registered provider");
    }

    /// Create one model per catalog entry and reactivate the provider that
    /// was selected when the last session ended, falling back to the first
    /// registered provider.
    pub async fn initialize(&self) -> Result<(), MonitorError> {
        let target = {
            let mut state = self.inner.lock().await;
            for kind in WaveformKind::ALL {
                state.waveforms.insert(
                    kind.id(),
                    Arc::new(WaveformModel::new(kind, self.settings.clone())),
                );
            }
            for kind in ParameterKind::ALL {
                state.parameters.insert(
                    kind.id(),
                    Arc::new(ParameterModel::new(kind, self.settings.clone())),
                );
            }

            let last = self.settings.last_provider().unwrap_or_default();
            let known = state.providers.iter().any(|p| p.name() == last);
            if !last.is_empty() && known {
                Some(last)
            } else {
                state.providers.first().map(|p| p.name().to_string())
            }
        };

        if let Some(name) = target {
            self.set_active_provider(&name).await?;
        }
        Ok(())
    }

    /// Start acquisition on the active provider, forcing every parameter
    /// model active first. Fails with an error event when no provider is
    /// selected. An already-running provider is restarted.
    pub async fn start_acquisition(&self) -> Result<(), MonitorError> {
        let provider = {
            let state = self.inner.lock().await;
            match state.current.clone() {
                Some(provider) => {
                    for model in state.parameters.values() {
                        model.set_active(true);
                    }
                    provider
                }
                None => {
                    drop(state);
                    let err = MonitorError::Configuration(
                        "cannot start acquisition: no active provider".into(),
                    );
                    tracing::warn!("{err}");
                    let _ = self.events.send(MonitorEvent::ErrorOccurred {
                        code: err.code(),
                        message: err.to_string(),
                    });
                    return Err(err);
                }
            }
        };

        if provider.is_active() {
            tracing::debug!(provider = provider.name(), "provider already active, restarting");
            provider.stop().await;
        }
        provider.start().await
    }

    /// Stop the active provider. A no-op when none is selected.
    pub async fn stop_acquisition(&self) {
        let provider = self.inner.lock().await.current.clone();
        if let Some(provider) = provider {
            provider.stop().await;
        }
    }

    pub async fn available_providers(&self) -> Vec<String> {
        let state = self.inner.lock().await;
        state.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub async fn current_provider(&self) -> Option<Arc<dyn DataProvider>> {
        self.inner.lock().await.current.clone()
    }

    /// Switch the active provider by name.
    ///
    /// An empty name deactivates the current provider. Re-selecting the
    /// already-active provider runs a full stop/attach cycle. Exactly one
    /// `ActiveProviderChanged` is emitted per successful call; an unknown
    /// name fails without touching any state.
    pub async fn set_active_provider(&self, name: &str) -> Result<(), MonitorError> {
        let mut state = self.inner.lock().await;

        if name.is_empty() {
            if let Some(previous) = state.current.take() {
                if let Some(router) = state.router.take() {
                    router.abort();
                }
                previous.stop().await;
                self.settings.set_last_provider("");
                drop(state);
                let _ = self
                    .events
                    .send(MonitorEvent::ActiveProviderChanged(String::new()));
                return Ok(());
            }
            // Fall through: no provider to deactivate means the empty name
            // is treated like any other unknown provider.
        }

        let Some(provider) = state
            .providers
            .iter()
            .find(|p| p.name() == name)
            .cloned()
        else {
            tracing::warn!(provider = name, "unknown provider");
            return Err(MonitorError::Configuration(format!(
                "unknown provider: {name}"
            )));
        };

        if let Some(previous) = state.current.take() {
            if let Some(router) = state.router.take() {
                router.abort();
            }
            previous.stop().await;
        }

        let receiver = provider.subscribe();
        state.router = Some(tokio::spawn(route_provider_events(
            receiver,
            state.waveforms.clone(),
            state.parameters.clone(),
            self.events.clone(),
        )));
        state.current = Some(provider);
        self.settings.set_last_provider(name);
        drop(state);

        let _ = self
            .events
            .send(MonitorEvent::ActiveProviderChanged(name.to_string()));
        Ok(())
    }

    /// Forward configuration to the active provider.
    pub async fn configure_current_provider(
        &self,
        params: SettingsMap,
    ) -> Result<(), MonitorError> {
        let provider = self.inner.lock().await.current.clone();
        match provider {
            Some(provider) => provider.configure(params).await,
            None => Err(MonitorError::Configuration(
                "cannot configure provider: no active provider".into(),
            )),
        }
    }

    pub async fn waveform_model(&self, waveform_id: i32) -> Option<Arc<WaveformModel>> {
        self.inner.lock().await.waveforms.get(&waveform_id).cloned()
    }

    pub async fn all_waveform_models(&self) -> Vec<Arc<WaveformModel>> {
        let state = self.inner.lock().await;
        let mut models: Vec<_> = state.waveforms.values().cloned().collect();
        models.sort_by_key(|m| m.waveform_id());
        models
    }

    pub async fn parameter_model(&self, parameter_id: i32) -> Option<Arc<ParameterModel>> {
        self.inner.lock().await.parameters.get(&parameter_id).cloned()
    }

    pub async fn all_parameter_models(&self) -> Vec<Arc<ParameterModel>> {
        let state = self.inner.lock().await;
        let mut models: Vec<_> = state.parameters.values().cloned().collect();
        models.sort_by_key(|m| m.parameter_id());
        models
    }
}

/// Routing task: consumes one provider's event stream until detached.
///
/// Data for unknown or inactive models is an expected, frequent state and
/// is dropped quietly; status and error events pass through unchanged.
async fn route_provider_events(
    receiver: broadcast::Receiver<ProviderEvent>,
    waveforms: HashMap<i32, Arc<WaveformModel>>,
    parameters: HashMap<i32, Arc<ParameterModel>>,
    events: broadcast::Sender<MonitorEvent>,
) {
    let mut stream = BroadcastStream::new(receiver);
    while let Some(event) = stream.next().await {
        match event {
            Ok(ProviderEvent::Waveform {
                waveform_id,
                timestamp_ms,
                samples,
            }) => match waveforms.get(&waveform_id) {
                Some(model) if model.is_active() => model.add_samples(timestamp_ms, &samples),
                Some(model) => {
                    tracing::debug!(waveform = model.display_name(), "model inactive, dropping batch");
                }
                None => tracing::debug!(waveform_id, "no model for waveform data"),
            },
            Ok(ProviderEvent::Parameter {
                parameter_id,
                timestamp_ms,
                value,
            }) => match parameters.get(&parameter_id) {
                Some(model) if model.is_active() => model.update_value(timestamp_ms, value),
                Some(model) => {
                    tracing::debug!(parameter = model.display_name(), "model inactive, dropping value");
                }
                None => tracing::debug!(parameter_id, "no model for parameter data"),
            },
            Ok(ProviderEvent::Status(status)) => {
                let _ = events.send(MonitorEvent::ConnectionStatusChanged(status));
            }
            Ok(ProviderEvent::Error { code, message }) => {
                let _ = events.send(MonitorEvent::ErrorOccurred { code, message });
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "provider event stream lagged");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::ConnectionStatus;
    use crate::infrastructure::settings_store::JsonSettingsStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubProvider {
        name: String,
        active: AtomicBool,
        starts: AtomicUsize,
        stops: AtomicUsize,
        events: broadcast::Sender<ProviderEvent>,
    }

    impl StubProvider {
        fn new(name: &str) -> Arc<Self> {
            let (events, _) = broadcast::channel(64);
            Arc::new(StubProvider {
                name: name.to_string(),
                active: AtomicBool::new(false),
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                events,
            })
        }
    }

    #[async_trait]
    impl DataProvider for StubProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn connection_status(&self) -> ConnectionStatus {
            if self.is_active() {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Disconnected
            }
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        async fn start(&self) -> Result<(), MonitorError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.active.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.active.store(false, Ordering::SeqCst);
        }

        async fn configure(&self, _params: SettingsMap) -> Result<(), MonitorError> {
            Ok(())
        }

        fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
            self.events.subscribe()
        }
    }

    async fn service_with_demo() -> (Arc<MonitorService>, Arc<StubProvider>) {
        let settings = Arc::new(JsonSettingsStore::in_memory());
        let service = Arc::new(MonitorService::new(settings));
        let provider = StubProvider::new("Demo");
        service.register_provider(provider.clone()).await;
        service.initialize().await.unwrap();
        (service, provider)
    }

    fn provider_changes(rx: &mut broadcast::Receiver<MonitorEvent>) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let MonitorEvent::ActiveProviderChanged(name) = event {
                names.push(name);
            }
        }
        names
    }

    #[tokio::test]
    async fn initialize_creates_a_model_per_catalog_entry() {
        let (service, _provider) = service_with_demo().await;
        assert_eq!(service.all_waveform_models().await.len(), 9);
        assert_eq!(service.all_parameter_models().await.len(), 15);
        assert_eq!(
            service.current_provider().await.map(|p| p.name().to_string()),
            Some("Demo".to_string())
        );
    }

    #[tokio::test]
    async fn initialize_restores_last_used_provider() {
        let settings = Arc::new(JsonSettingsStore::in_memory());
        settings.set_last_provider("Playback");

        let service = Arc::new(MonitorService::new(settings));
        service.register_provider(StubProvider::new("Demo")).await;
        service.register_provider(StubProvider::new("Playback")).await;
        service.initialize().await.unwrap();

        assert_eq!(
            service.current_provider().await.map(|p| p.name().to_string()),
            Some("Playback".to_string())
        );
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected_without_state_change() {
        let (service, _provider) = service_with_demo().await;
        let mut rx = service.subscribe();

        let result = service.set_active_provider("Network").await;
        assert!(matches!(result, Err(MonitorError::Configuration(_))));
        assert_eq!(
            service.current_provider().await.map(|p| p.name().to_string()),
            Some("Demo".to_string())
        );
        assert!(provider_changes(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn reselecting_same_provider_runs_full_swap_cycle() {
        let (service, provider) = service_with_demo().await;
        let mut rx = service.subscribe();

        let stops_before = provider.stops.load(Ordering::SeqCst);
        service.set_active_provider("Demo").await.unwrap();
        service.set_active_provider("Demo").await.unwrap();

        assert!(provider.stops.load(Ordering::SeqCst) >= stops_before + 2);
        assert_eq!(provider_changes(&mut rx), vec!["Demo", "Demo"]);
    }

    #[tokio::test]
    async fn empty_name_deactivates_current_provider() {
        let (service, provider) = service_with_demo().await;
        let mut rx = service.subscribe();

        service.set_active_provider("").await.unwrap();
        assert!(service.current_provider().await.is_none());
        assert!(provider.stops.load(Ordering::SeqCst) >= 1);
        assert_eq!(provider_changes(&mut rx), vec![String::new()]);

        // With nothing active, the empty name is just an unknown provider.
        assert!(service.set_active_provider("").await.is_err());
    }

    #[tokio::test]
    async fn start_acquisition_without_provider_emits_error_event() {
        let (service, _provider) = service_with_demo().await;
        service.set_active_provider("").await.unwrap();
        let mut rx = service.subscribe();

        let result = service.start_acquisition().await;
        assert!(result.is_err());

        let mut saw_error = false;
        while let Ok(event) = rx.try_recv() {
            if let MonitorEvent::ErrorOccurred { code, .. } = event {
                assert_eq!(code, 200);
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn start_acquisition_forces_parameter_models_active() {
        let (service, provider) = service_with_demo().await;
        for model in service.all_parameter_models().await {
            assert!(!model.is_active());
        }

        service.start_acquisition().await.unwrap();
        for model in service.all_parameter_models().await {
            assert!(model.is_active());
        }
        assert_eq!(provider.starts.load(Ordering::SeqCst), 1);

        // Starting again restarts a running provider.
        service.start_acquisition().await.unwrap();
        assert!(provider.stops.load(Ordering::SeqCst) >= 1);
        assert_eq!(provider.starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn provider_data_is_routed_to_matching_models() {
        let (service, provider) = service_with_demo().await;
        service.start_acquisition().await.unwrap();

        let hr = service.parameter_model(0).await.unwrap();
        let ecg = service.waveform_model(1).await.unwrap();

        provider
            .events
            .send(ProviderEvent::Parameter {
                parameter_id: 0,
                timestamp_ms: 10,
                value: 72.0,
            })
            .unwrap();
        provider
            .events
            .send(ProviderEvent::Waveform {
                waveform_id: 1,
                timestamp_ms: 10,
                samples: vec![0.1, 0.2, 0.3],
            })
            .unwrap();
        // Unknown ids must be dropped quietly.
        provider
            .events
            .send(ProviderEvent::Parameter {
                parameter_id: 99,
                timestamp_ms: 10,
                value: 1.0,
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hr.value(), 72.0);
        let data = ecg.data();
        assert_eq!(&data[data.len() - 3..], &[0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn status_and_errors_are_forwarded_unchanged() {
        let (service, provider) = service_with_demo().await;
        let mut rx = service.subscribe();

        provider
            .events
            .send(ProviderEvent::Status(ConnectionStatus::Connected))
            .unwrap();
        provider
            .events
            .send(ProviderEvent::Error {
                code: 400,
                message: "sensor fault".into(),
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut saw_status = false;
        let mut saw_error = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                MonitorEvent::ConnectionStatusChanged(ConnectionStatus::Connected) => {
                    saw_status = true;
                }
                MonitorEvent::ErrorOccurred { code, message } => {
                    assert_eq!(code, 400);
                    assert_eq!(message, "sensor fault");
                    saw_error = true;
                }
                _ => {}
            }
        }
        assert!(saw_status);
        assert!(saw_error);
    }

    #[tokio::test]
    async fn detaching_stops_routing() {
        let (service, provider) = service_with_demo().await;
        service.start_acquisition().await.unwrap();
        let hr = service.parameter_model(0).await.unwrap();

        service.set_active_provider("").await.unwrap();
        let _ = provider.events.send(ProviderEvent::Parameter {
            parameter_id: 0,
            timestamp_ms: 10,
            value: 130.0,
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hr.value(), 0.0);
    }
}
