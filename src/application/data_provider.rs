// Provider trait - the contract every physiological data source implements
use crate::application::events::ProviderEvent;
use crate::application::settings_repository::SettingsMap;
use crate::domain::error::MonitorError;
use crate::domain::signal::ConnectionStatus;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// A pluggable source of waveform and parameter data.
///
/// The demo generator is the only implementation shipped here; network and
/// file playback providers plug in through the same contract. Providers emit
/// everything they produce on a broadcast channel and never call back into
/// the routing layer, which keeps provider switching a strict
/// stop-then-attach sequence.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Stable provider name used for registration and persistence.
    fn name(&self) -> &str;

    fn connection_status(&self) -> ConnectionStatus;

    /// True once the provider has finished connecting and is producing data.
    fn is_active(&self) -> bool;

    /// Begin acquisition. Idempotent: calling start on a provider that is
    /// already connecting or connected succeeds without restarting it.
    async fn start(&self) -> Result<(), MonitorError>;

    /// Stop acquisition. Safe to call at any time, including before start.
    async fn stop(&self);

    /// Apply provider-specific configuration. Unrecognized keys are ignored.
    async fn configure(&self, params: SettingsMap) -> Result<(), MonitorError>;

    /// Subscribe to the provider's event stream.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}
