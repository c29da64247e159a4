// Infrastructure layer - External adapters: bootstrap config, settings store, demo source
pub mod config;
pub mod demo_provider;
pub mod settings_store;
