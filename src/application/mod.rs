// Application layer - Use cases, model state, and provider/settings seams
pub mod data_provider;
pub mod events;
pub mod monitor_service;
pub mod parameter_model;
pub mod settings_repository;
pub mod waveform_model;
