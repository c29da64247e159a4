//! Simulated real-time physiological monitoring core: a synthetic vitals
//! generator, per-signal models with rolling buffers and alarm evaluation,
//! and a routing service that owns provider lifecycle and data fan-out.
pub mod application;
pub mod domain;
pub mod infrastructure;
