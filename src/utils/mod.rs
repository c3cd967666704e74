// Shared plumbing: configuration, error taxonomy, loop metrics and tick trace.
pub mod config;
pub mod error;
pub mod metrics;
pub mod trace;
