//! Observability for the verifier.
//!
//! Logging goes through `tracing` with `idtoken.*` targets; metrics go through
//! the `metrics` facade and are exported by whatever recorder the host installs.

pub mod metrics;
