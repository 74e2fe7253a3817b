//! Shared test utilities used across evograph crates.

pub mod ci;
pub mod tracing;
