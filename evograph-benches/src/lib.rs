//! Benchmark support crate for evograph.
//!
//! Provides scenario generators and parameter types used by the Criterion
//! benchmarks for the allocator and the simulation engine.

pub mod error;
pub mod params;
pub mod scenario;
