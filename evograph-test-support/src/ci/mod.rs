//! Environment-driven knobs shared by the CI jobs and local runs.

pub mod property_test_profile;
