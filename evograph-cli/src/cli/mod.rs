//! Command-line interface for running evograph scenarios.
//!
//! `run` simulates a JSON scenario and writes one artifact per population,
//! `validate` only checks the scenario, and `rows` prints the diff rows of a
//! single population.

mod commands;

pub use commands::{
    Cli, CliError, Command, Outcome, PopulationLine, RowsCommand, RunCommand, RunSummary,
    ValidateCommand, load_scenario, render_outcome, run_cli,
};

#[cfg(test)]
mod tests;
