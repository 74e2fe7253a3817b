//! CLI entry point for the evograph simulator.
//!
//! Parses arguments with clap, runs the command, renders its outcome to
//! stdout and maps failures to a non-zero exit code. Logging is installed
//! first so every command emits structured diagnostics.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use evograph_cli::{
    cli::{Cli, CliError, render_outcome, run_cli},
    logging::{self, LoggingError},
};
use tracing::{error, field};

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let outcome = run_cli(cli).context("failed to execute command")?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    render_outcome(&outcome, &mut writer).context("failed to render outcome")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    if let Err(err) = try_main() {
        let code = err
            .downcast_ref::<CliError>()
            .and_then(|cli_error| match cli_error {
                CliError::Core(core) => Some(core.code()),
                _ => None,
            });
        let issue_codes = err
            .downcast_ref::<CliError>()
            .and_then(|cli_error| match cli_error {
                CliError::Core(core) if !core.issues().is_empty() => Some(
                    core.issues()
                        .iter()
                        .map(|issue| issue.code().as_str())
                        .collect::<Vec<_>>()
                        .join(","),
                ),
                _ => None,
            });

        error!(
            error = %err,
            code = code.map(|code| field::display(code.as_str())),
            issues = issue_codes.map(field::display),
            "command execution failed"
        );
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[expect(
    clippy::print_stderr,
    reason = "Emit one-off diagnostic before tracing is initialized"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialize logging: {err}");
}
