//! Command implementations and argument parsing for the evograph CLI.

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use clap::{Args, Parser, Subcommand};
use evograph_core::{
    DiffRow, ExecutionStrategy, PopulationKind, ProviderRegistry, ScenarioConfig,
    SimulationBuilder, SimulationError, SimulationOutput, validate,
};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(name = "evograph", about = "Simulate evolving synthetic graphs.")]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a scenario and write one JSON artifact per population.
    Run(RunCommand),
    /// Check a scenario without running it.
    Validate(ValidateCommand),
    /// Run a scenario and print the diff rows of one population.
    Rows(RowsCommand),
}

/// Options accepted by the `run` command.
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the JSON scenario.
    pub scenario: PathBuf,

    /// Directory receiving `<population>.json` artifacts.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Override the scenario seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Advance edge populations one after the other.
    #[arg(long)]
    pub sequential: bool,
}

/// Options accepted by the `validate` command.
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the JSON scenario.
    pub scenario: PathBuf,
}

/// Options accepted by the `rows` command.
#[derive(Debug, Args, Clone)]
pub struct RowsCommand {
    /// Path to the JSON scenario.
    pub scenario: PathBuf,

    /// Population whose rows to print.
    #[arg(long, short)]
    pub population: String,

    /// Override the scenario seed.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading the scenario or writing an artifact failed.
    #[error("failed to access `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The scenario is not valid JSON for the scenario model.
    #[error("failed to parse scenario `{path}`: {source}")]
    Parse {
        /// Scenario path.
        path: PathBuf,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
    /// Serialising an artifact failed.
    #[error("failed to write artifact `{path}`: {source}")]
    Artifact {
        /// Artifact path.
        path: PathBuf,
        /// Underlying serialisation failure.
        #[source]
        source: serde_json::Error,
    },
    /// The requested population is not declared by the scenario.
    #[error("population `{name}` is not declared by the scenario")]
    UnknownPopulation {
        /// The requested name.
        name: String,
    },
    /// Validation or simulation failed.
    #[error(transparent)]
    Core(#[from] SimulationError),
}

/// One population in a run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationLine {
    /// Population name.
    pub name: String,
    /// Vertex or edge population.
    pub kind: PopulationKind,
    /// Entities active after the last iteration.
    pub active: usize,
    /// Entities removed during the run.
    pub removed: usize,
}

/// Outcome of the `run` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Seed the run used.
    pub seed: u64,
    /// Iterations simulated.
    pub iterations: usize,
    /// Populations in declaration order, vertices first.
    pub populations: Vec<PopulationLine>,
    /// Rendered warnings.
    pub warnings: Vec<String>,
    /// Artifacts written, in population order.
    pub written: Vec<PathBuf>,
}

impl RunSummary {
    fn from_output(output: &SimulationOutput, written: Vec<PathBuf>) -> Self {
        let vertices = output.vertices.iter().map(|vertex| PopulationLine {
            name: vertex.name.clone(),
            kind: PopulationKind::Vertex,
            active: vertex.active.len(),
            removed: vertex.removed.len(),
        });
        let edges = output.edges.iter().map(|edge| PopulationLine {
            name: edge.name.clone(),
            kind: PopulationKind::Edge,
            active: edge.edge_count(),
            removed: edge.removed.values().map(Vec::len).sum(),
        });
        Self {
            seed: output.seed,
            iterations: output.iterations,
            populations: vertices.chain(edges).collect(),
            warnings: output.warnings.iter().map(ToString::to_string).collect(),
            written,
        }
    }
}

/// What a command produced, ready for [`render_outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Summary of a completed run.
    Run(RunSummary),
    /// The scenario passed validation.
    Valid {
        /// Vertex populations declared.
        vertices: usize,
        /// Edge populations declared.
        edges: usize,
    },
    /// Diff rows of one population.
    Rows(Vec<DiffRow>),
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when loading, validation, simulation or writing
/// fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use evograph_cli::cli::{Cli, Command, Outcome, ValidateCommand, run_cli};
/// # use tempfile::NamedTempFile;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let file = NamedTempFile::new()?;
/// std::fs::write(
///     file.path(),
///     r#"{ "iterations": 2, "vertices": [{ "name": "users", "count": 4 }] }"#,
/// )?;
/// let cli = Cli {
///     command: Command::Validate(ValidateCommand {
///         scenario: file.path().to_path_buf(),
///     }),
/// };
/// assert_eq!(run_cli(cli)?, Outcome::Valid { vertices: 1, edges: 0 });
/// # Ok(())
/// # }
/// ```
#[instrument(
    name = "cli.run",
    err,
    skip(cli),
    fields(command = field::Empty),
)]
pub fn run_cli(cli: Cli) -> Result<Outcome, CliError> {
    let span = Span::current();
    match cli.command {
        Command::Run(run) => {
            span.record("command", field::display("run"));
            run_command(run).map(Outcome::Run)
        }
        Command::Validate(check) => {
            span.record("command", field::display("validate"));
            validate_command(&check)
        }
        Command::Rows(rows) => {
            span.record("command", field::display("rows"));
            rows_command(rows).map(Outcome::Rows)
        }
    }
}

#[instrument(
    name = "cli.execute",
    err,
    skip(command),
    fields(scenario = %command.scenario.display(), seed = field::Empty),
)]
pub(super) fn run_command(command: RunCommand) -> Result<RunSummary, CliError> {
    let RunCommand {
        scenario,
        output,
        seed,
        sequential,
    } = command;
    let strategy = if sequential {
        ExecutionStrategy::Sequential
    } else {
        ExecutionStrategy::Parallel
    };
    let result = simulate(&scenario, seed, strategy)?;
    Span::current().record("seed", result.seed);

    let written = match output {
        Some(dir) => write_artifacts(&result, &dir)?,
        None => Vec::new(),
    };
    let summary = RunSummary::from_output(&result, written);
    info!(
        seed = summary.seed,
        iterations = summary.iterations,
        populations = summary.populations.len(),
        warnings = summary.warnings.len(),
        artifacts = summary.written.len(),
        "command completed"
    );
    Ok(summary)
}

fn validate_command(command: &ValidateCommand) -> Result<Outcome, CliError> {
    let config = load_scenario(&command.scenario)?;
    validate(&config, &ProviderRegistry::with_builtins())?;
    info!(scenario = %command.scenario.display(), "scenario is valid");
    Ok(Outcome::Valid {
        vertices: config.vertices.len(),
        edges: config.edges.len(),
    })
}

#[instrument(
    name = "cli.rows",
    err,
    skip(command),
    fields(population = %command.population),
)]
pub(super) fn rows_command(command: RowsCommand) -> Result<Vec<DiffRow>, CliError> {
    let output = simulate(&command.scenario, command.seed, ExecutionStrategy::default())?;
    let artifact = output
        .artifact(&command.population)
        .ok_or_else(|| CliError::UnknownPopulation {
            name: command.population.clone(),
        })?;
    Ok(artifact.rows().collect())
}

fn simulate(
    scenario: &Path,
    seed: Option<u64>,
    strategy: ExecutionStrategy,
) -> Result<SimulationOutput, CliError> {
    let config = load_scenario(scenario)?;
    let builder = SimulationBuilder::new(config).with_execution_strategy(strategy);
    let builder = match seed {
        Some(seed) => builder.with_seed(seed),
        None => builder,
    };
    Ok(builder.build()?.run()?)
}

/// Reads a JSON scenario from `path`.
///
/// # Errors
/// Returns [`CliError::Io`] when the file cannot be opened and
/// [`CliError::Parse`] when it does not describe a scenario.
#[instrument(name = "cli.load_scenario", err, skip(path), fields(path = %path.display()))]
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig, CliError> {
    let file = File::open(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[instrument(
    name = "cli.write_artifacts",
    err,
    skip(output, dir),
    fields(dir = %dir.display()),
)]
pub(super) fn write_artifacts(
    output: &SimulationOutput,
    dir: &Path,
) -> Result<Vec<PathBuf>, CliError> {
    fs::create_dir_all(dir).map_err(|source| CliError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut written = Vec::new();
    for artifact in output.artifacts() {
        let path = dir.join(format!("{}.json", artifact.name()));
        let io_error = |source| CliError::Io {
            path: path.clone(),
            source,
        };
        let mut writer = BufWriter::new(File::create(&path).map_err(io_error)?);
        serde_json::to_writer_pretty(&mut writer, &artifact).map_err(|source| {
            CliError::Artifact {
                path: path.clone(),
                source,
            }
        })?;
        writer.flush().map_err(io_error)?;
        written.push(path);
    }
    Ok(written)
}

/// Renders `outcome` to `writer`: a summary for `run`, a confirmation for
/// `validate` and tab-separated rows for `rows`.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use std::io::Cursor;
/// # use evograph_cli::cli::{Outcome, render_outcome};
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let mut buffer = Cursor::new(Vec::new());
/// render_outcome(&Outcome::Valid { vertices: 2, edges: 1 }, &mut buffer)?;
/// assert_eq!(String::from_utf8(buffer.into_inner())?, "valid: 2 vertex and 1 edge populations\n");
/// # Ok(())
/// # }
/// ```
pub fn render_outcome(outcome: &Outcome, mut writer: impl Write) -> io::Result<()> {
    match outcome {
        Outcome::Run(summary) => {
            writeln!(writer, "seed: {}", summary.seed)?;
            writeln!(writer, "iterations: {}", summary.iterations)?;
            for line in &summary.populations {
                writeln!(
                    writer,
                    "{}\t{}\tactive={}\tremoved={}",
                    line.kind.as_str(),
                    line.name,
                    line.active,
                    line.removed
                )?;
            }
            for warning in &summary.warnings {
                writeln!(writer, "warning: {warning}")?;
            }
            for path in &summary.written {
                writeln!(writer, "wrote {}", path.display())?;
            }
        }
        Outcome::Valid { vertices, edges } => {
            writeln!(writer, "valid: {vertices} vertex and {edges} edge populations")?;
        }
        Outcome::Rows(rows) => {
            for row in rows {
                writeln!(writer, "{row}")?;
            }
        }
    }
    Ok(())
}
