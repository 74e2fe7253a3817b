//! Unit tests for the CLI commands.

use super::commands::{rows_command, run_command};
use super::{
    Cli, CliError, Command, Outcome, PopulationLine, RowsCommand, RunCommand, RunSummary,
    ValidateCommand, load_scenario, render_outcome, run_cli,
};

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use evograph_core::PopulationKind;
use evograph_test_support::tracing::capture;
use rstest::rstest;
use serde_json::Value;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const FOLLOWS: &str = r#"{
    "seed": 5,
    "iterations": 2,
    "vertices": [{ "name": "users", "count": 3 }],
    "edges": [{ "name": "follows", "source": "users", "target": "users", "count_all": 3 }]
}"#;

fn run(scenario: PathBuf, output: Option<PathBuf>, seed: Option<u64>) -> RunCommand {
    RunCommand {
        scenario,
        output,
        seed,
        sequential: false,
    }
}

#[rstest]
fn run_reports_every_population() -> TestResult {
    let dir = temp_dir();
    let path = create_scenario(&dir, "follows.json", FOLLOWS)?;
    let Outcome::Run(summary) = run_cli(Cli {
        command: Command::Run(run(path, None, None)),
    })?
    else {
        panic!("run must produce a run summary");
    };

    assert_eq!(summary.seed, 5);
    assert_eq!(summary.iterations, 2);
    assert_eq!(
        summary.populations,
        vec![
            PopulationLine {
                name: "users".into(),
                kind: PopulationKind::Vertex,
                active: 3,
                removed: 0,
            },
            PopulationLine {
                name: "follows".into(),
                kind: PopulationKind::Edge,
                active: 3,
                removed: 0,
            },
        ]
    );
    assert!(summary.written.is_empty());
    Ok(())
}

#[rstest]
#[case::sequential(true)]
#[case::parallel(false)]
fn run_writes_one_artifact_per_population(#[case] sequential: bool) -> TestResult {
    let dir = temp_dir();
    let path = create_scenario(&dir, "follows.json", FOLLOWS)?;
    let out = dir.path().join("out");
    let summary = run_command(RunCommand {
        sequential,
        ..run(path, Some(out.clone()), None)
    })?;

    assert_eq!(
        summary.written,
        vec![out.join("users.json"), out.join("follows.json")]
    );
    let users: Value = serde_json::from_reader(File::open(out.join("users.json"))?)?;
    assert_eq!(users["kind"], "vertex");
    assert_eq!(users["count"], 3);
    let follows: Value = serde_json::from_reader(File::open(out.join("follows.json"))?)?;
    assert_eq!(follows["kind"], "edge");
    assert_eq!(follows["source"], "users");
    Ok(())
}

#[rstest]
fn seed_override_wins() -> TestResult {
    let dir = temp_dir();
    let path = create_scenario(&dir, "follows.json", FOLLOWS)?;
    let summary = run_command(run(path, None, Some(11)))?;
    assert_eq!(summary.seed, 11);
    Ok(())
}

#[rstest]
fn validate_counts_populations() -> TestResult {
    let dir = temp_dir();
    let path = create_scenario(&dir, "follows.json", FOLLOWS)?;
    let outcome = run_cli(Cli {
        command: Command::Validate(ValidateCommand { scenario: path }),
    })?;
    assert_eq!(
        outcome,
        Outcome::Valid {
            vertices: 1,
            edges: 1
        }
    );
    Ok(())
}

#[rstest]
fn validate_reports_core_codes() -> TestResult {
    let dir = temp_dir();
    let path = create_scenario(
        &dir,
        "empty.json",
        r#"{ "iterations": 0, "vertices": [{ "name": "users", "count": 0 }] }"#,
    )?;
    let err = run_cli_expecting_error(
        Cli {
            command: Command::Validate(ValidateCommand { scenario: path }),
        },
        "scenario must be rejected",
    );
    let CliError::Core(core) = err else {
        panic!("expected a core error, got {err:?}");
    };
    assert_eq!(core.code().as_str(), "SIMULATION_CONFIG_INVALID");
    assert_eq!(core.issues().len(), 2);
    Ok(())
}

#[rstest]
fn rows_lists_vertex_additions() -> TestResult {
    let dir = temp_dir();
    let path = create_scenario(&dir, "follows.json", FOLLOWS)?;
    let rows = rows_command(RowsCommand {
        scenario: path,
        population: "users".into(),
        seed: None,
    })?;
    let rendered: Vec<_> = rows.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["0\ta\t0", "0\ta\t1", "0\ta\t2"]);
    Ok(())
}

#[rstest]
fn rows_rejects_unknown_populations() -> TestResult {
    let dir = temp_dir();
    let path = create_scenario(&dir, "follows.json", FOLLOWS)?;
    let err = run_cli_expecting_error(
        Cli {
            command: Command::Rows(RowsCommand {
                scenario: path,
                population: "posts".into(),
                seed: None,
            }),
        },
        "posts is not declared",
    );
    assert!(matches!(err, CliError::UnknownPopulation { name } if name == "posts"));
    Ok(())
}

#[rstest]
fn missing_scenarios_report_the_path() {
    let dir = temp_dir();
    let path = dir.path().join("absent.json");
    let err = load_scenario(&path).expect_err("file does not exist");
    match err {
        CliError::Io { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[rstest]
#[case::not_json("iterations: 3")]
#[case::unknown_field(r#"{ "iterations": 1, "vertex": [] }"#)]
#[case::missing_iterations(r#"{ "vertices": [] }"#)]
fn malformed_scenarios_fail_to_parse(#[case] contents: &str) -> TestResult {
    let dir = temp_dir();
    let path = create_scenario(&dir, "broken.json", contents)?;
    let err = load_scenario(&path).expect_err("scenario is malformed");
    assert!(matches!(err, CliError::Parse { .. }));
    Ok(())
}

#[rstest]
fn artifacts_need_a_writable_directory() -> TestResult {
    let dir = temp_dir();
    let path = create_scenario(&dir, "follows.json", FOLLOWS)?;
    let blocker = create_scenario(&dir, "out", "")?;
    let err = run_cli_expecting_error(
        Cli {
            command: Command::Run(run(path, Some(blocker.clone()), None)),
        },
        "output path is a file",
    );
    assert!(matches!(err, CliError::Io { path, .. } if path == blocker));
    Ok(())
}

#[rstest]
fn clap_parses_run_options() -> TestResult {
    let cli = Cli::try_parse_from([
        "evograph",
        "run",
        "scenario.json",
        "--seed",
        "9",
        "--sequential",
        "-o",
        "out",
    ])?;
    let Command::Run(command) = cli.command else {
        panic!("expected the run command");
    };
    assert_eq!(command.scenario, PathBuf::from("scenario.json"));
    assert_eq!(command.seed, Some(9));
    assert!(command.sequential);
    assert_eq!(command.output, Some(PathBuf::from("out")));
    Ok(())
}

#[rstest]
#[case::rows_without_population(&["evograph", "rows", "scenario.json"])]
#[case::negative_seed(&["evograph", "run", "scenario.json", "--seed", "-1"])]
#[case::unknown_command(&["evograph", "simulate", "scenario.json"])]
fn clap_rejects_bad_arguments(#[case] args: &[&str]) {
    assert!(Cli::try_parse_from(args).is_err());
}

#[rstest]
fn render_outcome_summarises_runs() -> TestResult {
    let summary = RunSummary {
        seed: 3,
        iterations: 4,
        populations: vec![PopulationLine {
            name: "users".into(),
            kind: PopulationKind::Vertex,
            active: 7,
            removed: 2,
        }],
        warnings: vec!["something drifted".into()],
        written: vec![PathBuf::from("out/users.json")],
    };
    let mut buffer = Vec::new();
    render_outcome(&Outcome::Run(summary), &mut buffer)?;
    assert_eq!(
        String::from_utf8(buffer)?,
        "seed: 3\niterations: 4\nvertex\tusers\tactive=7\tremoved=2\n\
         warning: something drifted\nwrote out/users.json\n"
    );
    Ok(())
}

#[rstest]
fn run_cli_records_command_and_seed() -> TestResult {
    let dir = temp_dir();
    let path = create_scenario(&dir, "follows.json", FOLLOWS)?;
    let (outcome, layer) = capture(|| {
        run_cli(Cli {
            command: Command::Run(run(path, None, Some(11))),
        })
    });
    assert!(matches!(outcome?, Outcome::Run(_)));

    let run_span = layer.span("cli.run").expect("cli.run span must exist");
    assert_eq!(run_span.field("command"), Some("run"));
    let execute = layer
        .span("cli.execute")
        .expect("cli.execute span must exist");
    assert_eq!(execute.field("seed"), Some("11"));
    assert!(layer.span("engine.run").is_some());
    Ok(())
}

fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => panic!("failed to create temp dir: {err}"),
    }
}

fn create_scenario(dir: &TempDir, name: &str, contents: &str) -> io::Result<PathBuf> {
    let path = dir.path().join(name);
    let mut file = File::create(&path)?;
    file.write_all(contents.as_bytes())?;
    Ok(path)
}

fn run_cli_expecting_error(cli: Cli, panic_msg: &str) -> CliError {
    match run_cli(cli) {
        Ok(_) => panic!("{panic_msg}"),
        Err(err) => err,
    }
}

#[rstest]
fn written_artifacts_overwrite_previous_runs() -> TestResult {
    let dir = temp_dir();
    let path = create_scenario(&dir, "follows.json", FOLLOWS)?;
    let out = dir.path().join("out");
    fs::create_dir_all(&out)?;
    fs::write(out.join("users.json"), "stale")?;
    run_command(run(path, Some(out.clone()), None))?;
    let users: Value = serde_json::from_str(&fs::read_to_string(out.join("users.json"))?)?;
    assert_eq!(users["name"], "users");
    Ok(())
}
