use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, Table};
use dasein_tests::config::{self, Config};
use dasein_tests::exit_codes::{self, codes};
use dasein_tests::suite::{self, Outcome, RunReport, SuiteRunner};
use dasein_tests::utils::format_elapsed;
use dasein_tests::{providers, suites, DaseinError, TestContext};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dasein-tests")]
#[command(
    about = "Conformance suites for Dasein Cloud providers",
    long_about = "dasein-tests runs the registered conformance suites against a cloud provider.\n\nIt provisions the resources each test needs, shares them across suites\nby label, and tears everything it created down in dependency order\nwhen the run ends."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    output: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the registered suites
    Run {
        /// Comma-separated suites or suite.test names to run
        #[arg(long)]
        include: Option<String>,
        /// Comma-separated suites or suite.test names to skip
        #[arg(long)]
        exclude: Option<String>,
    },
    /// List every registered test and whether it would run
    List,
    /// Initialize a configuration file
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = config::LOCAL_CONFIG)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Only warnings and errors unless asked otherwise; RUST_LOG wins
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if cli.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            match e.downcast_ref::<DaseinError>() {
                Some(err) => exit_codes::exit_code_for_error(err),
                None => codes::CONFIG_ERROR,
            }
        }
    };
    std::process::exit(code);
}

async fn execute(cli: Cli) -> Result<i32> {
    if let Commands::Init { output } = &cli.command {
        config::init_config(output)?;
        return Ok(codes::SUCCESS);
    }

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env();

    match cli.command {
        Commands::Run { include, exclude } => {
            if include.is_some() {
                config.filters.inclusions = include;
            }
            if exclude.is_some() {
                config.filters.exclusions = exclude;
            }

            let factory = providers::builtin_factory(&config.provider.name)?;
            let ctx = Arc::new(TestContext::init(&config, factory).await?);
            let report = SuiteRunner::new(ctx).run(suites::SUITES).await;

            if cli.output == "json" {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(exit_codes::exit_code_for_run(report.success()))
        }
        Commands::List => {
            let plan = suite::plan(suites::SUITES, &config.skip_filter());
            if cli.output == "json" {
                let entries: Vec<_> = plan
                    .iter()
                    .map(|(suite, test, selected)| {
                        serde_json::json!({ "suite": suite, "test": test, "selected": selected })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                let mut table = Table::new();
                table.set_header(vec!["Suite", "Test", "Selected"]);
                for (suite, test, selected) in plan {
                    let cell = if selected {
                        Cell::new("yes").fg(Color::Green)
                    } else {
                        Cell::new("no").fg(Color::DarkGrey)
                    };
                    table.add_row(vec![Cell::new(suite), Cell::new(test), cell]);
                }
                println!("{}", table);
            }
            Ok(codes::SUCCESS)
        }
        Commands::Init { .. } => Ok(codes::SUCCESS),
    }
}

fn print_report(report: &RunReport) {
    let mut table = Table::new();
    table.set_header(vec!["Suite", "Test", "Status", "Time", "Detail"]);

    for result in report
        .results
        .iter()
        .filter(|r| r.outcome != Outcome::Filtered)
    {
        let (color, detail) = match &result.outcome {
            Outcome::Passed => (Color::Green, ""),
            Outcome::Skipped(reason) => (Color::Yellow, reason.as_str()),
            Outcome::Failed(reason) => (Color::Red, reason.as_str()),
            Outcome::Filtered => (Color::DarkGrey, ""),
        };
        table.add_row(vec![
            Cell::new(&result.suite),
            Cell::new(&result.test),
            Cell::new(result.outcome.label()).fg(color),
            Cell::new(format_elapsed(result.duration)),
            Cell::new(detail),
        ]);
    }

    println!("{}", table);
    println!(
        "\n{} suites: {} passed, {} failed, {} skipped, {} filtered",
        report.suites, report.passed, report.failed, report.skipped, report.filtered
    );

    let teardown = &report.teardown;
    println!(
        "Teardown: {} deleted, {} already gone",
        teardown.deleted.len(),
        teardown.already_gone.len()
    );
    for (released, reason) in &teardown.failed {
        println!(
            "  WARNING: could not delete {} {} ({}): {}",
            released.kind, released.id, released.label, reason
        );
    }
    for released in &teardown.unsettled {
        println!(
            "  WARNING: {} {} still present after delete",
            released.kind, released.id
        );
    }
}
