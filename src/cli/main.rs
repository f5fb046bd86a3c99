use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use super::commands;
use crate::case_definition::Tier;
use crate::log::{apply_module_filters, set_log_level, LevelFilter, ModuleFilter};
use crate::session::OutbreakSession;

#[derive(Parser)]
#[command(name = "outbreak")]
#[command(about = "Generate synthetic outbreaks and investigate them")]
struct Cli {
    /// Log level for messages written to stderr (off, error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "off")]
    log_level: LevelFilter,

    /// Log level for one module and its submodules, e.g. outbreak_engine::infection=trace
    #[arg(long = "log-module", global = true, value_name = "MODULE=LEVEL")]
    log_modules: Vec<ModuleFilter>,

    #[command(subcommand)]
    command: Commands,
}

/// The scenario to load and the seed to generate it with.
#[derive(Args, Debug)]
pub(super) struct ScenarioArgs {
    /// Directory holding scenario_config.json and the seed CSVs
    #[arg(short = 'd', long)]
    pub scenario_dir: PathBuf,

    /// Random seed
    #[arg(short, long, default_value = "0")]
    pub seed: u64,
}

impl ScenarioArgs {
    pub(super) fn session(&self) -> Result<OutbreakSession> {
        OutbreakSession::from_scenario_dir(&self.scenario_dir, self.seed).with_context(|| {
            format!(
                "could not generate the scenario in {}",
                self.scenario_dir.display()
            )
        })
    }
}

/// How to sample a study from the outbreak and how messy to make the result.
#[derive(Args, Debug)]
pub(super) struct StudyArgs {
    /// Study design JSON file
    #[arg(long)]
    pub design: PathBuf,
    /// Case definition JSON file; the scenario's template is used if omitted
    #[arg(long)]
    pub definition: Option<PathBuf>,
    /// Output CSV file; the dataset goes to stdout if omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Write the sampling report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Skip the missing values and miscoded answers
    #[arg(long)]
    pub clean: bool,
    /// Share of each column left blank
    #[arg(long, default_value = "0.08")]
    pub missing_rate: f64,
    /// Share of each yes/no column answered the wrong way
    #[arg(long, default_value = "0.02")]
    pub error_rate: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an outbreak and write its line list as CSV
    Generate {
        #[command(flatten)]
        scenario: ScenarioArgs,
        /// Output CSV file; the line list goes to stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Add the ground-truth columns
        #[arg(long)]
        include_truth: bool,
        /// Add a classification column using the scenario's case definition
        #[arg(long)]
        classify: bool,
    },
    /// Generate the scenario for a range of seeds and report data-quality issues
    Batch {
        /// Directory holding scenario_config.json and the seed CSVs
        #[arg(short = 'd', long)]
        scenario_dir: PathBuf,
        /// Number of runs
        #[arg(short, long, default_value = "100")]
        runs: usize,
        /// Seed of the first run; later runs use the following seeds
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Output .json or .csv file; the JSON report goes to stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Order a lab test for one person and print the result as JSON
    Lab {
        #[command(flatten)]
        scenario: ScenarioArgs,
        /// Person id
        #[arg(short, long)]
        person: String,
        /// Test code or alias
        #[arg(short, long)]
        test: String,
        /// Days since symptom onset
        #[arg(long, allow_hyphen_values = true)]
        day: i32,
    },
    /// Classify the line list against a case definition and summarize how well it performs
    Classify {
        #[command(flatten)]
        scenario: ScenarioArgs,
        /// Case definition JSON file; the scenario's template is used if omitted
        #[arg(long)]
        definition: Option<PathBuf>,
        /// Lowest tier counted as a case
        #[arg(long, default_value = "suspected")]
        threshold: Tier,
    },
    /// Sample a study dataset from the line list and write it as CSV
    Study {
        #[command(flatten)]
        scenario: ScenarioArgs,
        #[command(flatten)]
        study: StudyArgs,
    },
}

/// Parses the process arguments and runs the command.
///
/// # Errors
///
/// Returns any error raised while loading, generating or writing.
pub fn main() -> Result<()> {
    dispatch(Cli::parse())
}

/// Runs the command line in `args`, whose first item is the program name.
///
/// # Errors
///
/// Returns an argument parsing error or any error raised by the command.
pub fn run_from<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    dispatch(Cli::try_parse_from(args)?)
}

fn dispatch(cli: Cli) -> Result<()> {
    set_log_level(cli.log_level);
    apply_module_filters(&cli.log_modules);

    match cli.command {
        Commands::Generate {
            scenario,
            output,
            include_truth,
            classify,
        } => commands::generate(&scenario, output.as_deref(), include_truth, classify),
        Commands::Batch {
            scenario_dir,
            runs,
            seed,
            output,
        } => commands::batch(&scenario_dir, runs, seed, output.as_deref()),
        Commands::Lab {
            scenario,
            person,
            test,
            day,
        } => commands::lab(&scenario, &person, &test, day),
        Commands::Classify {
            scenario,
            definition,
            threshold,
        } => commands::classify(&scenario, definition.as_deref(), threshold),
        Commands::Study { scenario, study } => commands::study(&scenario, &study),
    }
}
