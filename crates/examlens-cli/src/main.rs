//! examlens CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "examlens",
    version,
    about = "Exam mark analysis: statistics, rankings, consolidation and progress"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one subject's marks
    Analyze {
        /// CSV sheet, or a .txt file of extracted text
        #[arg(long, conflicts_with = "marks")]
        input: Option<PathBuf>,

        /// Marks typed in directly (e.g. "45, 60 72.5")
        #[arg(long)]
        marks: Option<String>,

        /// Score column to analyze (default: score/marks/points or the first numeric column)
        #[arg(long)]
        column: Option<String>,

        /// Maximum marks (overrides config)
        #[arg(long)]
        max_marks: Option<f64>,

        /// Pass threshold in percent (overrides config)
        #[arg(long)]
        pass_threshold: Option<f64>,

        /// Output format: text, json, markdown, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Merge subject sheets into one exam
    Consolidate {
        /// Subject sheet as SUBJECT=FILE (repeatable)
        #[arg(long = "sheet")]
        sheets: Vec<String>,

        /// CSV with one column per subject (repeatable)
        #[arg(long)]
        wide: Vec<PathBuf>,

        /// Directory of CSV files, one subject per file
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Exam name
        #[arg(long, default_value = "Exam")]
        exam: String,

        /// Exam date (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Name similarity threshold (overrides config)
        #[arg(long)]
        threshold: Option<f64>,

        /// Maximum marks per subject (overrides config)
        #[arg(long)]
        max_marks: Option<f64>,

        /// Store the consolidated exam for later comparison
        #[arg(long)]
        save: bool,

        /// Output format: text, json, markdown, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Compare two stored exams
    Compare {
        /// Name of the more recent exam
        #[arg(long)]
        current: String,

        /// Name of the earlier exam
        #[arg(long)]
        previous: String,

        /// Output format: text, json, markdown, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List stored exams
    Exams {
        /// Delete the named exam instead of listing
        #[arg(long)]
        remove: Option<String>,
    },

    /// Show how a sheet will be read
    Validate {
        /// CSV sheet
        #[arg(long)]
        input: PathBuf,
    },

    /// Create a starter config
    Init,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("examlens=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Analyze {
            input,
            marks,
            column,
            max_marks,
            pass_threshold,
            format,
            output,
        } => commands::analyze::execute(commands::analyze::AnalyzeArgs {
            input,
            marks,
            column,
            max_marks,
            pass_threshold,
            format,
            output,
            config,
        }),
        Commands::Consolidate {
            sheets,
            wide,
            dir,
            exam,
            date,
            threshold,
            max_marks,
            save,
            format,
            output,
        } => commands::consolidate::execute(commands::consolidate::ConsolidateArgs {
            sheets,
            wide,
            dir,
            exam,
            date,
            threshold,
            max_marks,
            save,
            format,
            output,
            config,
        }),
        Commands::Compare {
            current,
            previous,
            format,
            output,
        } => commands::compare::execute(current, previous, format, output, config),
        Commands::Exams { remove } => commands::exams::execute(remove, config),
        Commands::Validate { input } => commands::validate::execute(input),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
