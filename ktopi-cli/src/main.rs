//! ktopi command-line interface.
//!
//! Runs the K/pi yield analysis and inspects its inputs and outputs.
#![allow(clippy::uninlined_format_args)]

use clap::{Parser, Subcommand};
use ktopi_analysis::{AnalysisConfig, Pipeline};
use ktopi_core::{EventRecord, Shape};
use ktopi_io::{missing_columns, open_store, read_histograms, EventReader};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    KtopiIo(#[from] ktopi_io::Error),

    #[error("{0}")]
    Analysis(#[from] ktopi_analysis::Error),
}

/// K/pi yield analysis versus tagged charged multiplicity.
#[derive(Parser)]
#[command(name = "ktopi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analysis
    Run {
        /// Parameters as Key=Value (Input, Output, Tree, MaxNchTag, NchTagBins,
        /// MaxEvents, EcmRef, MinNch, MinThetaDeg, MaxThetaDeg, IsGen)
        params: Vec<String>,

        /// File of Key=Value lines, overridden by command-line parameters
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the tables of an input store and whether they bind
    Info {
        /// Input store (.json, .h5)
        input: PathBuf,

        /// Only show this table
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Print the declared column schema
    Schema,

    /// Print the histograms of an output file
    Show {
        /// Output file written by `run`
        output: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            params,
            config,
            verbose,
        } => {
            init_logging(verbose);

            let mut settings = AnalysisConfig::default();
            if let Some(path) = &config {
                settings.apply_file(path)?;
            }
            settings.apply_pairs(&params)?;
            settings.validate()?;

            log::info!("Input       = {}", settings.input.display());
            log::info!("Output      = {}", settings.output.display());
            log::info!("Tree        = {}", settings.tree);
            log::info!("MaxNchTag   = {}", settings.max_nch_tag);
            log::info!("NchTagBins  = {}", settings.n_bins());
            log::info!("MaxEvents   = {}", settings.max_events);
            log::info!("EcmRef      = {}", settings.ecm_ref);
            log::info!("MinNch      = {}", settings.min_nch);
            log::info!("MinThetaDeg = {}", settings.min_theta_deg);
            log::info!("MaxThetaDeg = {}", settings.max_theta_deg);
            log::info!("IsGen       = {}", settings.is_gen);

            let report = Pipeline::new(settings).run()?;

            println!("Entries: {}", report.entries);
            println!("Processed: {}", report.cut_flow.processed);
            println!("Selected: {}", report.cut_flow.selected);
            println!(
                "Diagnostics: {} (+{} only logged)",
                report.diagnostics.len(),
                report.cut_flow.suppressed_diagnostics
            );
            if let Some(matrix) = report.response {
                println!(
                    "PID response: KAsK={:.4} PiAsK={:.4} KAsPi={:.4} PiAsPi={:.4}",
                    matrix.k_as_k, matrix.pi_as_k, matrix.k_as_pi, matrix.pi_as_pi
                );
            }
            println!("Output: {}", report.output.display());
        }

        Commands::Info { input, table } => {
            init_logging(false);
            let store = open_store(&input)?;
            let names = match table {
                Some(name) => vec![name],
                None => store.table_names()?,
            };

            println!("File: {}", input.display());
            println!("Tables: {}", names.len());
            for name in names {
                let source = store.open_table(&name)?;
                let columns = source.column_names()?;
                let missing = missing_columns(source.as_ref(), EventRecord::schema())?;
                println!("  {}: {} columns", name, columns.len());
                if missing.is_empty() {
                    let reader = EventReader::bind(source.as_ref())?;
                    println!("    entries: {}", reader.entry_count());
                } else {
                    println!("    missing: {}", missing.join(", "));
                }
            }
        }

        Commands::Schema => {
            for spec in EventRecord::schema() {
                let shape = match spec.shape {
                    Shape::Scalar => "scalar".to_string(),
                    Shape::Array(collection) => {
                        format!("[{}; {}]", collection.count_column(), collection.capacity())
                    }
                };
                println!("{:<24} {:<4} {}", spec.name, spec.kind, shape);
            }
        }

        Commands::Show { output } => {
            for histogram in read_histograms(&output)? {
                println!(
                    "{} \"{}\" ({} bins, entries {})",
                    histogram.name(),
                    histogram.title(),
                    histogram.n_bins(),
                    histogram.entries()
                );
                for bin in 0..histogram.n_bins() {
                    let content = histogram.bin_content(bin);
                    if content != 0.0 {
                        println!(
                            "  {:>6.1}  {:>12.4} +- {:.4}",
                            histogram.bin_center(bin),
                            content,
                            histogram.bin_error(bin)
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
