//! fcsv - filter CSV files with an expression

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use fcsv::config::{Config, DEST_DIR, FILTER_SCRIPT, SOURCE_DIR};
use fcsv::filter::{filter_directory, FilterOptions, DEFAULT_DELIMITER};
use log::{info, warn};
use std::path::PathBuf;

/// Copy the rows of every CSV file in a directory that satisfy an expression
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (source_dir, dest_dir, filter_script, csv_delimiter)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory with the CSV files to filter
    input_dir: Option<PathBuf>,

    /// Directory the filtered files are written to
    output_dir: Option<PathBuf>,

    /// Filter expression, e.g. "price > 10 & name = 'A'"
    expression: Option<String>,

    /// Cell delimiter
    #[arg(short = 't', long)]
    delimiter: Option<char>,

    /// Print the compiled program
    #[arg(long)]
    disassemble: bool,

    /// Skip rows that fail to evaluate instead of aborting the file
    #[arg(long)]
    skip_errors: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // Arguments take precedence over the config file
    let input_dir = args
        .input_dir
        .or_else(|| config.get(SOURCE_DIR).map(PathBuf::from))
        .context("No input directory: pass INPUT_DIR or set source_dir")?;
    let output_dir = args
        .output_dir
        .or_else(|| config.get(DEST_DIR).map(PathBuf::from))
        .context("No output directory: pass OUTPUT_DIR or set dest_dir")?;
    let expression = args
        .expression
        .or_else(|| config.get(FILTER_SCRIPT).map(String::from))
        .context("No expression: pass EXPRESSION or set filter_script")?;

    let options = FilterOptions {
        delimiter: args
            .delimiter
            .or_else(|| config.delimiter())
            .unwrap_or(DEFAULT_DELIMITER),
        skip_errors: args.skip_errors,
        disassemble: args.disassemble,
        ..FilterOptions::default()
    };

    info!(
        "Filtering {} into {} with '{}'",
        input_dir.display(),
        output_dir.display(),
        expression
    );

    let reports = filter_directory(&input_dir, &output_dir, &expression, &options)
        .context("Failed to filter CSV files")?;
    if reports.is_empty() {
        warn!("No CSV files found in {}", input_dir.display());
    }
    for report in &reports {
        println!("{}", report);
    }

    Ok(())
}
