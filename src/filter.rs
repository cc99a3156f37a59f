//! CSV row filtering.
//!
//! The header line names the variables, the first data row fixes their
//! types, and the expression is compiled once against that layout. Every
//! following row is rebound in place and evaluated; rows whose result is
//! truthy are copied to the output unchanged. When a cell stops parsing as
//! its column's type the column is re-typed and the expression recompiled;
//! the column returns to its first-row type once its cells parse as it again.

use crate::bytecode::Program;
use crate::compiler::{compile_with, CompileOptions};
use crate::interpreter::Interpreter;
use crate::row::VariableTable;
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str;

pub const DEFAULT_DELIMITER: char = ',';

#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub delimiter: char,
    /// Skip rows that fail to evaluate instead of aborting the file
    pub skip_errors: bool,
    /// Print every compiled program to stdout
    pub disassemble: bool,
    pub compile: CompileOptions,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            skip_errors: false,
            disassemble: false,
            compile: CompileOptions::default(),
        }
    }
}

/// Line counts for one input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// Data rows read, header excluded
    pub total: usize,
    pub written: usize,
    pub skipped: usize,
}

impl FilterStats {
    pub fn percent_written(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.written as f64 * 100.0 / self.total as f64
    }
}

/// Outcome of filtering one file
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub stats: FilterStats,
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Written {}: {} of {} lines written ({:.1}%)",
            self.output.display(),
            self.stats.written,
            self.stats.total,
            self.stats.percent_written()
        )
    }
}

/// Split a line into trimmed cells. The line terminator is not part of the
/// last cell. No quoting rules apply.
pub fn split_cells(line: &str, delimiter: char) -> Vec<&str> {
    line.trim_end_matches(|c| c == '\r' || c == '\n')
        .split(delimiter)
        .map(str::trim)
        .collect()
}

/// Filter CSV text from `reader` into `writer`
pub fn filter_rows<R: BufRead, W: Write>(
    mut reader: R,
    mut writer: W,
    expression: &str,
    options: &FilterOptions,
) -> Result<FilterStats> {
    let mut stats = FilterStats::default();
    let mut line = Vec::new();

    if reader
        .read_until(b'\n', &mut line)
        .context("Failed to read header line")?
        == 0
    {
        return Ok(stats);
    }
    writer
        .write_all(&line)
        .context("Failed to write header line")?;

    let header = str::from_utf8(&line).context("Header line is not valid UTF-8")?;
    let mut variables =
        VariableTable::with_names(split_cells(header, options.delimiter).into_iter().map(String::from));
    let columns = variables.len();

    let mut interpreter = Interpreter::new();
    let mut program: Option<Program> = None;
    let mut compiled_once = false;
    let mut line_number = 1;

    loop {
        line.clear();
        if reader
            .read_until(b'\n', &mut line)
            .context("Failed to read line")?
            == 0
        {
            break;
        }
        line_number += 1;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        stats.total += 1;

        let text = match str::from_utf8(&line) {
            Ok(text) => text,
            Err(err) if options.skip_errors => {
                warn!("Skipping line {}: {}", line_number, err);
                stats.skipped += 1;
                continue;
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Line {} is not valid UTF-8", line_number))
            }
        };
        let cells = split_cells(text, options.delimiter);
        if cells.len() != columns {
            warn!(
                "Skipping line {}: {} cells, header has {}",
                line_number,
                cells.len(),
                columns
            );
            stats.skipped += 1;
            continue;
        }

        let retyped = variables.bind_row(&cells);
        if retyped && compiled_once {
            debug!("Column types changed at line {}, recompiling", line_number);
        }

        let compiled = match &mut program {
            Some(compiled) if !retyped => compiled,
            slot => match compile_with(expression, &variables, &options.compile) {
                Ok(compiled) => {
                    if options.disassemble {
                        print!("{}", compiled.disassemble(Some(&variables)));
                    }
                    compiled_once = true;
                    slot.insert(compiled)
                }
                Err(err) if compiled_once && options.skip_errors => {
                    warn!("Skipping line {}: {}", line_number, err);
                    *slot = None;
                    stats.skipped += 1;
                    continue;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!(
                            "Failed to compile '{}' for line {}",
                            expression, line_number
                        )
                    })
                }
            },
        };

        match interpreter.evaluate_predicate(compiled, &variables) {
            Ok(true) => {
                writer
                    .write_all(&line)
                    .context("Failed to write line")?;
                stats.written += 1;
            }
            Ok(false) => {}
            Err(err) if options.skip_errors => {
                warn!("Skipping line {}: {}", line_number, err);
                stats.skipped += 1;
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to evaluate line {}", line_number))
            }
        }
    }

    writer.flush().context("Failed to flush output")?;
    Ok(stats)
}

/// Filter one CSV file into `output`, replacing it if it exists
pub fn filter_file(
    input: &Path,
    output: &Path,
    expression: &str,
    options: &FilterOptions,
) -> Result<FilterStats> {
    let reader = BufReader::new(
        File::open(input).with_context(|| format!("Failed to open {}", input.display()))?,
    );
    let writer = BufWriter::new(
        File::create(output).with_context(|| format!("Failed to create {}", output.display()))?,
    );

    filter_rows(reader, writer, expression, options)
        .with_context(|| format!("Failed to filter {}", input.display()))
}

/// Filter every `*.csv` file of `input_dir` into a file of the same name in
/// `output_dir`, which is created if missing. Files are processed in name
/// order.
pub fn filter_directory(
    input_dir: &Path,
    output_dir: &Path,
    expression: &str,
    options: &FilterOptions,
) -> Result<Vec<FileReport>> {
    if !input_dir.is_dir() {
        bail!("Input directory {} does not exist", input_dir.display());
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let mut inputs = Vec::new();
    for entry in fs::read_dir(input_dir)
        .with_context(|| format!("Failed to read {}", input_dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "csv") {
            inputs.push(path);
        }
    }
    inputs.sort();

    let mut reports = Vec::with_capacity(inputs.len());
    for input in inputs {
        let Some(name) = input.file_name() else {
            continue;
        };
        let output = output_dir.join(name);

        info!("Processing {}", input.display());
        let stats = filter_file(&input, &output, expression, options)?;
        reports.push(FileReport {
            input,
            output,
            stats,
        });
    }

    Ok(reports)
}
