//! Sequence file validation
//!
//! Loads each file through the normal loader and reports every issue
//! without playing anything.

use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::{ConfigLoader, LoadResult};
use crate::error::{AkashicError, ConfigError, ValidationIssue};

/// Outcome for one file.
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    valid: bool,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl FileReport {
    fn new(path: &Path, outcome: &Result<LoadResult, ConfigError>) -> Self {
        let file = path.display().to_string();
        match outcome {
            Ok(result) => Self {
                file,
                valid: true,
                errors: Vec::new(),
                warnings: result
                    .warnings
                    .iter()
                    .map(|w| ValidationIssue {
                        path: w.location.clone().unwrap_or_default(),
                        message: w.message.clone(),
                    })
                    .collect(),
            },
            Err(ConfigError::ValidationError { errors, .. }) => Self {
                file,
                valid: false,
                errors: errors.clone(),
                warnings: Vec::new(),
            },
            Err(other) => Self {
                file,
                valid: false,
                errors: vec![ValidationIssue {
                    path: String::new(),
                    message: other.to_string(),
                }],
                warnings: Vec::new(),
            },
        }
    }
}

/// Validate every file in `args.files`.
///
/// # Errors
///
/// Returns the first file's configuration error after reporting all files.
pub fn run(args: &ValidateArgs) -> Result<(), AkashicError> {
    let loader = ConfigLoader::with_defaults();
    let mut reports = Vec::with_capacity(args.files.len());
    let mut first_error = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating sequence file");
        let outcome = loader.load(path);
        reports.push(FileReport::new(path, &outcome));
        if let Err(e) = outcome {
            first_error.get_or_insert(e);
        }
    }

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                print_human(report);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    first_error.map_or(Ok(()), |e| Err(e.into()))
}

fn print_human(report: &FileReport) {
    if report.valid {
        println!("ok    {}", report.file);
    } else {
        println!("FAIL  {}", report.file);
    }
    for issue in &report.errors {
        if issue.path.is_empty() {
            println!("  error: {}", issue.message);
        } else {
            println!("  error: {issue}");
        }
    }
    for issue in &report.warnings {
        println!("  warning: {issue}");
    }
}
