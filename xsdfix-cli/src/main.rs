//! xsdfix CLI - validate XML files against an XSD and repair them
//!
//! Three subcommands with binding exit codes:
//! - `validate` - 0 valid, 2 invalid, 1 internal error
//! - `fix` - 0 success (including no changes required), 1 failure
//! - `batch` - 0 all files succeeded, 1 any file failed

mod batch;
mod report;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use xsdfix_core::XmlFixer;

use crate::batch::{default_output_path, run_batch, BatchOptions};
use crate::report::{render_fix, render_validation, write_report, ReportFormat};

#[derive(Parser)]
#[command(name = "xsdfix")]
#[command(about = "xsdfix - XSD validation and XML repair", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an XML file against an XSD schema
    Validate {
        /// Path to the XML file
        #[arg(value_name = "XML_FILE")]
        xml_path: PathBuf,

        /// Path to the XSD schema
        #[arg(short, long, value_name = "XSD_FILE")]
        schema: PathBuf,

        /// Write a report to this path
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,

        /// Print every finding with its location
        #[arg(short, long)]
        verbose: bool,
    },

    /// Repair an XML file so it satisfies the schema
    Fix {
        /// Path to the XML file
        #[arg(value_name = "XML_FILE")]
        xml_path: PathBuf,

        /// Path to the XSD schema
        #[arg(short, long, value_name = "XSD_FILE")]
        schema: PathBuf,

        /// Output path (defaults to <basename>.fixed<ext> next to the input)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite the input file
        #[arg(long)]
        in_place: bool,

        /// With --in-place, keep a <file>.backup copy
        #[arg(long)]
        backup: bool,

        /// Plan and report corrections without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Write a report to this path
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },

    /// Validate or repair a whole set of files
    Batch {
        /// Files or directories to process
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,

        /// Path to the XSD schema
        #[arg(short, long, value_name = "XSD_FILE")]
        schema: PathBuf,

        /// Directory for corrected files
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Validate without repairing
        #[arg(long)]
        validate_only: bool,

        /// Recurse into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Only process files matching these globs
        #[arg(long, value_name = "GLOB")]
        include: Vec<String>,

        /// Skip files matching these globs
        #[arg(long, value_name = "GLOB")]
        exclude: Vec<String>,

        /// Worker thread count (defaults to the CPU count)
        #[arg(long, value_name = "N")]
        threads: Option<usize>,

        /// Keep processing after a file fails
        #[arg(long)]
        continue_on_error: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(matches!(
        cli.command,
        Commands::Validate { verbose: true, .. }
    ));

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Validate {
            xml_path,
            schema,
            report,
            format,
            verbose,
        } => validate_command(xml_path, schema, report, format, verbose),
        Commands::Fix {
            xml_path,
            schema,
            output,
            in_place,
            backup,
            dry_run,
            report,
            format,
        } => fix_command(
            xml_path, schema, output, in_place, backup, dry_run, report, format,
        ),
        Commands::Batch {
            paths,
            schema,
            output_dir,
            validate_only,
            recursive,
            include,
            exclude,
            threads,
            continue_on_error,
        } => batch_command(
            schema,
            BatchOptions {
                paths,
                output_dir,
                validate_only,
                recursive,
                include,
                exclude,
                threads,
                continue_on_error,
            },
        ),
    }
}

fn build_fixer(schema: &Path) -> Result<XmlFixer> {
    XmlFixer::builder()
        .schema_path(schema)
        .build()
        .with_context(|| format!("Failed to compile schema: {}", schema.display()))
}

fn validate_command(
    xml_path: PathBuf,
    schema: PathBuf,
    report: Option<PathBuf>,
    format: ReportFormat,
    verbose: bool,
) -> Result<ExitCode> {
    let fixer = build_fixer(&schema)?;
    let result = fixer
        .validate_file(&xml_path)
        .with_context(|| format!("Failed to validate: {}", xml_path.display()))?;

    if result.valid {
        println!("✅ {} is valid", xml_path.display());
    } else {
        println!(
            "❌ {} is invalid: {} error(s), {} warning(s)",
            xml_path.display(),
            result.errors.len(),
            result.warnings.len()
        );
    }
    if verbose || !result.valid {
        print!(
            "{}",
            render_validation(&xml_path.display().to_string(), &result, ReportFormat::Text)?
        );
    }

    if let Some(path) = report {
        let content = render_validation(&xml_path.display().to_string(), &result, format)?;
        write_report(&path, &content)?;
        println!("📄 Report written to {}", path.display());
    }

    Ok(if result.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

#[allow(clippy::too_many_arguments)]
fn fix_command(
    xml_path: PathBuf,
    schema: PathBuf,
    output: Option<PathBuf>,
    in_place: bool,
    backup: bool,
    dry_run: bool,
    report: Option<PathBuf>,
    format: ReportFormat,
) -> Result<ExitCode> {
    let fixer = build_fixer(&schema)?;

    let output_path = if in_place {
        xml_path.clone()
    } else {
        output.unwrap_or_else(|| default_output_path(&xml_path))
    };

    if in_place && backup && !dry_run {
        let backup = backup_path(&xml_path);
        fs::copy(&xml_path, &backup)
            .with_context(|| format!("Failed to create backup: {}", backup.display()))?;
    }

    let result = fixer
        .fix_file(&xml_path, (!dry_run).then_some(output_path.as_path()))
        .with_context(|| format!("Failed to repair: {}", xml_path.display()))?;

    print!(
        "{}",
        render_fix(&xml_path.display().to_string(), &result, ReportFormat::Text)?
    );
    if result.success && !result.no_changes_required && !dry_run {
        println!("📄 Corrected file: {}", output_path.display());
    }

    if let Some(path) = report {
        let content = render_fix(&xml_path.display().to_string(), &result, format)?;
        write_report(&path, &content)?;
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn batch_command(schema: PathBuf, options: BatchOptions) -> Result<ExitCode> {
    let fixer = build_fixer(&schema)?;
    let summary = run_batch(&fixer, &options)?;

    for outcome in &summary.outcomes {
        println!(
            "{} {} - {}",
            if outcome.success { "✅" } else { "❌" },
            outcome.path.display(),
            outcome.detail
        );
    }
    println!(
        "{} file(s), {} failed",
        summary.outcomes.len(),
        summary.failed_count()
    );

    Ok(if summary.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn backup_path(input: &Path) -> PathBuf {
    let mut name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    name.push_str(".backup");
    input.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/data/catalog.xml")),
            Path::new("/data/catalog.xml.backup")
        );
    }

    #[test]
    fn cli_parses_all_subcommands() {
        Cli::try_parse_from(["xsdfix", "validate", "a.xml", "--schema", "s.xsd"]).unwrap();
        Cli::try_parse_from([
            "xsdfix", "fix", "a.xml", "--schema", "s.xsd", "--in-place", "--backup",
        ])
        .unwrap();
        Cli::try_parse_from([
            "xsdfix",
            "batch",
            "dir",
            "--schema",
            "s.xsd",
            "--recursive",
            "--threads",
            "4",
            "--include",
            "*.xml",
            "--continue-on-error",
        ])
        .unwrap();
    }

    #[test]
    fn missing_paths_are_rejected() {
        assert!(Cli::try_parse_from(["xsdfix", "batch", "--schema", "s.xsd"]).is_err());
    }
}
