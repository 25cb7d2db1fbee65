//! Batch orchestration
//!
//! Discovers XML files under the given paths, runs one pipeline per
//! worker thread, and aggregates per-file outcomes. The compiled schema
//! is shared read-only across the pool; everything else is per-file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use tracing::{info, warn};
use xsdfix_core::XmlFixer;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub paths: Vec<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub validate_only: bool,
    pub recursive: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub threads: Option<usize>,
    pub continue_on_error: bool,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub success: bool,
    pub detail: String,
}

#[derive(Debug)]
pub struct BatchSummary {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }
}

/// Default output name: `<basename>.fixed<ext>` next to the input
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{}.fixed.{}", stem, ext.to_string_lossy()),
        None => format!("{}.fixed", stem),
    };
    input.with_file_name(name)
}

pub fn run_batch(fixer: &XmlFixer, options: &BatchOptions) -> Result<BatchSummary> {
    let include = build_glob_set(&options.include).context("invalid --include pattern")?;
    let exclude = build_glob_set(&options.exclude).context("invalid --exclude pattern")?;

    let files = discover_files(options, include.as_ref(), exclude.as_ref())?;
    if files.is_empty() {
        bail!("no XML files matched the given paths");
    }
    info!(files = files.len(), "batch discovery complete");

    let threads = options.threads.unwrap_or_else(num_cpus::get).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("building worker pool")?;

    let stop = AtomicBool::new(false);
    let mut outcomes: Vec<FileOutcome> = pool.install(|| {
        files
            .par_iter()
            .map(|file| process_file(fixer, file, options, &stop))
            .collect()
    });
    outcomes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(BatchSummary { outcomes })
}

fn process_file(
    fixer: &XmlFixer,
    file: &Path,
    options: &BatchOptions,
    stop: &AtomicBool,
) -> FileOutcome {
    if stop.load(Ordering::Relaxed) {
        return FileOutcome {
            path: file.to_path_buf(),
            success: false,
            detail: "skipped after earlier failure".to_string(),
        };
    }

    let outcome = if options.validate_only {
        match fixer.validate_file(file) {
            Ok(result) => FileOutcome {
                path: file.to_path_buf(),
                success: result.valid,
                detail: format!(
                    "{} error(s), {} warning(s)",
                    result.errors.len(),
                    result.warnings.len()
                ),
            },
            Err(e) => FileOutcome {
                path: file.to_path_buf(),
                success: false,
                detail: e.to_string(),
            },
        }
    } else {
        let output = match &options.output_dir {
            Some(dir) => dir.join(file.file_name().unwrap_or_default()),
            None => default_output_path(file),
        };
        match fixer.fix_file(file, Some(output.as_path())) {
            Ok(result) if result.success => FileOutcome {
                path: file.to_path_buf(),
                success: true,
                detail: if result.no_changes_required {
                    "no changes required".to_string()
                } else {
                    format!(
                        "{} applied, {} failed",
                        result.applied_count(),
                        result.failed_count()
                    )
                },
            },
            Ok(result) => FileOutcome {
                path: file.to_path_buf(),
                success: false,
                detail: result
                    .message
                    .unwrap_or_else(|| "repair failed".to_string()),
            },
            Err(e) => FileOutcome {
                path: file.to_path_buf(),
                success: false,
                detail: e.to_string(),
            },
        }
    };

    if !outcome.success {
        warn!(file = %file.display(), detail = %outcome.detail, "batch file failed");
        if !options.continue_on_error {
            stop.store(true, Ordering::Relaxed);
        }
    }
    outcome
}

fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .with_context(|| format!("invalid glob pattern '{}'", pattern))?;
        builder.add(glob);
    }
    Ok(Some(builder.build()?))
}

fn matches(set: Option<&GlobSet>, path: &Path) -> Option<bool> {
    set.map(|s| {
        s.is_match(path)
            || path
                .file_name()
                .map(|name| s.is_match(Path::new(name)))
                .unwrap_or(false)
    })
}

fn discover_files(
    options: &BatchOptions,
    include: Option<&GlobSet>,
    exclude: Option<&GlobSet>,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in &options.paths {
        if path.is_file() {
            // explicit files bypass the include filter
            if matches(exclude, path) != Some(true) {
                files.push(path.clone());
            }
            continue;
        }
        if !path.is_dir() {
            bail!("path does not exist: {}", path.display());
        }
        let mut walker = WalkBuilder::new(path);
        walker.standard_filters(false);
        if !options.recursive {
            walker.max_depth(Some(1));
        }
        for entry in walker.build() {
            let entry = entry?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let candidate = entry.path();
            if candidate
                .extension()
                .map(|e| !e.eq_ignore_ascii_case("xml"))
                .unwrap_or(true)
            {
                continue;
            }
            if matches(include, candidate) == Some(false) {
                continue;
            }
            if matches(exclude, candidate) == Some(true) {
                continue;
            }
            files.push(candidate.to_path_buf());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}
