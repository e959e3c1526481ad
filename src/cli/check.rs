use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser as ClapParser;
use parseudev::Parser;
use rayon::prelude::*;
use tracing::instrument;
use walkdir::WalkDir;

use super::terminal::Palette;

#[derive(Debug, ClapParser)]
pub struct Check {
    /// Files or directories to check
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Suppress output for files that parse cleanly
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Debug)]
struct Outcome {
    path: PathBuf,
    result: anyhow::Result<usize>,
}

impl Check {
    #[instrument(level = "debug", skip(parser))]
    pub fn run(self, parser: Parser) -> anyhow::Result<()> {
        let outcomes = check_all(parser, &collect_files(&self.paths)?);

        let mut stdout = io::stdout().lock();
        let failures = self.report(&outcomes, Palette::stdout(), &mut stdout)?;

        if failures > 0 {
            anyhow::bail!("{failures} of {} files failed to parse", outcomes.len());
        }
        Ok(())
    }

    /// Writes one line per outcome and returns the number of failures.
    fn report<W: Write>(
        &self,
        outcomes: &[Outcome],
        palette: Palette,
        out: &mut W,
    ) -> io::Result<usize> {
        let mut failures = 0;
        for outcome in outcomes {
            match &outcome.result {
                Ok(count) => {
                    if !self.quiet {
                        writeln!(
                            out,
                            "{} {} {}",
                            palette.passed("ok"),
                            outcome.path.display(),
                            palette.label(format_args!("({count} devices)"))
                        )?;
                    }
                }
                Err(e) => {
                    failures += 1;
                    writeln!(
                        out,
                        "{} {}: {e:#}",
                        palette.failed("FAILED"),
                        outcome.path.display()
                    )?;
                }
            }
        }
        out.flush()?;
        Ok(failures)
    }
}

/// Expands directories into the regular files below them, sorted by path.
fn collect_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("walking {}", path.display()))?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.clone());
        }
    }

    tracing::debug!(count = files.len(), "collected input files");
    Ok(files)
}

/// Parses every file independently, in parallel.
fn check_all(parser: Parser, files: &[PathBuf]) -> Vec<Outcome> {
    files
        .par_iter()
        .map(|path| Outcome {
            path: path.clone(),
            result: check_file(parser, path),
        })
        .collect()
}

fn check_file(parser: Parser, path: &Path) -> anyhow::Result<usize> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut count = 0;
    for record in parser.records(&text) {
        record?;
        count += 1;
    }
    Ok(count)
}
