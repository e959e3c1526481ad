use std::{
    fs::File,
    io::{self, BufRead, BufWriter, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser as ClapParser;
use parseudev::{Parser, format::write_record};
use tracing::instrument;

#[derive(Debug, ClapParser)]
pub struct Normalize {
    /// Input file (stdin if omitted or '-')
    file: Option<PathBuf>,

    /// Write to this file instead of stdout
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,
}

impl Normalize {
    #[instrument(level = "debug", skip(parser))]
    pub fn run(self, parser: Parser) -> anyhow::Result<()> {
        let input = super::open_input(self.file.as_deref())?;

        match &self.output {
            Some(path) => {
                let file =
                    File::create(path).with_context(|| format!("creating {}", path.display()))?;
                normalize(parser, input, &mut BufWriter::new(file))
            }
            None => normalize(parser, input, &mut io::stdout().lock()),
        }
    }
}

/// Streams records from `input` to `out` one block at a time.
fn normalize<R: BufRead, W: Write>(parser: Parser, input: R, out: &mut W) -> anyhow::Result<()> {
    for record in parser.read(input) {
        write_record(&record?, out)?;
    }
    out.flush()?;
    Ok(())
}
