use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

mod check;
mod normalize;
mod parse;
mod terminal;
mod values;

use anyhow::Context;
use check::Check;
use clap::ArgAction;
use normalize::Normalize;
use parse::Parse;
use parseudev::{Dialect, DuplicatePolicy, Parser, ParserConfig};
use tracing::instrument;
use values::{DevlinkCommand, DmUuidCommand, IdPathCommand, PciCommand};

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Parser configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Input line format, overriding the configuration file
    #[arg(long, global = true)]
    dialect: Option<DialectArg>,

    /// Handling of repeated keys, overriding the configuration file
    #[arg(long, global = true)]
    duplicates: Option<DuplicatesArg>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let parser = Parser::new(self.parser_config()?);
        self.command.run(parser)
    }

    fn parser_config(&self) -> anyhow::Result<ParserConfig> {
        let mut config = match &self.config {
            Some(path) => ParserConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => ParserConfig::default(),
        };

        if let Some(dialect) = self.dialect {
            config.dialect = dialect.into();
        }
        if let Some(duplicates) = self.duplicates {
            config.duplicates = duplicates.into();
        }

        tracing::debug!(?config, "parser configuration");
        Ok(config)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum DialectArg {
    /// `KEY=VALUE` lines
    Env,
    /// `udevadm info --export-db` lines
    Export,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Env => Self::Env,
            DialectArg::Export => Self::Export,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum DuplicatesArg {
    /// Fail on a repeated key
    Reject,
    /// Keep the last value of a repeated key
    LastWins,
}

impl From<DuplicatesArg> for DuplicatePolicy {
    fn from(arg: DuplicatesArg) -> Self {
        match arg {
            DuplicatesArg::Reject => Self::Reject,
            DuplicatesArg::LastWins => Self::LastWins,
        }
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Parse device records and print them
    Parse(Parse),

    /// Check that files parse cleanly
    ///
    /// Directories are searched recursively. Files are checked in parallel.
    Check(Check),

    /// Re-serialize device records in canonical form
    Normalize(Normalize),

    /// Split an ID_PATH or ID_SAS_PATH value into its segments
    IdPath(IdPathCommand),

    /// Categorise device links
    Devlink(DevlinkCommand),

    /// Parse a PCI address
    Pci(PciCommand),

    /// Parse a DM_UUID value
    DmUuid(DmUuidCommand),
}

impl Command {
    #[instrument(level = "debug", skip_all)]
    fn run(self, parser: Parser) -> anyhow::Result<()> {
        match self {
            Self::Parse(command) => command.run(parser)?,
            Self::Check(command) => command.run(parser)?,
            Self::Normalize(command) => command.run(parser)?,
            Self::IdPath(command) => command.run()?,
            Self::Devlink(command) => command.run()?,
            Self::Pci(command) => command.run()?,
            Self::DmUuid(command) => command.run()?,
        }
        Ok(())
    }
}

/// Opens `path` for buffered reading, or stdin when it is absent or `-`.
fn open_input(path: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
    match path {
        Some(path) if path != Path::new("-") => {
            let file =
                File::open(path).with_context(|| format!("opening {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        _ => Ok(Box::new(io::stdin().lock())),
    }
}
