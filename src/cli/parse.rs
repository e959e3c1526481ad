use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use clap::Parser as ClapParser;
use parseudev::{DeviceRecord, Parser};
use tracing::instrument;

use super::terminal::Palette;

#[derive(Debug, ClapParser)]
pub struct Parse {
    /// Input file (stdin if omitted or '-')
    file: Option<PathBuf>,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    /// One section per device
    #[default]
    Text,
    /// One JSON object per line and device
    Json,
    /// Counts only
    Summary,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Totals {
    devices: usize,
    properties: usize,
    attributes: usize,
}

impl Parse {
    #[instrument(level = "debug", skip(parser))]
    pub fn run(self, parser: Parser) -> anyhow::Result<()> {
        let input = super::open_input(self.file.as_deref())?;
        let mut stdout = io::stdout().lock();
        self.render(parser, input, Palette::stdout(), &mut stdout)
    }

    fn render<R: BufRead, W: Write>(
        &self,
        parser: Parser,
        input: R,
        palette: Palette,
        out: &mut W,
    ) -> anyhow::Result<()> {
        let mut totals = Totals::default();

        for (index, record) in parser.read(input).enumerate() {
            let record = record?;
            totals.devices += 1;
            totals.properties += record.len();
            totals.attributes += record.attributes().len();

            match self.output {
                OutputFormat::Text => write_text(index, &record, palette, out)?,
                OutputFormat::Json => {
                    serde_json::to_writer(&mut *out, &record)?;
                    writeln!(out)?;
                }
                OutputFormat::Summary => {}
            }
        }

        if matches!(self.output, OutputFormat::Summary) {
            writeln!(
                out,
                "{} devices, {} properties, {} attributes",
                totals.devices, totals.properties, totals.attributes
            )?;
        }

        tracing::info!(devices = totals.devices, "parsed input");
        out.flush()?;
        Ok(())
    }
}

fn write_text<W: Write>(
    index: usize,
    record: &DeviceRecord,
    palette: Palette,
    out: &mut W,
) -> io::Result<()> {
    let title = record.devpath().map_or_else(
        || format!("Device {}", index + 1),
        |devpath| format!("Device {}: {devpath}", index + 1),
    );
    writeln!(out, "{}", palette.title(title))?;

    for entry in record.meta() {
        writeln!(
            out,
            "  {} {}",
            palette.label(format_args!("{}:", entry.tag)),
            entry.value
        )?;
    }
    for (key, value) in record.properties() {
        writeln!(out, "  {key} = {value}")?;
    }
    for (name, value) in record.attributes() {
        writeln!(out, "  {} = {value}", palette.label(format_args!("ATTR{{{name}}}")))?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const INPUT: &str = "DEVPATH=/devices/virtual/block/loop0\nATTR{ro}==\"0\"\n\nID_MODEL=Mouse\n";

    fn render(output: OutputFormat, input: &str) -> anyhow::Result<String> {
        let command = Parse { file: None, output };
        let mut out = Vec::new();
        command.render(
            Parser::default(),
            Cursor::new(input.to_string()),
            Palette::plain(),
            &mut out,
        )?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn summary() {
        assert_eq!(
            render(OutputFormat::Summary, INPUT).unwrap(),
            "2 devices, 2 properties, 1 attributes\n"
        );
    }

    #[test]
    fn json_lines() {
        let output = render(OutputFormat::Json, INPUT).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["attributes"]["ro"], "0");
        assert_eq!(lines[1]["properties"]["ID_MODEL"], "Mouse");
    }

    #[test]
    fn text_mentions_every_property() {
        let output = render(OutputFormat::Text, INPUT).unwrap();
        assert!(output.contains("/devices/virtual/block/loop0"));
        assert!(output.contains("ID_MODEL = Mouse"));
        assert!(output.contains("Device 2"));
    }

    #[test]
    fn text_layout() {
        assert_eq!(
            render(OutputFormat::Text, INPUT).unwrap(),
            "Device 1: /devices/virtual/block/loop0\n  \
             DEVPATH = /devices/virtual/block/loop0\n  \
             ATTR{ro} = 0\n\n\
             Device 2\n  \
             ID_MODEL = Mouse\n\n"
        );
    }

    #[test]
    fn errors_propagate() {
        assert!(render(OutputFormat::Summary, "NOVALUEHERE\n").is_err());
    }
}
