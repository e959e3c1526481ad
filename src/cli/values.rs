use std::io::{self, Write};

use clap::Parser as ClapParser;
use parseudev::{Devlink, DmUuid, IdPathParser, PciAddress, domain::IdPathSegment};
use serde::Serialize;
use tracing::instrument;

use super::terminal::Palette;

#[derive(Debug, ClapParser)]
pub struct IdPathCommand {
    /// The ID_PATH or ID_SAS_PATH value
    value: String,

    /// Print the segments as JSON
    #[arg(long)]
    json: bool,
}

impl IdPathCommand {
    #[instrument(level = "debug")]
    pub fn run(self) -> anyhow::Result<()> {
        self.render(Palette::stdout(), &mut io::stdout().lock())
    }

    fn render<W: Write>(&self, palette: Palette, out: &mut W) -> anyhow::Result<()> {
        let segments: Vec<IdPathSegment> =
            IdPathParser::default().parse(&self.value)?.into_iter().collect();

        if self.json {
            return write_json(&segments, out);
        }

        for segment in &segments {
            writeln!(
                out,
                "{} {}",
                palette.title(format_args!("{:<9}", segment.kind().to_string())),
                segment.total()
            )?;
            for (name, value) in segment.fields() {
                writeln!(out, "    {} {value}", palette.label(format_args!("{name}:")))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, ClapParser)]
pub struct DevlinkCommand {
    /// Device link paths, e.g. /dev/disk/by-id/wwn-0x5000c500a0b1c2d3
    #[arg(required = true)]
    paths: Vec<String>,

    /// Print the links as JSON
    #[arg(long)]
    json: bool,
}

impl DevlinkCommand {
    #[instrument(level = "debug")]
    pub fn run(self) -> anyhow::Result<()> {
        self.render(Palette::stdout(), &mut io::stdout().lock())
    }

    fn render<W: Write>(&self, palette: Palette, out: &mut W) -> anyhow::Result<()> {
        let links: Vec<Devlink> = self.paths.iter().map(Devlink::new).collect();

        if self.json {
            return write_json(&links, out);
        }

        for link in &links {
            match (link.category(), link.value()) {
                (Some(category), Some(value)) => {
                    writeln!(out, "{link}\t{}\t{value}", palette.title(category))?;
                }
                _ => writeln!(out, "{link}\t{}", palette.label("-"))?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, ClapParser)]
pub struct PciCommand {
    /// A PCI address, e.g. 0000:00:1f.2
    address: String,

    /// Print the address as JSON
    #[arg(long)]
    json: bool,
}

impl PciCommand {
    #[instrument(level = "debug")]
    pub fn run(self) -> anyhow::Result<()> {
        self.render(Palette::stdout(), &mut io::stdout().lock())
    }

    fn render<W: Write>(&self, palette: Palette, out: &mut W) -> anyhow::Result<()> {
        let address: PciAddress = self.address.parse()?;

        if self.json {
            return write_json(&address, out);
        }

        let components = [
            u32::from(address.bus()),
            u32::from(address.device()),
            u32::from(address.function()),
        ];

        writeln!(out, "{}", palette.title(address))?;
        writeln!(
            out,
            "  {} {:#06x}",
            palette.label("domain:"),
            address.domain()
        )?;
        for (name, value) in PciAddress::KEYS[1..].iter().zip(components) {
            writeln!(out, "  {} {value:#04x}", palette.label(format_args!("{name}:")))?;
        }
        Ok(())
    }
}

#[derive(Debug, ClapParser)]
pub struct DmUuidCommand {
    /// A DM_UUID value, e.g. LVM-Xf8tn3u0...
    value: String,

    /// Print the components as JSON
    #[arg(long)]
    json: bool,
}

impl DmUuidCommand {
    #[instrument(level = "debug")]
    pub fn run(self) -> anyhow::Result<()> {
        self.render(Palette::stdout(), &mut io::stdout().lock())
    }

    fn render<W: Write>(&self, palette: Palette, out: &mut W) -> anyhow::Result<()> {
        let dm_uuid: DmUuid = self.value.parse()?;

        if self.json {
            return write_json(&dm_uuid, out);
        }

        if let Some(partition) = dm_uuid.partition() {
            writeln!(out, "{} {partition}", palette.label("partition:"))?;
        }
        writeln!(out, "{} {}", palette.label("subsystem:"), dm_uuid.subsystem())?;
        writeln!(out, "{} {}", palette.label("uuid:"), dm_uuid.uuid())?;
        Ok(())
    }
}

fn write_json<T: Serialize, W: Write>(value: &T, out: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
