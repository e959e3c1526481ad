//! Parsing of `ID_PATH` and `ID_SAS_PATH` property values.
//!
//! udev's `path_id` builtin describes where a device sits in the hardware
//! topology by joining one segment per traversed bus with `-`, for example
//! `pci-0000:00:14.0-usb-0:1:1.0-scsi-0:0:0:0`. Because `-` also appears
//! inside segments, the value cannot simply be split; instead it is consumed
//! left to right by a table of segment parsers, each recognising one bus.

use std::{fmt, sync::LazyLock};

use nonempty::NonEmpty;
use regex::Regex;
use serde::Serialize;

use crate::domain::pci::PciAddress;

const PCI_ADDRESS: &str = r"[[:xdigit:]]{4,8}:[[:xdigit:]]{2}:[[:xdigit:]]{2}\.[0-7]";

/// The bus a segment of an `ID_PATH` describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentKind {
    /// `pci-0000:00:1f.2`
    Pci,
    /// `usb-0:1.4:1.0`, `usbv2-0:1:1.0`
    Usb,
    /// `ata-1`, `ata-1.0`
    Ata,
    /// `scsi-0:0:0:0`
    Scsi,
    /// `sas-0x5000c500a0b1c2d3-lun-0`, `sas-exp0x500605b0000272bf-phy11-lun-0`
    Sas,
    /// `nvme-1`
    Nvme,
    /// `nvme-subsys0`
    NvmeSubsystem,
    /// `virtio-pci-0000:00:05.0`
    Virtio,
    /// `platform-i8042`
    Platform,
    /// `acpi-PNP0C0A:00`
    Acpi,
    /// `serio-0`
    Serio,
    /// `ip-192.168.1.10:3260-iscsi-iqn.2003-01.org.linux-iscsi.host:sn.1-lun-0`
    Iscsi,
    /// `xen-vbd-51712`
    Xen,
    /// `fc-0x5006016844602198-lun-0`
    FibreChannel,
    /// `cciss-disk0`
    Cciss,
    /// `ccw-0.0.0150`
    Ccw,
    /// `spi-spi0.0`
    Spi,
    /// `bcma-0`
    Bcma,
}

impl SegmentKind {
    /// The text every segment of this kind starts with.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Pci => "pci-",
            Self::Usb => "usb",
            Self::Ata => "ata-",
            Self::Scsi => "scsi-",
            Self::Sas => "sas-",
            Self::Nvme => "nvme-",
            Self::NvmeSubsystem => "nvme-subsys",
            Self::Virtio => "virtio-",
            Self::Platform => "platform-",
            Self::Acpi => "acpi-",
            Self::Serio => "serio-",
            Self::Iscsi => "ip-",
            Self::Xen => "xen-",
            Self::FibreChannel => "fc-",
            Self::Cciss => "cciss-",
            Self::Ccw => "ccw-",
            Self::Spi => "spi-",
            Self::Bcma => "bcma-",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches('-'))
    }
}

/// Recognises one kind of `ID_PATH` segment.
#[derive(Debug, Clone)]
pub struct SegmentParser {
    kind: SegmentKind,
    pattern: Regex,
}

impl SegmentParser {
    /// Creates a parser for segments of `kind` described by `body`.
    ///
    /// `body` must match the whole segment, starting with the kind's prefix;
    /// its named groups become the segment's fields.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` is not a valid regular expression.
    pub fn new(kind: SegmentKind, body: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!("^(?P<total>{body})(?:-|$)"))?;
        Ok(Self { kind, pattern })
    }

    /// The kind of segment this parser recognises.
    #[must_use]
    pub const fn kind(&self) -> SegmentKind {
        self.kind
    }

    /// Matches a segment at the start of `input`.
    ///
    /// Returns the segment and the number of bytes consumed, which includes
    /// the `-` separating it from the next segment.
    fn match_start(&self, input: &str) -> Option<(IdPathSegment, usize)> {
        let captures = self.pattern.captures(input)?;
        let whole = captures.get(0)?;
        let total = captures.name("total")?;

        let fields = self
            .pattern
            .capture_names()
            .flatten()
            .filter(|&name| name != "total")
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();

        let segment = IdPathSegment {
            kind: self.kind,
            total: total.as_str().to_string(),
            fields,
        };
        Some((segment, whole.end()))
    }
}

/// The segment parsers udev's `path_id` output is made of, in the order they
/// are tried.
pub static STANDARD_PARSERS: LazyLock<Vec<SegmentParser>> = LazyLock::new(|| {
    [
        (SegmentKind::Pci, format!("pci-(?P<address>{PCI_ADDRESS})")),
        (
            SegmentKind::Usb,
            r"usb(?:v(?P<version>[0-9]+))?-(?P<port>[0-9]+(?::[0-9.]+)*)".to_string(),
        ),
        (
            SegmentKind::Ata,
            r"ata-(?P<port>[0-9]+)(?:\.(?P<multiplier>[0-9]+))?".to_string(),
        ),
        (
            SegmentKind::Scsi,
            r"scsi-(?P<host>[0-9]+):(?P<channel>[0-9]+):(?P<target>[0-9]+):(?P<lun>[0-9]+)"
                .to_string(),
        ),
        (
            SegmentKind::Sas,
            r"sas-(?:exp(?P<expander>0x[[:xdigit:]]+)-)?(?:(?P<address>0x[[:xdigit:]]+)|phy(?P<phy>[0-9]+))-lun-(?P<lun>[0-9]+)"
                .to_string(),
        ),
        (
            SegmentKind::NvmeSubsystem,
            r"nvme-subsys(?P<subsystem>[0-9]+)".to_string(),
        ),
        (SegmentKind::Nvme, r"nvme-(?P<namespace>[0-9]+)".to_string()),
        (
            SegmentKind::Virtio,
            format!("virtio-pci-(?P<address>{PCI_ADDRESS})"),
        ),
        (SegmentKind::Platform, r"platform-(?P<name>[^-]+)".to_string()),
        (SegmentKind::Acpi, r"acpi-(?P<name>[^-]+)".to_string()),
        (SegmentKind::Serio, r"serio-(?P<port>[0-9]+)".to_string()),
        (
            SegmentKind::Iscsi,
            r"ip-(?P<address>[^-]+)-iscsi-(?P<target>.+?)-lun-(?P<lun>[0-9]+)".to_string(),
        ),
        (SegmentKind::Xen, r"xen-vbd-(?P<id>[0-9]+)".to_string()),
        (
            SegmentKind::FibreChannel,
            r"fc-(?P<port>0x[[:xdigit:]]+)-lun-(?P<lun>[0-9]+)".to_string(),
        ),
        (SegmentKind::Cciss, r"cciss-disk(?P<disk>[0-9]+)".to_string()),
        (SegmentKind::Ccw, r"ccw-(?P<id>[[:xdigit:].]+)".to_string()),
        (SegmentKind::Spi, r"spi-(?P<device>[^-]+)".to_string()),
        (SegmentKind::Bcma, r"bcma-(?P<core>[0-9]+)".to_string()),
    ]
    .into_iter()
    .map(|(kind, body)| {
        SegmentParser::new(kind, &body)
            .unwrap_or_else(|e| unreachable!("invalid {kind} segment pattern: {e}"))
    })
    .collect()
});

/// One parsed segment of an `ID_PATH` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdPathSegment {
    kind: SegmentKind,
    total: String,
    fields: Vec<(String, String)>,
}

impl IdPathSegment {
    /// The bus this segment describes.
    #[must_use]
    pub const fn kind(&self) -> SegmentKind {
        self.kind
    }

    /// The full text of the segment, without separators.
    #[must_use]
    pub fn total(&self) -> &str {
        &self.total
    }

    /// The value of a named field, if the segment has it.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All fields present in the segment, in pattern order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// The PCI address of a `pci` or `virtio` segment.
    #[must_use]
    pub fn pci_address(&self) -> Option<PciAddress> {
        match self.kind {
            SegmentKind::Pci | SegmentKind::Virtio => self.field("address")?.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for IdPathSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.total)
    }
}

/// Splits `ID_PATH` values into segments.
#[derive(Debug, Clone, Copy)]
pub struct IdPathParser<'a> {
    parsers: &'a [SegmentParser],
}

impl Default for IdPathParser<'static> {
    fn default() -> Self {
        Self::new(&STANDARD_PARSERS)
    }
}

impl<'a> IdPathParser<'a> {
    /// Creates a parser that tries `parsers` in order at every position.
    #[must_use]
    pub const fn new(parsers: &'a [SegmentParser]) -> Self {
        Self { parsers }
    }

    /// Parses `value` into its segments.
    ///
    /// At every position the first parser that recognises a complete segment
    /// wins. There is no backtracking: if no parser matches the remaining
    /// text, the whole value is rejected.
    ///
    /// # Errors
    ///
    /// Returns `UnrecognisedSegment` if the value is empty, ends with a
    /// separator, or contains a segment no parser recognises.
    pub fn parse(&self, value: &str) -> Result<NonEmpty<IdPathSegment>, UnrecognisedSegment> {
        let mut segments = Vec::new();
        let mut offset = 0;

        loop {
            let rest = &value[offset..];
            let Some((segment, consumed)) = self.parsers.iter().find_map(|p| p.match_start(rest))
            else {
                tracing::trace!(value, offset, "no segment parser matched");
                return Err(UnrecognisedSegment::new(value, offset));
            };

            let ends_with_separator = consumed > segment.total.len();
            offset += consumed;
            segments.push(segment);

            if offset == value.len() {
                if ends_with_separator {
                    return Err(UnrecognisedSegment::new(value, offset));
                }
                break;
            }
        }

        NonEmpty::from_vec(segments).ok_or_else(|| UnrecognisedSegment::new(value, 0))
    }
}

/// Error returned when part of an `ID_PATH` value is not a known segment.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unrecognised ID_PATH segment at offset {offset} in '{value}'")]
pub struct UnrecognisedSegment {
    value: String,
    offset: usize,
}

impl UnrecognisedSegment {
    fn new(value: &str, offset: usize) -> Self {
        Self {
            value: value.to_string(),
            offset,
        }
    }

    /// The value that failed to parse.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Byte offset of the first unrecognised text.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// The text that could not be parsed.
    #[must_use]
    pub fn remainder(&self) -> &str {
        &self.value[self.offset..]
    }
}
