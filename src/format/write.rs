use std::{
    fmt,
    io::{self, Write},
};

use crate::domain::{DeviceRecord, Dialect};

/// Renders the record as one block of text in its dialect, followed by the
/// blank line that separates it from the next block.
///
/// Parsing the output with a parser of the same dialect yields an equal
/// record.
impl fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let prefix = match self.dialect {
            Dialect::Env => "",
            Dialect::Export => "E: ",
        };

        for entry in &self.meta {
            writeln!(f, "{}: {}", entry.tag, entry.value)?;
        }
        for (key, value) in &self.properties {
            writeln!(f, "{prefix}{key}={value}")?;
        }
        for (name, value) in &self.attributes {
            writeln!(f, "{prefix}ATTR{{{name}}}==\"{value}\"")?;
        }
        writeln!(f)
    }
}

/// Writes one record to `out`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_record<W: Write>(record: &DeviceRecord, out: &mut W) -> io::Result<()> {
    write!(out, "{record}")
}

/// Writes records to `out` as consecutive blocks.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_records<'a, W, I>(records: I, out: &mut W) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a DeviceRecord>,
{
    for record in records {
        write_record(record, out)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{
        domain::{DuplicatePolicy, ParserConfig},
        format::Parser,
    };

    fn round_trip(parser: Parser, text: &str) {
        let records = parser.parse(text).unwrap();

        for record in &records {
            let reparsed = parser.parse(&record.to_string()).unwrap();
            assert_eq!(reparsed, vec![record.clone()]);
        }

        let mut written = Vec::new();
        write_records(&records, &mut written).unwrap();
        let written = String::from_utf8(written).unwrap();
        assert_eq!(parser.parse(&written).unwrap(), records);

        // a second pass is a fixed point
        let mut rewritten = Vec::new();
        write_records(&parser.parse(&written).unwrap(), &mut rewritten).unwrap();
        assert_eq!(String::from_utf8(rewritten).unwrap(), written);
    }

    #[test_case("ID_MODEL=Disk\nID_BUS=usb\n\nID_MODEL=Mouse\n"; "two blocks")]
    #[test_case("KEY=\n"; "empty value")]
    #[test_case("A= spaced value \nB=a=b=c\nKERNEL==\"sda\"\n"; "awkward values")]
    #[test_case("ATTR{size}==\"1024\"\nATTR{ro}==0\nATTR{x}=1\n"; "attributes")]
    #[test_case("ATTR{q}==\"\"\"\nATTR{r}==\"\n"; "quotes in attribute values")]
    #[test_case("\n\nA=1\n\n\n\nB=2"; "irregular separators")]
    #[test_case("A=b\r"; "carriage return at end of input")]
    #[test_case("A=b\r\r\n"; "carriage return before crlf")]
    #[test_case("A=1\r\nB=2\r\n"; "crlf line endings")]
    fn env_round_trip(text: &str) {
        round_trip(Parser::default(), text);
    }

    #[test]
    fn last_wins_round_trip() {
        let parser = Parser::new(ParserConfig {
            duplicates: DuplicatePolicy::LastWins,
            ..ParserConfig::default()
        });
        round_trip(parser, "A=1\nB=2\nA=3\n");
    }

    #[test]
    fn export_round_trip() {
        round_trip(
            Parser::new(ParserConfig::export()),
            "P: /devices/virtual/block/loop0\nN: loop0\nL: \nS: disk/by-label/x\nE: DEVNAME=/dev/loop0\nE: ATTR{ro}==\"0\"\n\nX:\n",
        );
    }

    #[test]
    fn canonical_text() {
        let records = Parser::default()
            .parse("ID_MODEL=Disk\nATTR{ro}==0\n\n\n\nID_MODEL=Mouse")
            .unwrap();

        let mut out = Vec::new();
        write_records(&records, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ID_MODEL=Disk\nATTR{ro}==\"0\"\n\nID_MODEL=Mouse\n\n"
        );
    }

    #[test]
    fn export_text() {
        let records = Parser::new(ParserConfig::export())
            .parse("E: A=1\nN: sda\nE: B=2\n")
            .unwrap();
        assert_eq!(records[0].to_string(), "N: sda\nE: A=1\nE: B=2\n\n");
    }
}
