use std::{
    collections::HashMap,
    io::{self, BufRead},
    iter::{FusedIterator, Map},
    str::SplitTerminator,
    sync::LazyLock,
};

use regex::Regex;

use super::{ParseError, ReadError};
use crate::domain::{
    DeviceRecord, Dialect, DuplicatePolicy, MetaEntry, ParserConfig, PropertyKey, Tag,
};

static ATTRIBUTE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ATTR\{(?P<name>[^{}]+)\}$")
        .unwrap_or_else(|e| unreachable!("invalid attribute key pattern: {e}"))
});

// Lines end at `\n` only. A `\r` before it belongs to the value.
type TextLines<'a> =
    Map<SplitTerminator<'a, char>, fn(&'a str) -> Result<&'a str, ParseError>>;
type ReaderLines<R> = Map<io::Split<R>, fn(io::Result<Vec<u8>>) -> Result<String, ReadError>>;

/// The lines a block was read from, 1-based and inclusive.
///
/// Blank separator lines are not part of any block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    /// The first line of the block.
    pub first: usize,
    /// The last line of the block.
    pub last: usize,
}

/// Parses device-metadata text into [`DeviceRecord`]s.
///
/// The parser holds only its configuration. Every call starts from scratch,
/// so a parser can be shared freely between threads.
///
/// # Examples
///
/// ```
/// use parseudev::Parser;
///
/// let records = Parser::default()
///     .parse("ID_MODEL=Disk\nID_BUS=usb\n\nID_MODEL=Mouse\n")
///     .unwrap();
///
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[0].get("ID_BUS"), Some("usb"));
/// assert_eq!(records[1].get("ID_MODEL"), Some("Mouse"));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    /// Creates a parser with the given configuration.
    #[must_use]
    pub const fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// The parser's configuration.
    #[must_use]
    pub const fn config(&self) -> ParserConfig {
        self.config
    }

    /// Lazily parses `text`, one block at a time.
    ///
    /// The iterator stops after yielding the first error.
    pub fn records<'a>(&self, text: &'a str) -> Records<'a> {
        let lines: TextLines<'a> = text
            .split_terminator('\n')
            .map(Ok as fn(&'a str) -> Result<&'a str, ParseError>);
        Records {
            blocks: Blocks::new(*self, lines),
        }
    }

    /// Parses all of `text`.
    ///
    /// # Errors
    ///
    /// Returns the first error in the input.
    pub fn parse(&self, text: &str) -> Result<Vec<DeviceRecord>, ParseError> {
        self.records(text).collect()
    }

    /// Lazily parses lines read from `reader`.
    ///
    /// At most one block is held in memory at a time.
    pub fn read<R: BufRead>(&self, reader: R) -> ReadRecords<R> {
        let lines: ReaderLines<R> = reader.split(b'\n').map(decode_line as fn(_) -> _);
        ReadRecords {
            blocks: Blocks::new(*self, lines),
        }
    }
}

fn decode_line(line: io::Result<Vec<u8>>) -> Result<String, ReadError> {
    String::from_utf8(line?)
        .map_err(|e| ReadError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Iterator over the records in a string, returned by [`Parser::records`].
#[derive(Debug)]
pub struct Records<'a> {
    blocks: Blocks<TextLines<'a>>,
}

impl<'a> Records<'a> {
    /// Yields each record together with the lines it was read from.
    #[must_use]
    pub fn spanned(self) -> Spanned<'a> {
        Spanned {
            blocks: self.blocks,
        }
    }
}

impl Iterator for Records<'_> {
    type Item = Result<DeviceRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.blocks
            .next_block()
            .map(|result| result.map(|(_, record)| record))
    }
}

impl FusedIterator for Records<'_> {}

/// Iterator over records and their line spans, returned by
/// [`Records::spanned`].
#[derive(Debug)]
pub struct Spanned<'a> {
    blocks: Blocks<TextLines<'a>>,
}

impl Iterator for Spanned<'_> {
    type Item = Result<(LineSpan, DeviceRecord), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.blocks.next_block()
    }
}

impl FusedIterator for Spanned<'_> {}

/// Iterator over the records read from a [`BufRead`], returned by
/// [`Parser::read`].
#[derive(Debug)]
pub struct ReadRecords<R> {
    blocks: Blocks<ReaderLines<R>>,
}

impl<R: BufRead> Iterator for ReadRecords<R> {
    type Item = Result<DeviceRecord, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.blocks
            .next_block()
            .map(|result| result.map(|(_, record)| record))
    }
}

impl<R: BufRead> FusedIterator for ReadRecords<R> {}

/// Groups a stream of lines into blocks.
#[derive(Debug)]
struct Blocks<I> {
    parser: Parser,
    lines: I,
    line_no: usize,
    block: usize,
    done: bool,
}

impl<I> Blocks<I> {
    const fn new(parser: Parser, lines: I) -> Self {
        Self {
            parser,
            lines,
            line_no: 0,
            block: 0,
            done: false,
        }
    }
}

impl<I, L, E> Blocks<I>
where
    I: Iterator<Item = Result<L, E>>,
    L: AsRef<str>,
    E: From<ParseError>,
{
    fn next_block(&mut self) -> Option<Result<(LineSpan, DeviceRecord), E>> {
        if self.done {
            return None;
        }

        let mut builder: Option<BlockBuilder> = None;

        for line in self.lines.by_ref() {
            self.line_no += 1;

            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            let line = line.as_ref();

            if line.trim().is_empty() {
                if builder.is_some() {
                    break;
                }
                continue;
            }

            let line_no = self.line_no;
            let builder = builder.get_or_insert_with(|| {
                BlockBuilder::new(self.parser.config, self.block, line_no)
            });

            if let Err(e) = builder.push(line_no, line) {
                self.done = true;
                return Some(Err(e.into()));
            }
        }

        let Some(builder) = builder else {
            self.done = true;
            return None;
        };

        self.block += 1;
        Some(Ok(builder.finish()))
    }
}

/// Accumulates the lines of one block into a record.
struct BlockBuilder {
    config: ParserConfig,
    block: usize,
    span: LineSpan,
    record: DeviceRecord,
    properties: HashMap<PropertyKey, usize>,
    attributes: HashMap<PropertyKey, usize>,
}

enum Assignment {
    Property(PropertyKey, String),
    Attribute(PropertyKey, String),
}

impl BlockBuilder {
    fn new(config: ParserConfig, block: usize, first: usize) -> Self {
        Self {
            config,
            block,
            span: LineSpan { first, last: first },
            record: DeviceRecord::empty(config.dialect),
            properties: HashMap::new(),
            attributes: HashMap::new(),
        }
    }

    fn push(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        self.span.last = line_no;

        let malformed = || ParseError::Format {
            line: line_no,
            text: line.to_string(),
        };

        let assignment = match self.config.dialect {
            Dialect::Env => line,
            Dialect::Export => match split_tagged(line).ok_or_else(malformed)? {
                (Some(tag), value) => {
                    self.record.meta.push(MetaEntry {
                        tag,
                        value: value.to_string(),
                    });
                    return Ok(());
                }
                (None, assignment) => assignment,
            },
        };

        match parse_assignment(assignment).ok_or_else(malformed)? {
            Assignment::Property(key, value) => upsert(
                &mut self.record.properties,
                &mut self.properties,
                key,
                value,
                self.config.duplicates,
            )
            .map_err(|key| self.duplicate(key.to_string(), line_no)),
            Assignment::Attribute(name, value) => upsert(
                &mut self.record.attributes,
                &mut self.attributes,
                name,
                value,
                self.config.duplicates,
            )
            .map_err(|name| self.duplicate(format!("ATTR{{{name}}}"), line_no)),
        }
    }

    const fn duplicate(&self, key: String, line: usize) -> ParseError {
        ParseError::DuplicateKey {
            key,
            block: self.block,
            line,
        }
    }

    fn finish(self) -> (LineSpan, DeviceRecord) {
        tracing::trace!(
            block = self.block,
            first = self.span.first,
            last = self.span.last,
            properties = self.record.properties.len(),
            "parsed block"
        );
        (self.span, self.record)
    }
}

/// Inserts `key`, applying the duplicate policy.
///
/// Returns the key back if it is a rejected duplicate.
fn upsert(
    entries: &mut Vec<(PropertyKey, String)>,
    index: &mut HashMap<PropertyKey, usize>,
    key: PropertyKey,
    value: String,
    policy: DuplicatePolicy,
) -> Result<(), PropertyKey> {
    match (index.get(&key), policy) {
        (None, _) => {
            index.insert(key.clone(), entries.len());
            entries.push((key, value));
            Ok(())
        }
        (Some(_), DuplicatePolicy::Reject) => Err(key),
        (Some(&position), DuplicatePolicy::LastWins) => {
            tracing::debug!(key = %key, "duplicate key, keeping last value");
            entries[position].1 = value;
            Ok(())
        }
    }
}

/// Splits a `KEY=VALUE` line on its first `=`.
///
/// `ATTR{name}==value` lines are attributes; one pair of double quotes around
/// the value is removed.
fn parse_assignment(line: &str) -> Option<Assignment> {
    let (key, value) = line.split_once('=')?;
    let key = PropertyKey::try_from(key).ok()?;

    if let Some(raw) = value.strip_prefix('=') {
        if let Some(captures) = ATTRIBUTE_KEY.captures(key.as_str()) {
            let name = PropertyKey::try_from(&captures["name"]).ok()?;
            return Some(Assignment::Attribute(name, unquote(raw).to_string()));
        }
    }

    Some(Assignment::Property(key, value.to_string()))
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Splits a `T: payload` line. The tag is `None` for `E:` property lines.
fn split_tagged(line: &str) -> Option<(Option<Tag>, &str)> {
    let mut chars = line.chars();
    let letter = chars.next()?;
    let rest = chars.as_str();

    let payload = if rest == ":" {
        ""
    } else {
        rest.strip_prefix(": ")?
    };

    if letter == 'E' {
        Some((None, payload))
    } else {
        Some((Some(Tag::from_char(letter)?), payload))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use test_case::test_case;

    use super::*;

    fn properties(record: &DeviceRecord) -> Vec<(&str, &str)> {
        record.properties().collect()
    }

    fn last_wins() -> Parser {
        Parser::new(ParserConfig {
            duplicates: DuplicatePolicy::LastWins,
            ..ParserConfig::default()
        })
    }

    #[test]
    fn two_blocks() {
        let records = Parser::default()
            .parse("ID_MODEL=Disk\nID_BUS=usb\n\nID_MODEL=Mouse\n")
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            properties(&records[0]),
            vec![("ID_MODEL", "Disk"), ("ID_BUS", "usb")]
        );
        assert_eq!(properties(&records[1]), vec![("ID_MODEL", "Mouse")]);
    }

    #[test_case(""; "empty")]
    #[test_case("\n\n"; "blank lines")]
    #[test_case("  \n\t\n"; "whitespace lines")]
    fn no_records(text: &str) {
        assert_eq!(Parser::default().parse(text).unwrap(), Vec::new());
    }

    #[test_case("A=1\nB=2", 1; "one block without trailing newline")]
    #[test_case("A=1\n\nB=2\n\nC=3\n", 3; "three blocks")]
    #[test_case("\n\nA=1\n\n\n\nB=2\n\n\n", 2; "runs of blank lines collapse")]
    #[test_case("A=1\n   \nB=2\n", 2; "whitespace line separates")]
    #[test_case("A=1\r\nB=2\r\n\r\nC=3\r\n", 2; "crlf line endings")]
    fn block_count(text: &str, expected: usize) {
        assert_eq!(Parser::default().parse(text).unwrap().len(), expected);
    }

    #[test_case("A=b\r"; "at end of input")]
    #[test_case("A=b\r\r\n"; "before crlf")]
    fn carriage_return_belongs_to_value(text: &str) {
        let expected = text.strip_suffix('\n').unwrap_or(text);
        let expected = &expected[2..];

        let records = Parser::default().parse(text).unwrap();
        assert_eq!(records[0].get("A"), Some(expected));

        let read: Vec<DeviceRecord> = Parser::default()
            .read(Cursor::new(text))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(read, records);
    }

    #[test]
    fn empty_value() {
        let records = Parser::default().parse("KEY=\n").unwrap();
        assert_eq!(properties(&records[0]), vec![("KEY", "")]);
    }

    #[test]
    fn value_is_everything_after_first_equals() {
        let records = Parser::default()
            .parse("ID_FS_LABEL= a=b \nKERNEL==\"sda\"\n")
            .unwrap();
        assert_eq!(
            properties(&records[0]),
            vec![("ID_FS_LABEL", " a=b "), ("KERNEL", "=\"sda\"")]
        );
        assert!(records[0].attributes().next().is_none());
    }

    #[test]
    fn attributes() {
        let records = Parser::default()
            .parse("ATTR{size}==\"976773168\"\nATTR{ro}==0\nATTR{x}=1\nSUBSYSTEM=block\n")
            .unwrap();
        let record = &records[0];

        assert_eq!(
            record.attributes().collect::<Vec<_>>(),
            vec![("size", "976773168"), ("ro", "0")]
        );
        assert_eq!(
            properties(record),
            vec![("ATTR{x}", "1"), ("SUBSYSTEM", "block")]
        );
    }

    #[test]
    fn malformed_line() {
        let err = Parser::default()
            .parse("ID_MODEL=Disk\n\nID_BUS=usb\nNOVALUEHERE\n")
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::Format {
                line: 4,
                text: "NOVALUEHERE".to_string()
            }
        );
        assert_eq!(err.line(), 4);
        assert_eq!(err.to_string(), "line 4: malformed line 'NOVALUEHERE'");
    }

    #[test_case("=value"; "empty key")]
    #[test_case(" KEY=value"; "leading whitespace")]
    #[test_case("MY KEY=value"; "whitespace in key")]
    fn invalid_keys(line: &str) {
        let err = Parser::default().parse(line).unwrap_err();
        assert!(matches!(err, ParseError::Format { line: 1, .. }));
    }

    #[test]
    fn records_before_error_are_yielded() {
        let mut records = Parser::default().records("A=1\n\nB\n\nC=3\n");
        assert!(records.next().unwrap().is_ok());
        assert!(records.next().unwrap().is_err());
        assert!(records.next().is_none());
        assert!(records.next().is_none());
    }

    #[test]
    fn duplicate_rejected() {
        let err = Parser::default()
            .parse("A=1\n\nB=1\nC=2\nB=3\n")
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateKey {
                key: "B".to_string(),
                block: 1,
                line: 5
            }
        );
    }

    #[test]
    fn duplicate_attribute_rejected() {
        let err = Parser::default()
            .parse("ATTR{ro}==\"0\"\nATTR{ro}==\"1\"\n")
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateKey {
                key: "ATTR{ro}".to_string(),
                block: 0,
                line: 2
            }
        );
    }

    #[test]
    fn same_name_property_and_attribute_coexist() {
        let records = Parser::default().parse("ro=1\nATTR{ro}==\"0\"\n").unwrap();
        assert_eq!(records[0].get("ro"), Some("1"));
        assert_eq!(records[0].attribute("ro"), Some("0"));
    }

    #[test]
    fn duplicate_last_wins_keeps_position() {
        let records = last_wins().parse("A=1\nB=2\nA=3\n").unwrap();
        assert_eq!(properties(&records[0]), vec![("A", "3"), ("B", "2")]);
    }

    #[test]
    fn duplicates_only_within_a_block() {
        let records = Parser::default().parse("A=1\n\nA=2\n").unwrap();
        assert_eq!(records[0].get("A"), Some("1"));
        assert_eq!(records[1].get("A"), Some("2"));
    }

    #[test]
    fn spans() {
        let spans: Vec<LineSpan> = Parser::default()
            .records("\nA=1\nB=2\n\n\nC=3\n")
            .spanned()
            .map(|result| result.unwrap().0)
            .collect();
        assert_eq!(
            spans,
            vec![
                LineSpan { first: 2, last: 3 },
                LineSpan { first: 6, last: 6 }
            ]
        );
    }

    #[test]
    fn restartable() {
        let parser = Parser::default();
        let text = "A=1\n\nB=2\n";
        let first: Vec<_> = parser.records(text).collect();
        let second: Vec<_> = parser.records(text).collect();
        assert_eq!(first, second);
    }

    const EXPORT: &str = "\
P: /devices/pci0000:00/0000:00:1f.2/ata1/host0/target0:0:0/0:0:0:0/block/sda
M: sda
U: block
T: disk
D: b 8:0
N: sda
L: 0
S: disk/by-id/wwn-0x5000c500a0b1c2d3
E: DEVPATH=/devices/pci0000:00/0000:00:1f.2/ata1/host0/target0:0:0/0:0:0:0/block/sda
E: DEVNAME=/dev/sda
E: ID_BUS=ata

P: /devices/virtual/block/loop0
N: loop0
E: DEVNAME=/dev/loop0
";

    #[test]
    fn export_dialect() {
        let records = Parser::new(ParserConfig::export()).parse(EXPORT).unwrap();
        assert_eq!(records.len(), 2);

        let sda = &records[0];
        assert_eq!(sda.dialect(), Dialect::Export);
        assert_eq!(
            sda.meta().iter().map(|e| e.tag).collect::<Vec<_>>(),
            vec![
                Tag::Devpath,
                Tag::Sysname,
                Tag::Subsystem,
                Tag::Devtype,
                Tag::DeviceNumber,
                Tag::Devnode,
                Tag::LinkPriority,
                Tag::Symlink
            ]
        );
        assert_eq!(sda.meta()[4].value, "b 8:0");
        assert_eq!(sda.get("ID_BUS"), Some("ata"));
        assert_eq!(sda.len(), 3);

        assert_eq!(records[1].devnode().as_deref(), Some("/dev/loop0"));
    }

    #[test_case("X:"; "empty payload")]
    #[test_case("Q: "; "empty payload with space")]
    fn export_empty_payload(line: &str) {
        let records = Parser::new(ParserConfig::export()).parse(line).unwrap();
        assert_eq!(records[0].meta()[0].value, "");
    }

    #[test_case("DEVNAME=/dev/sda"; "env line")]
    #[test_case("e: DEVNAME=/dev/sda"; "lowercase tag")]
    #[test_case("P:/devices"; "missing space")]
    #[test_case("E: NOVALUE"; "property without equals")]
    #[test_case("PP: x"; "long tag")]
    fn export_malformed(line: &str) {
        let err = Parser::new(ParserConfig::export())
            .parse(line)
            .unwrap_err();
        assert!(matches!(err, ParseError::Format { line: 1, .. }));
    }

    #[test]
    fn read_from_reader() {
        let records: Vec<DeviceRecord> = Parser::default()
            .read(Cursor::new("ID_MODEL=Disk\nID_BUS=usb\n\nID_MODEL=Mouse\n"))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("ID_MODEL"), Some("Mouse"));
    }

    #[test]
    fn read_reports_parse_errors() {
        let err = Parser::default()
            .read(Cursor::new("A=1\nNOVALUEHERE\n"))
            .find_map(Result::err)
            .unwrap();
        assert!(matches!(
            err,
            ReadError::Parse(ParseError::Format { line: 2, .. })
        ));
    }

    #[test]
    fn read_reports_io_errors() {
        // invalid UTF-8 surfaces as an I/O error
        let err = Parser::default()
            .read(Cursor::new(b"A=1\n\xff\xfe\n".to_vec()))
            .find_map(Result::err)
            .unwrap();
        assert!(matches!(err, ReadError::Io(_)));
    }
}
