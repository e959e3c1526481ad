use std::io;

/// Errors raised while parsing device-metadata text.
///
/// Both variants carry the 1-based number of the offending line, counted
/// over the whole input.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    /// A line does not have the shape the dialect requires.
    #[error("line {line}: malformed line '{text}'")]
    Format {
        /// The line number.
        line: usize,
        /// The raw text of the line.
        text: String,
    },

    /// A key appears twice in one block and duplicates are rejected.
    #[error("line {line}: duplicate key '{key}' in block {block}")]
    DuplicateKey {
        /// The repeated key. Attributes are reported as `ATTR{name}`.
        key: String,
        /// The 0-based index of the block.
        block: usize,
        /// The line number of the repeated occurrence.
        line: usize,
    },
}

impl ParseError {
    /// The number of the line the error was detected on.
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::Format { line, .. } | Self::DuplicateKey { line, .. } => *line,
        }
    }
}

/// Errors raised while parsing device-metadata read from an I/O source.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// Reading from the source failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The text read is not valid.
    #[error(transparent)]
    Parse(#[from] ParseError),
}
