//! Reading and writing device-metadata text.
//!
//! Input is organised in blocks separated by blank lines, one block per
//! device. [`Parser`] turns such text into [`DeviceRecord`]s and the
//! [`fmt::Display`](std::fmt::Display) implementation of `DeviceRecord` turns
//! them back into text.
//!
//! [`DeviceRecord`]: crate::DeviceRecord

mod error;
mod parse;
mod write;

pub use error::{ParseError, ReadError};
pub use parse::{LineSpan, Parser, ReadRecords, Records, Spanned};
pub use write::{write_record, write_records};
