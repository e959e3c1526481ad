//! Parsing of udev device metadata
//!
//! Device metadata is captured as blank-line separated blocks of text, one
//! block per device. This crate parses such dumps into [`DeviceRecord`]s,
//! writes records back out, and parses the composite values found in udev
//! properties (`ID_PATH`, `DEVLINKS`, `DM_UUID`, PCI addresses).

pub mod domain;
pub use domain::{
    Devlink, DeviceRecord, Dialect, DmUuid, DuplicatePolicy, IdPathParser, PciAddress,
    ParserConfig, PropertyKey,
};

/// Reading and writing device-metadata text.
pub mod format;
pub use format::{ParseError, Parser, ReadError};

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The numeric components of [`VERSION`].
pub const VERSION_INFO: VersionInfo = VersionInfo {
    major: parse_component(env!("CARGO_PKG_VERSION_MAJOR")),
    minor: parse_component(env!("CARGO_PKG_VERSION_MINOR")),
    patch: parse_component(env!("CARGO_PKG_VERSION_PATCH")),
};

/// A semantic version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionInfo {
    /// Incremented for incompatible changes.
    pub major: u64,
    /// Incremented for compatible additions.
    pub minor: u64,
    /// Incremented for fixes.
    pub patch: u64,
}

const fn parse_component(s: &str) -> u64 {
    let bytes = s.as_bytes();
    let mut value = 0;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0') as u64;
        i += 1;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
        assert_eq!(
            VERSION,
            format!(
                "{}.{}.{}",
                VERSION_INFO.major, VERSION_INFO.minor, VERSION_INFO.patch
            )
        );
    }
}
