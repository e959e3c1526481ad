//! Domain models for udev device metadata.
//!
//! This module contains the device record produced by the parser, the parser
//! configuration, and structured forms of property values that are composed
//! of several parts.

/// Device records and their database entries.
pub mod record;
pub use record::{DeviceRecord, MetaEntry, Tag};

mod config;
pub use config::{Dialect, DuplicatePolicy, LoadError, ParserConfig, SaveError};

mod key;
pub use key::{InvalidKeyError, PropertyKey};

/// Device links and their `by-*` categories.
pub mod devlink;
pub use devlink::Devlink;

pub mod id_path;
pub use id_path::{IdPathParser, IdPathSegment, SegmentKind};

/// PCI addresses.
pub mod pci;
pub use pci::PciAddress;

/// Device-mapper UUIDs.
pub mod dm_uuid;
pub use dm_uuid::DmUuid;
