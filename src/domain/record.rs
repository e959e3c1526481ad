use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::domain::{Devlink, Dialect, PropertyKey};

/// The tag of a non-property line in the `udevadm` database format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `P:` the devpath below `/sys`.
    Devpath,
    /// `N:` the device node, relative to `/dev`.
    Devnode,
    /// `S:` a symlink to the device node, relative to `/dev`.
    Symlink,
    /// `L:` the symlink priority.
    LinkPriority,
    /// `M:` the kernel's name for the device.
    Sysname,
    /// `U:` the subsystem.
    Subsystem,
    /// `T:` the device type.
    Devtype,
    /// `D:` block or character device, with its major and minor numbers.
    DeviceNumber,
    /// Any other single uppercase letter.
    Other(char),
}

impl Tag {
    /// Interprets a tag letter.
    ///
    /// `E` is reserved for properties and is not a `Tag`.
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'P' => Self::Devpath,
            'N' => Self::Devnode,
            'S' => Self::Symlink,
            'L' => Self::LinkPriority,
            'M' => Self::Sysname,
            'U' => Self::Subsystem,
            'T' => Self::Devtype,
            'D' => Self::DeviceNumber,
            'E' => return None,
            c if c.is_ascii_uppercase() => Self::Other(c),
            _ => return None,
        })
    }

    /// The tag letter.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Devpath => 'P',
            Self::Devnode => 'N',
            Self::Symlink => 'S',
            Self::LinkPriority => 'L',
            Self::Sysname => 'M',
            Self::Subsystem => 'U',
            Self::Devtype => 'T',
            Self::DeviceNumber => 'D',
            Self::Other(c) => c,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.as_char())
    }
}

/// A tagged database entry, e.g. `S: disk/by-id/wwn-0x5000c500a0b1c2d3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaEntry {
    /// The entry's tag.
    pub tag: Tag,
    /// Everything after `T: `.
    pub value: String,
}

/// One parsed device-metadata block.
///
/// A record is built by the parser and never changes afterwards. Properties,
/// attributes and database entries each keep the order in which they were
/// read, so that serializing a record reproduces its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub(crate) dialect: Dialect,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) meta: Vec<MetaEntry>,
    #[serde(serialize_with = "ordered_map")]
    pub(crate) properties: Vec<(PropertyKey, String)>,
    #[serde(serialize_with = "ordered_map", skip_serializing_if = "Vec::is_empty")]
    pub(crate) attributes: Vec<(PropertyKey, String)>,
}

impl DeviceRecord {
    pub(crate) const fn empty(dialect: Dialect) -> Self {
        Self {
            dialect,
            meta: Vec::new(),
            properties: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// The dialect the record was read in, and is written back in.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The value of a property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        lookup(&self.properties, name)
    }

    /// The value of a sysfs attribute (an `ATTR{name}==` line).
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        lookup(&self.attributes, name)
    }

    /// Properties in the order they were read.
    pub fn properties(&self) -> impl ExactSizeIterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Attributes in the order they were read.
    pub fn attributes(&self) -> impl ExactSizeIterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Database entries other than properties, in the order they were read.
    ///
    /// Always empty for records read in the [`Dialect::Env`] dialect.
    #[must_use]
    pub fn meta(&self) -> &[MetaEntry] {
        &self.meta
    }

    /// The number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the record has no properties.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    fn first_meta(&self, tag: Tag) -> Option<&str> {
        self.meta
            .iter()
            .find(|entry| entry.tag == tag)
            .map(|entry| entry.value.as_str())
    }

    /// The devpath, from a `P:` entry or the `DEVPATH` property.
    #[must_use]
    pub fn devpath(&self) -> Option<&str> {
        self.first_meta(Tag::Devpath)
            .or_else(|| self.get("DEVPATH"))
    }

    /// The subsystem, from a `U:` entry or the `SUBSYSTEM` property.
    #[must_use]
    pub fn subsystem(&self) -> Option<&str> {
        self.first_meta(Tag::Subsystem)
            .or_else(|| self.get("SUBSYSTEM"))
    }

    /// The absolute device node path, from an `N:` entry or the `DEVNAME`
    /// property.
    #[must_use]
    pub fn devnode(&self) -> Option<String> {
        self.first_meta(Tag::Devnode)
            .map(|node| format!("/dev/{node}"))
            .or_else(|| self.get("DEVNAME").map(ToString::to_string))
    }

    /// The device's links.
    ///
    /// Taken from `S:` entries when there are any, otherwise from the space
    /// separated `DEVLINKS` property.
    #[must_use]
    pub fn devlinks(&self) -> Vec<Devlink> {
        let symlinks: Vec<Devlink> = self
            .meta
            .iter()
            .filter(|entry| entry.tag == Tag::Symlink)
            .map(|entry| Devlink::new(format!("/dev/{}", entry.value)))
            .collect();

        if !symlinks.is_empty() {
            return symlinks;
        }

        self.get("DEVLINKS")
            .map(|links| links.split_whitespace().map(Devlink::from).collect())
            .unwrap_or_default()
    }
}

fn lookup<'a>(entries: &'a [(PropertyKey, String)], name: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|(k, _)| k.as_str() == name)
        .map(|(_, v)| v.as_str())
}

fn ordered_map<S: Serializer>(
    entries: &[(PropertyKey, String)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (k, v) in entries {
        map.serialize_entry(k, v)?;
    }
    map.end()
}
