use std::{fmt, num::NonZeroU32, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

static DM_UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:part(?P<partition>[0-9]+)-)?(?P<subsystem>[A-Za-z][A-Za-z0-9_]*)-(?P<uuid>.+)$")
        .unwrap_or_else(|e| unreachable!("invalid DM_UUID pattern: {e}"))
});

/// A device-mapper UUID, the value of the `DM_UUID` property.
///
/// Device-mapper targets prefix their UUIDs with the name of the subsystem
/// that owns them (`LVM`, `CRYPT`, `mpath`, `stratis`, ...). Partitions
/// created on top of a mapped device by `kpartx` get an additional `partN-`
/// prefix.
///
/// Examples: `LVM-Xf8tn3u0vN0t...`, `CRYPT-LUKS2-3e6be9de...-luks-3e6be9de...`,
/// `part1-mpath-3600508b400105e210000900000490000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DmUuid {
    #[serde(skip_serializing_if = "Option::is_none")]
    partition: Option<NonZeroU32>,
    subsystem: String,
    uuid: String,
}

impl DmUuid {
    /// The partition number, for `partN-` prefixed UUIDs.
    #[must_use]
    pub const fn partition(&self) -> Option<NonZeroU32> {
        self.partition
    }

    /// The owning subsystem, e.g. `LVM` or `mpath`.
    #[must_use]
    pub fn subsystem(&self) -> &str {
        &self.subsystem
    }

    /// The subsystem-specific remainder of the UUID.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }
}

impl fmt::Display for DmUuid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(partition) = self.partition {
            write!(f, "part{partition}-")?;
        }
        write!(f, "{}-{}", self.subsystem, self.uuid)
    }
}

impl FromStr for DmUuid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = DM_UUID
            .captures(s)
            .ok_or_else(|| Error::Syntax(s.to_string()))?;

        let partition = captures
            .name("partition")
            .map(|m| {
                let digits = m.as_str();
                // a leading zero would not survive `Display`
                Some(digits)
                    .filter(|digits| !digits.starts_with('0'))
                    .and_then(|digits| digits.parse::<u32>().ok())
                    .and_then(NonZeroU32::new)
                    .ok_or_else(|| Error::Partition(digits.to_string()))
            })
            .transpose()?;

        Ok(Self {
            partition,
            subsystem: captures["subsystem"].to_string(),
            uuid: captures["uuid"].to_string(),
        })
    }
}

impl TryFrom<&str> for DmUuid {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

/// Errors that can occur while parsing a `DM_UUID` value.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The value is not shaped like `[partN-]SUBSYSTEM-UUID`.
    #[error("Invalid DM_UUID: {0}")]
    Syntax(String),

    /// The partition number is zero, has a leading zero or does not fit.
    #[error("Invalid partition number in DM_UUID: {0}")]
    Partition(String),
}
