use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Serialize, Serializer, ser::SerializeStruct};

static CATEGORISED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/dev/(?:[^/]+/)*(?P<category>by-[^/]+)/(?P<value>[^/]+)$")
        .unwrap_or_else(|e| unreachable!("invalid devlink pattern: {e}"))
});

/// A device link, i.e. one of the symlinks udev maintains for a device.
///
/// Links that live directly in a `by-*` directory, such as
/// `/dev/disk/by-id/wwn-0x5000c500a0b1c2d3`, are categorised: the category is
/// the directory name (`by-id`) and the value is the link name. Any other
/// link (`/dev/cdrom`, `/dev/mapper/root`) has neither.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Devlink {
    path: String,
    /// Byte range of the category within `path`.
    category: Option<(usize, usize)>,
}

impl Devlink {
    /// Interprets `path` as a device link.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let category = CATEGORISED.captures(&path).and_then(|captures| {
            let category = captures.name("category")?;
            Some((category.start(), category.end()))
        });
        Self { path, category }
    }

    /// The full path of the link.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The `by-*` category, if the link has one.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.map(|(start, end)| &self.path[start..end])
    }

    /// The link name within its category, present exactly when
    /// [`Self::category`] is.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        // the value is everything after the category's trailing '/'
        self.category.map(|(_, end)| &self.path[end + 1..])
    }
}

impl fmt::Display for Devlink {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl Serialize for Devlink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Devlink", 3)?;
        state.serialize_field("path", &self.path)?;
        state.serialize_field("category", &self.category())?;
        state.serialize_field("value", &self.value())?;
        state.end()
    }
}

impl From<&str> for Devlink {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
