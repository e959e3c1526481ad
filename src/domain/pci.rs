use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<domain>[[:xdigit:]]{4,8}):(?P<bus>[[:xdigit:]]{2}):(?P<device>[[:xdigit:]]{2})\.(?P<function>[0-7])$",
    )
    .unwrap_or_else(|e| unreachable!("invalid PCI address pattern: {e}"))
});

/// A PCI address as found in the `sys_name` of devices on the `pci` bus and
/// inside `ID_PATH` values, e.g. `0000:00:1f.2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PciAddress {
    domain: u32,
    bus: u8,
    device: u8,
    function: u8,
}

impl PciAddress {
    /// The names of the components of an address, in textual order.
    pub const KEYS: [&'static str; 4] = ["domain", "bus", "device", "function"];

    /// Creates an address from its components.
    ///
    /// # Errors
    ///
    /// Returns an error if `device` is not below 32 or `function` is not
    /// below 8.
    pub const fn new(domain: u32, bus: u8, device: u8, function: u8) -> Result<Self, Error> {
        if device >= 0x20 {
            return Err(Error::Device(device));
        }
        if function >= 8 {
            return Err(Error::Function(function));
        }
        Ok(Self {
            domain,
            bus,
            device,
            function,
        })
    }

    /// The PCI domain (segment).
    #[must_use]
    pub const fn domain(&self) -> u32 {
        self.domain
    }

    /// The bus number.
    #[must_use]
    pub const fn bus(&self) -> u8 {
        self.bus
    }

    /// The device (slot) number.
    #[must_use]
    pub const fn device(&self) -> u8 {
        self.device
    }

    /// The function number.
    #[must_use]
    pub const fn function(&self) -> u8 {
        self.function
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

impl FromStr for PciAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = ADDRESS
            .captures(s)
            .ok_or_else(|| Error::Syntax(s.to_string()))?;

        // the pattern bounds every component, so only the range checks in
        // `new` can fail from here on
        let hex = |name: &str| u32::from_str_radix(&captures[name], 16).unwrap_or_default();
        let domain = hex("domain");
        let bus = u8::try_from(hex("bus")).unwrap_or_default();
        let device = u8::try_from(hex("device")).unwrap_or_default();
        let function = u8::try_from(hex("function")).unwrap_or_default();

        Self::new(domain, bus, device, function)
    }
}

impl TryFrom<&str> for PciAddress {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}

/// Errors that can occur while parsing or constructing a PCI address.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The text is not shaped like `DDDD:BB:DD.F`.
    #[error("Invalid PCI address: {0}")]
    Syntax(String),

    /// Device numbers are five bits wide.
    #[error("Invalid PCI device number {0:#04x}: must be below 0x20")]
    Device(u8),

    /// Function numbers are three bits wide.
    #[error("Invalid PCI function number {0}: must be below 8")]
    Function(u8),
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("0000:00:1f.2", 0, 0, 0x1f, 2; "sata controller")]
    #[test_case("0000:03:00.0", 0, 3, 0, 0; "function zero")]
    #[test_case("0001:af:1e.7", 1, 0xaf, 0x1e, 7; "non zero domain")]
    #[test_case("10000:e1:00.0", 0x10000, 0xe1, 0, 0; "vmd domain")]
    #[test_case("0000:0A:1F.3", 0, 0x0a, 0x1f, 3; "uppercase hex")]
    fn parse(s: &str, domain: u32, bus: u8, device: u8, function: u8) {
        let address: PciAddress = s.parse().unwrap();
        assert_eq!(address.domain(), domain);
        assert_eq!(address.bus(), bus);
        assert_eq!(address.device(), device);
        assert_eq!(address.function(), function);
    }

    #[test]
    fn display_is_canonical() {
        let address: PciAddress = "0000:0A:1F.3".parse().unwrap();
        assert_eq!(address.to_string(), "0000:0a:1f.3");

        let address: PciAddress = "0000:00:1f.2".parse().unwrap();
        assert_eq!(address.to_string().parse::<PciAddress>().unwrap(), address);
    }

    #[test_case(""; "empty")]
    #[test_case("0000_09_00_0"; "underscores")]
    #[test_case("00:1f.2"; "missing domain")]
    #[test_case("0000:00:1f"; "missing function")]
    #[test_case("0000:00:1f.8"; "function out of range")]
    #[test_case("0000:00:1f.2-ata-1"; "trailing text")]
    fn syntax_errors(s: &str) {
        assert!(matches!(PciAddress::from_str(s), Err(Error::Syntax(_))));
    }

    #[test]
    fn device_out_of_range() {
        assert_eq!(PciAddress::from_str("0000:00:20.0"), Err(Error::Device(0x20)));
        assert_eq!(PciAddress::new(0, 0, 0x1f, 8), Err(Error::Function(8)));
    }
}
