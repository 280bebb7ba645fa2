use std::fmt;

use crate::error::{Error, Result};

/// A RAMSES-II device address.
///
/// The on-air form is a 24-bit integer, `(type << 18) | serial`; the text form
/// is the 9-character `TT:NNNNNN` used on the gateway's ASCII line protocol.
/// Two sentinel values exist: [`Address::NON`] (`--:------`, an unused address
/// slot) and [`Address::NUL`] (`63:262142`, the null/broadcast device).
///
/// # Examples
///
/// ```rust
/// use ramses_rf::Address;
///
/// let addr: Address = "01:145038".parse().unwrap();
/// assert_eq!(1, addr.dev_type());
/// assert_eq!(145038, addr.serial());
/// assert_eq!("06368E", addr.to_hex());
/// assert_eq!(addr, Address::from_hex("06368E").unwrap());
/// ```
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Address(u32);

impl Address {
    /// The "no device" sentinel, `--:------`.
    pub const NON: Address = Address(0xFF_FFFF);

    /// The null device, `63:262142` (hex `FFFFFE`).
    pub const NUL: Address = Address(0xFF_FFFE);

    /// The default address of the host gateway interface, `18:000730`.
    pub const HGI: Address = Address((18 << 18) | 730);

    /// Constructs an `Address` from a device type and serial number.
    pub fn new(dev_type: u8, serial: u32) -> Address {
        debug_assert!(dev_type < 0x40 && serial < 0x40000);
        Address((u32::from(dev_type) << 18) | (serial & 0x3_FFFF))
    }

    /// Converts the 6-hex-digit on-air form, e.g. `"06368E"` to `01:145038`.
    ///
    /// An empty (or all-blank) string converts to [`Address::NON`].
    pub fn from_hex(hex_id: &str) -> Result<Address> {
        if hex_id.trim().is_empty() {
            return Ok(Address::NON);
        }
        let value = u32::from_str_radix(hex_id, 16)
            .map_err(|_| Error::MalformedLine(format!("invalid device hex id: {hex_id:?}")))?;
        if value > 0xFF_FFFF {
            return Err(Error::MalformedLine(format!(
                "invalid device hex id: {hex_id:?}"
            )));
        }
        Ok(Address(value))
    }

    /// Converts to the 6-hex-digit on-air form, e.g. `01:145038` to `"06368E"`.
    pub fn to_hex(self) -> String {
        format!("{:06X}", self.0)
    }

    /// Returns the two-digit device type, e.g. `1` for a controller.
    ///
    /// The [`Address::NON`] sentinel has no real type and reports `0x3F`.
    pub fn dev_type(self) -> u8 {
        ((self.0 >> 18) & 0x3F) as u8
    }

    /// Returns the 18-bit serial number.
    pub fn serial(self) -> u32 {
        self.0 & 0x3_FFFF
    }

    /// Returns `true` for the `--:------` sentinel.
    pub fn is_non_device(self) -> bool {
        self == Address::NON
    }

    /// Returns `true` for the `63:262142` null device.
    pub fn is_nul_device(self) -> bool {
        self == Address::NUL
    }

    /// Returns `true` if this address names a real device (neither sentinel).
    pub fn is_device(self) -> bool {
        !self.is_non_device() && !self.is_nul_device()
    }

    /// Returns `true` for a controller address (type `01` or `23`).
    pub fn is_controller(self) -> bool {
        matches!(self.dev_type(), 1 | 23)
    }

    /// Returns `true` for a host gateway address (type `18`).
    pub fn is_gateway(self) -> bool {
        self.dev_type() == 18
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    /// Parses the 9-character `TT:NNNNNN` form (or the `--:------` sentinel).
    fn from_str(s: &str) -> Result<Address> {
        let invalid = || Error::MalformedLine(format!("invalid device id: {s:?}"));

        if s == "--:------" {
            return Ok(Address::NON);
        }
        let (dev_type, serial) = s.split_once(':').ok_or_else(invalid)?;
        if dev_type.len() != 2 || serial.len() != 6 {
            return Err(invalid());
        }
        let dev_type: u8 = dev_type.parse().map_err(|_| invalid())?;
        let serial: u32 = serial.parse().map_err(|_| invalid())?;
        if dev_type > 0x3F || serial > 0x3_FFFF {
            return Err(invalid());
        }
        Ok(Address::new(dev_type, serial))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_non_device() {
            write!(f, "--:------")
        } else {
            write!(f, "{:02}:{:06}", self.dev_type(), self.serial())
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let addr: Address = "01:145038".parse().unwrap();
        assert_eq!(1, addr.dev_type());
        assert_eq!(145038, addr.serial());
        assert_eq!(true, addr.is_controller());
        assert_eq!(false, addr.is_gateway());

        let addr: Address = "--:------".parse().unwrap();
        assert_eq!(Address::NON, addr);
        assert_eq!(false, addr.is_device());

        let addr: Address = "63:262142".parse().unwrap();
        assert_eq!(Address::NUL, addr);
        assert_eq!(false, addr.is_device());

        let addr: Address = "18:000730".parse().unwrap();
        assert_eq!(Address::HGI, addr);
        assert_eq!(true, addr.is_gateway());

        assert!("01:45038".parse::<Address>().is_err());
        assert!("1:145038".parse::<Address>().is_err());
        assert!("01-145038".parse::<Address>().is_err());
        assert!("XX:145038".parse::<Address>().is_err());
        assert!("01:999999".parse::<Address>().is_err());
        assert!("".parse::<Address>().is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        for id in ["01:145038", "13:237335", "04:056057", "07:045960", "63:262142"] {
            let addr: Address = id.parse().unwrap();
            assert_eq!(addr, Address::from_hex(&addr.to_hex()).unwrap());
        }

        assert_eq!("06368E", "01:145038".parse::<Address>().unwrap().to_hex());
        assert_eq!("FFFFFE", Address::NUL.to_hex());
        assert_eq!(Address::NON, Address::from_hex("").unwrap());
        assert_eq!(Address::NON, Address::from_hex("      ").unwrap());

        assert!(Address::from_hex("GGGGGG").is_err());
        assert!(Address::from_hex("1234567").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!("01:145038", "01:145038".parse::<Address>().unwrap().to_string());
        assert_eq!("--:------", Address::NON.to_string());
        assert_eq!("63:262142", Address::NUL.to_string());
        assert_eq!("18:000730", Address::HGI.to_string());
    }
}
