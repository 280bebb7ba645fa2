use std::collections::HashMap;

use chrono::NaiveDateTime;
use log::debug;

use crate::{
    address::Address,
    error::{Error, Result},
    parsers::{Payload, Temp},
};

/// A typed handle into the gateway's device arena.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DeviceIx(pub usize);

/// The role a device plays, derived from its address type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceKind {
    /// `01`/`23` - a controller (or wired programmer) that owns a system.
    Controller,
    /// `02` - an underfloor heating controller (HCE80).
    UfhController,
    /// `03`/`12`/`22`/`34` - a room thermostat.
    Thermostat,
    /// `04` - a radiator valve (HR92).
    TrvActuator,
    /// `07` - a stored hot water sensor (CS92).
    DhwSensor,
    /// `10` - an OpenTherm bridge (R8810).
    OtbBridge,
    /// `13` - a wireless relay (BDR91).
    BdrSwitch,
    /// `18` - the host gateway interface (HGI80).
    Gateway,
    /// Anything else.
    Unknown,
}

impl DeviceKind {
    /// Derives the kind from a device type.
    pub fn from_dev_type(dev_type: u8) -> DeviceKind {
        match dev_type {
            1 | 23 => DeviceKind::Controller,
            2 => DeviceKind::UfhController,
            3 | 12 | 22 | 34 => DeviceKind::Thermostat,
            4 => DeviceKind::TrvActuator,
            7 => DeviceKind::DhwSensor,
            10 => DeviceKind::OtbBridge,
            13 => DeviceKind::BdrSwitch,
            18 => DeviceKind::Gateway,
            _ => DeviceKind::Unknown,
        }
    }
}

/// Returns the three-letter display code of a device type, e.g. `CTL`.
pub fn type_code(dev_type: u8) -> &'static str {
    match dev_type {
        0 => "TRv",
        1 => "CTL",
        2 => "UFC",
        3 => "STa",
        4 => "TRV",
        7 => "DHW",
        10 => "OTB",
        12 => "THm",
        13 => "BDR",
        17 => " 17",
        18 => "HGI",
        22 => "THM",
        23 => "PRG",
        30 => "GWY",
        34 => "STA",
        63 => "NUL",
        _ => "---",
    }
}

/// Returns the product description of a device type.
pub fn type_description(dev_type: u8) -> &'static str {
    match dev_type {
        1 => "Controller",
        2 => "UFH Controller",
        3 => "Room Sensor/Stat",
        4 => "Radiator Valve",
        7 => "DHW Sensor",
        10 => "OpenTherm Bridge",
        13 => "Wireless Relay",
        12 | 22 => "Room Thermostat",
        18 => "Honeywell Gateway",
        23 => "Programmer (wired)",
        30 => "Internet Gateway",
        34 => "Round Thermostat",
        63 => "Null Device",
        _ => "Unknown",
    }
}

/// Returns `true` for battery-powered device types (which won't answer RQs).
pub fn has_battery(dev_type: u8) -> bool {
    matches!(dev_type, 0 | 3 | 4 | 7 | 12 | 22 | 34)
}

/// Returns `true` for device types usable as a zone sensor.
pub fn has_zone_sensor(dev_type: u8) -> bool {
    matches!(dev_type, 0 | 3 | 4 | 12 | 22 | 34)
}

/// The codes a device of the given type will answer, for routine polling.
pub fn poll_codes(dev_type: u8) -> &'static [u16] {
    match dev_type {
        1 => &[0x000C, 0x10E0, 0x1100, 0x313F],
        10 => &[
            0x0008, 0x10A0, 0x1100, 0x1260, 0x1290, 0x22D9, 0x3150, 0x3220, 0x3EF0, 0x3EF1,
        ],
        13 => &[0x0008, 0x1100, 0x3EF1],
        _ => &[0x0016, 0x1FC9],
    }
}

/// The cached hardware info of a device (code `10E0`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HardwareInfo {
    /// The model description.
    pub description: Option<String>,
    /// The firmware date.
    pub firmware: Option<chrono::NaiveDate>,
    /// The manufacture date.
    pub manufactured: Option<chrono::NaiveDate>,
}

/// A device of the installation, created on first observation.
///
/// The role-specific state fields are the union over all device kinds; each
/// is updated only from the codes that carry it, and reads as `None` until
/// first observed.
#[derive(Debug)]
pub struct Device {
    /// The device address.
    pub addr: Address,

    /// The device kind, from the address type.
    pub kind: DeviceKind,

    /// The parent controller, once learned.
    pub ctl: Option<DeviceIx>,

    /// The parent zone index, once learned.
    pub zone_idx: Option<u8>,

    /// The system domain (`F9`/`FA`/`FC`) the device serves, if any.
    pub domain_id: Option<u8>,

    /// A friendly name from the known-devices map.
    pub friendly_name: Option<String>,

    /// Whether the known-devices map flags the device as ignored.
    pub ignored: bool,

    /// Whether the battery is low (code `1060`).
    pub battery_low: Option<bool>,

    /// The battery charge level, if reported (code `1060`).
    pub battery_level: Option<f64>,

    /// The device's own setpoint (code `2309`).
    pub setpoint: Option<Temp>,

    /// The device's own temperature (code `30C9`).
    pub temperature: Option<Temp>,

    /// When the temperature was last reported (used for sensor matching).
    pub temperature_dtm: Option<NaiveDateTime>,

    /// The heat demand (code `3150`).
    pub heat_demand: Option<f64>,

    /// The window-open state (code `12B0`).
    pub window_open: Option<bool>,

    /// The relay demand (code `0008`).
    pub relay_demand: Option<f64>,

    /// Whether the actuator is enabled (codes `3EF0`/`3EF1`).
    pub actuator_enabled: Option<bool>,

    /// The modulation level (codes `3EF0`/`3EF1`).
    pub modulation_level: Option<f64>,

    /// The boiler setpoint (code `22D9`, OpenTherm bridges).
    pub boiler_setpoint: Option<Temp>,

    /// The cached OpenTherm replies, by message id (code `3220`).
    pub opentherm: HashMap<u8, Payload>,

    /// The cached hardware info (code `10E0`).
    pub hardware_info: Option<HardwareInfo>,

    /// The UFH circuit to zone mapping (code `000C`, UFH controllers).
    pub ufh_circuits: HashMap<u8, u8>,
}

impl Device {
    /// Constructs a `Device` for an address.
    pub fn new(addr: Address) -> Device {
        debug!("Creating a device: {addr}");
        Device {
            addr,
            kind: DeviceKind::from_dev_type(addr.dev_type()),
            ctl: None,
            zone_idx: None,
            domain_id: None,
            friendly_name: None,
            ignored: false,
            battery_low: None,
            battery_level: None,
            setpoint: None,
            temperature: None,
            temperature_dtm: None,
            heat_demand: None,
            window_open: None,
            relay_demand: None,
            actuator_enabled: None,
            modulation_level: None,
            boiler_setpoint: None,
            opentherm: HashMap::new(),
            hardware_info: None,
            ufh_circuits: HashMap::new(),
        }
    }

    /// Returns `true` for controllers (and wired programmers).
    pub fn is_controller(&self) -> bool {
        self.kind == DeviceKind::Controller
    }

    /// Sets the device's parent controller, after validating it.
    ///
    /// A device's controller, once learned, may not silently change.
    pub fn set_ctl(&mut self, ctl: DeviceIx) -> Result<()> {
        match self.ctl {
            None => {
                debug!("Device {}: controller now set", self.addr);
                self.ctl = Some(ctl);
                Ok(())
            }
            Some(existing) if existing == ctl => Ok(()),
            Some(_) => Err(Error::CorruptState(format!(
                "device {} has changed controller",
                self.addr
            ))),
        }
    }

    /// Sets the device's parent zone, after validating it.
    pub fn set_zone_idx(&mut self, zone_idx: u8) -> Result<()> {
        match self.zone_idx {
            None => {
                debug!("Device {}: parent zone now set to {zone_idx:02X}", self.addr);
                self.zone_idx = Some(zone_idx);
                Ok(())
            }
            Some(existing) if existing == zone_idx => Ok(()),
            Some(existing) => Err(Error::CorruptState(format!(
                "device {} has a mismatched parent zone: old={existing:02X}, new={zone_idx:02X}",
                self.addr
            ))),
        }
    }

    /// Returns the display name: the friendly name if there is one, else
    /// `CTL:145038` style.
    pub fn display_name(&self) -> String {
        match &self.friendly_name {
            Some(name) => name.clone(),
            None => format!(
                "{}:{:06}",
                type_code(self.addr.dev_type()),
                self.addr.serial()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        assert_eq!(
            DeviceKind::Controller,
            DeviceKind::from_dev_type("01:145038".parse::<Address>().unwrap().dev_type())
        );
        assert_eq!(DeviceKind::Controller, DeviceKind::from_dev_type(23));
        assert_eq!(DeviceKind::Thermostat, DeviceKind::from_dev_type(34));
        assert_eq!(DeviceKind::BdrSwitch, DeviceKind::from_dev_type(13));
        assert_eq!(DeviceKind::Unknown, DeviceKind::from_dev_type(63));
    }

    #[test]
    fn test_set_ctl() {
        let mut dev = Device::new("04:056057".parse().unwrap());

        dev.set_ctl(DeviceIx(0)).unwrap();
        dev.set_ctl(DeviceIx(0)).unwrap();
        assert!(matches!(
            dev.set_ctl(DeviceIx(1)),
            Err(Error::CorruptState(_))
        ));
    }

    #[test]
    fn test_set_zone_idx() {
        let mut dev = Device::new("04:056057".parse().unwrap());

        dev.set_zone_idx(2).unwrap();
        dev.set_zone_idx(2).unwrap();
        assert!(matches!(dev.set_zone_idx(3), Err(Error::CorruptState(_))));
    }

    #[test]
    fn test_display_name() {
        let mut dev = Device::new("01:145038".parse().unwrap());
        assert_eq!("CTL:145038", dev.display_name());

        dev.friendly_name = Some("Main controller".to_string());
        assert_eq!("Main controller", dev.display_name());
    }

    #[test]
    fn test_type_tables() {
        assert_eq!("TRV", type_code(4));
        assert_eq!("Radiator Valve", type_description(4));
        assert_eq!(true, has_battery(4));
        assert_eq!(true, has_zone_sensor(4));
        assert_eq!(false, has_battery(13));
        assert_eq!(false, has_zone_sensor(7));
        assert_eq!(&[0x0008, 0x1100, 0x3EF1], poll_codes(13));
        assert_eq!(&[0x0016, 0x1FC9], poll_codes(34));
    }
}
