use chrono::NaiveDateTime;
use log::debug;

use crate::{
    device::DeviceIx,
    error::{Error, Result},
    parsers::{Temp, ZoneConfigRec, ZoneMode},
    schedule::{FragmentAssembly, Schedule},
};

/// The heating type of a zone.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ZoneKind {
    /// Radiators controlled by HR92s or HR80s (calls for heat).
    Radiator,
    /// Underfloor heating controlled by an HCE80 (calls for heat).
    Ufh,
    /// A small electric load controlled by a BDR91 (never calls for heat).
    Electric,
    /// A motorised valve controlled by a BDR91 (calls for heat).
    Valve,
    /// A modulating valve controlled by an HM80 (calls for heat).
    Mix,
}

impl ZoneKind {
    /// The snake_case name used in the installation schema.
    pub fn slug(self) -> &'static str {
        match self {
            ZoneKind::Radiator => "radiator_valve",
            ZoneKind::Ufh => "underfloor_heating",
            ZoneKind::Electric => "electric_heat",
            ZoneKind::Valve => "zone_valve",
            ZoneKind::Mix => "mixing_valve",
        }
    }

    /// Parses a schema slug.
    pub fn from_slug(slug: &str) -> Option<ZoneKind> {
        match slug {
            "radiator_valve" => Some(ZoneKind::Radiator),
            "underfloor_heating" => Some(ZoneKind::Ufh),
            "electric_heat" => Some(ZoneKind::Electric),
            "zone_valve" => Some(ZoneKind::Valve),
            "mixing_valve" => Some(ZoneKind::Mix),
            _ => None,
        }
    }

    /// Maps the zone-type byte of a `0005`/`000C` payload.
    pub fn from_type_byte(byte: u8) -> Option<ZoneKind> {
        match byte {
            0x08 => Some(ZoneKind::Radiator),
            0x09 => Some(ZoneKind::Ufh),
            0x0A => Some(ZoneKind::Valve),
            0x0B => Some(ZoneKind::Mix),
            0x11 => Some(ZoneKind::Electric),
            _ => None,
        }
    }

    /// Infers a kind from an actuator's device type, for eavesdropping.
    pub fn from_actuator_type(dev_type: u8) -> Option<ZoneKind> {
        match dev_type {
            2 => Some(ZoneKind::Ufh),
            4 => Some(ZoneKind::Radiator),
            13 => Some(ZoneKind::Electric),
            _ => None,
        }
    }
}

/// A zone's mode, as reported on code `2349`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoneModeInfo {
    /// The override mode.
    pub mode: ZoneMode,
    /// The setpoint.
    pub setpoint: Option<Temp>,
    /// The end of a temporary override.
    pub until: Option<NaiveDateTime>,
}

/// One heating zone of a system.
#[derive(Debug, Default)]
pub struct Zone {
    /// The zone index, `00..MAX_ZONES-1`.
    pub idx: u8,

    /// The heating type, once known.
    pub kind: Option<ZoneKind>,

    /// The display name (code `0004`).
    pub name: Option<String>,

    /// The temperature sensor, once known.
    pub sensor: Option<DeviceIx>,

    /// The actuator devices (code `000C`).
    pub devices: Vec<DeviceIx>,

    /// The setpoint (codes `2309`/`2349`).
    pub setpoint: Option<Temp>,

    /// The measured temperature (code `30C9`, from the controller).
    pub temperature: Option<Temp>,

    /// The configuration block (code `000A`).
    pub config: Option<ZoneConfigRec>,

    /// The mode (code `2349`).
    pub mode: Option<ZoneModeInfo>,

    /// The window-open state (code `12B0`).
    pub window_open: Option<bool>,

    /// The heat demand (code `3150`).
    pub heat_demand: Option<f64>,

    /// The lazily-fetched weekly schedule (code `0404`).
    pub schedule: Option<Schedule>,

    /// When the schedule was last assembled.
    pub schedule_dtm: Option<NaiveDateTime>,

    /// The in-progress schedule fragment transfer.
    pub schedule_assembly: FragmentAssembly,
}

impl Zone {
    /// Constructs a `Zone` with the given index.
    pub fn new(idx: u8) -> Zone {
        debug!("Creating a zone: {idx:02X}");
        Zone {
            idx,
            ..Zone::default()
        }
    }

    /// Sets the zone's heating type, after validating it.
    ///
    /// An electric zone may turn out to be a zone-valve zone (both are a
    /// BDR91; only the latter calls for heat); any other change is a
    /// corrupt-state fault.
    pub fn set_kind(&mut self, kind: ZoneKind) -> Result<()> {
        match self.kind {
            None => {
                debug!("Zone {:02X}: type now set to {}", self.idx, kind.slug());
                self.kind = Some(kind);
                Ok(())
            }
            Some(existing) if existing == kind => Ok(()),
            Some(ZoneKind::Electric) if kind == ZoneKind::Valve => {
                self.kind = Some(ZoneKind::Valve);
                Ok(())
            }
            Some(existing) => Err(Error::CorruptState(format!(
                "zone {:02X} has a mismatched type: old={}, new={}",
                self.idx,
                existing.slug(),
                kind.slug()
            ))),
        }
    }

    /// Sets the zone's sensor, after validating it.
    pub fn set_sensor(&mut self, sensor: DeviceIx) -> Result<()> {
        match self.sensor {
            None => {
                debug!("Zone {:02X}: sensor now set", self.idx);
                self.sensor = Some(sensor);
                Ok(())
            }
            Some(existing) if existing == sensor => Ok(()),
            Some(_) => Err(Error::CorruptState(format!(
                "zone {:02X} sensor changed",
                self.idx
            ))),
        }
    }

    /// Adds an actuator device, ignoring duplicates.
    pub fn add_device(&mut self, device: DeviceIx) {
        if !self.devices.contains(&device) {
            self.devices.push(device);
        }
    }
}

/// The DHW parameters, as reported on code `10A0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DhwParamsInfo {
    /// The setpoint, 30.0-85.0 C.
    pub setpoint: Option<Temp>,
    /// The overrun, 0-10 minutes.
    pub overrun: Option<u8>,
    /// The differential, 1.0-10.0 C.
    pub differential: Option<Temp>,
}

/// The DHW mode, as reported on code `1F41`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DhwModeInfo {
    /// Whether the stored hot water is on.
    pub active: Option<bool>,
    /// The override mode.
    pub mode: Option<ZoneMode>,
    /// The end of a temporary override.
    pub until: Option<NaiveDateTime>,
}

/// The stored hot water of a system: a distinguished zone with domain `FA`.
#[derive(Debug, Default)]
pub struct DhwZone {
    /// The DHW temperature sensor (`07:`), once known.
    pub sensor: Option<DeviceIx>,

    /// The hot-water valve relay (`13:`), once known.
    pub hotwater_valve: Option<DeviceIx>,

    /// The heating valve relay (`13:`), once known.
    pub heating_valve: Option<DeviceIx>,

    /// The stored water temperature (code `1260`).
    pub temperature: Option<Temp>,

    /// The DHW parameters (code `10A0`).
    pub params: Option<DhwParamsInfo>,

    /// The DHW mode (code `1F41`).
    pub mode: Option<DhwModeInfo>,

    /// The relay demand (code `0008`, domain `FA`).
    pub relay_demand: Option<f64>,
}

impl DhwZone {
    /// Constructs an empty `DhwZone`.
    pub fn new() -> DhwZone {
        debug!("Creating the stored DHW");
        DhwZone::default()
    }

    /// Sets the DHW sensor, after validating it.
    pub fn set_sensor(&mut self, sensor: DeviceIx) -> Result<()> {
        match self.sensor {
            None => {
                self.sensor = Some(sensor);
                Ok(())
            }
            Some(existing) if existing == sensor => Ok(()),
            Some(_) => Err(Error::CorruptState("DHW sensor changed".to_string())),
        }
    }

    /// Sets the hot-water valve, after validating it.
    pub fn set_hotwater_valve(&mut self, valve: DeviceIx) -> Result<()> {
        match self.hotwater_valve {
            None => {
                self.hotwater_valve = Some(valve);
                Ok(())
            }
            Some(existing) if existing == valve => Ok(()),
            Some(_) => Err(Error::CorruptState("DHW hot-water valve changed".to_string())),
        }
    }

    /// Sets the heating valve, after validating it.
    pub fn set_heating_valve(&mut self, valve: DeviceIx) -> Result<()> {
        match self.heating_valve {
            None => {
                self.heating_valve = Some(valve);
                Ok(())
            }
            Some(existing) if existing == valve => Ok(()),
            Some(_) => Err(Error::CorruptState("DHW heating valve changed".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tables() {
        assert_eq!(Some(ZoneKind::Radiator), ZoneKind::from_type_byte(0x08));
        assert_eq!(Some(ZoneKind::Electric), ZoneKind::from_type_byte(0x11));
        assert_eq!(None, ZoneKind::from_type_byte(0x0D));

        assert_eq!(Some(ZoneKind::Ufh), ZoneKind::from_slug("underfloor_heating"));
        assert_eq!(None, ZoneKind::from_slug("steam_engine"));
        assert_eq!("zone_valve", ZoneKind::Valve.slug());

        assert_eq!(Some(ZoneKind::Radiator), ZoneKind::from_actuator_type(4));
        assert_eq!(None, ZoneKind::from_actuator_type(34));
    }

    #[test]
    fn test_set_kind() {
        let mut zone = Zone::new(0);

        zone.set_kind(ZoneKind::Electric).unwrap();
        zone.set_kind(ZoneKind::Electric).unwrap();

        // an electric zone may be promoted to a zone-valve zone
        zone.set_kind(ZoneKind::Valve).unwrap();
        assert_eq!(Some(ZoneKind::Valve), zone.kind);

        // but not the other way round
        assert!(matches!(
            zone.set_kind(ZoneKind::Electric),
            Err(Error::CorruptState(_))
        ));

        let mut zone = Zone::new(1);
        zone.set_kind(ZoneKind::Radiator).unwrap();
        assert!(matches!(
            zone.set_kind(ZoneKind::Ufh),
            Err(Error::CorruptState(_))
        ));
    }

    #[test]
    fn test_set_sensor() {
        let mut zone = Zone::new(0);

        zone.set_sensor(DeviceIx(3)).unwrap();
        zone.set_sensor(DeviceIx(3)).unwrap();
        assert!(matches!(
            zone.set_sensor(DeviceIx(4)),
            Err(Error::CorruptState(_))
        ));
    }

    #[test]
    fn test_add_device() {
        let mut zone = Zone::new(0);

        zone.add_device(DeviceIx(1));
        zone.add_device(DeviceIx(2));
        zone.add_device(DeviceIx(1));
        assert_eq!(vec![DeviceIx(1), DeviceIx(2)], zone.devices);
    }

    #[test]
    fn test_dhw_setters() {
        let mut dhw = DhwZone::new();

        dhw.set_sensor(DeviceIx(0)).unwrap();
        dhw.set_hotwater_valve(DeviceIx(1)).unwrap();
        dhw.set_heating_valve(DeviceIx(2)).unwrap();

        assert!(dhw.set_sensor(DeviceIx(5)).is_err());
        assert!(dhw.set_hotwater_valve(DeviceIx(5)).is_err());
        assert!(dhw.set_heating_valve(DeviceIx(5)).is_err());
    }
}
