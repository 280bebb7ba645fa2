use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use log::debug;

use crate::{
    address::Address,
    device::DeviceIx,
    error::{Error, Result},
    fault_log::FaultLog,
    parsers::{SystemMode, TempRec},
    zone::{DhwZone, Zone},
};

/// A typed handle into the gateway's system arena.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SystemIx(pub usize);

/// The system mode, as reported on code `2E04`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SystemModeInfo {
    /// The mode.
    pub mode: SystemMode,
    /// The end of a temporary mode.
    pub until: Option<NaiveDateTime>,
}

/// The last controller-broadcast temperature array, kept for sensor matching.
#[derive(Clone, Debug)]
pub struct TempCycle {
    /// When the array was received.
    pub dtm: NaiveDateTime,
    /// The per-zone temperatures.
    pub temps: Vec<TempRec>,
}

/// A heating system: the state owned by one controller.
#[derive(Debug)]
pub struct System {
    /// The controller device.
    pub ctl: DeviceIx,

    /// The controller's address.
    pub ctl_addr: Address,

    /// The zones, by zone index.
    pub zones: BTreeMap<u8, Zone>,

    /// The stored hot water, if any.
    pub dhw: Option<DhwZone>,

    /// The heating control relay (`10:` or `13:`), once known.
    pub htg_control: Option<DeviceIx>,

    /// The system mode (code `2E04`).
    pub mode: Option<SystemModeInfo>,

    /// The controller's date and time (code `313F`).
    pub datetime: Option<NaiveDateTime>,

    /// The controller's language (code `0100`).
    pub language: Option<String>,

    /// The system-level heat demand (code `3150`, domain `FC`).
    pub heat_demand: Option<f64>,

    /// The relay demands, by domain id (code `0008`).
    pub relay_demands: BTreeMap<u8, f64>,

    /// The relay failsafe flags, by domain id (code `0009`).
    pub relay_failsafes: BTreeMap<u8, bool>,

    /// The fault log (code `0418`).
    pub fault_log: FaultLog,

    /// Seconds to the next sync cycle, from the last `1F09`.
    pub sync_remaining: Option<f64>,

    /// The previous `30C9` array, for the sensor-matching window.
    pub prev_temp_cycle: Option<TempCycle>,

    /// The zone holding the schedule-transfer lock, if any.
    pub schedule_lock_idx: Option<u8>,
}

impl System {
    /// Constructs a `System` for a controller.
    pub fn new(ctl: DeviceIx, ctl_addr: Address) -> System {
        debug!("Creating a system: {ctl_addr}");
        System {
            ctl,
            ctl_addr,
            zones: BTreeMap::new(),
            dhw: None,
            htg_control: None,
            mode: None,
            datetime: None,
            language: None,
            heat_demand: None,
            relay_demands: BTreeMap::new(),
            relay_failsafes: BTreeMap::new(),
            fault_log: FaultLog::new(),
            sync_remaining: None,
            prev_temp_cycle: None,
            schedule_lock_idx: None,
        }
    }

    /// Returns a zone, creating it on first reference.
    ///
    /// The index must be below the configured zone limit.
    pub fn get_or_create_zone(&mut self, zone_idx: u8, max_zones: u8) -> Result<&mut Zone> {
        if zone_idx >= max_zones {
            return Err(Error::CorruptPayload(format!(
                "invalid zone idx: {zone_idx:02X} (exceeds max_zones)"
            )));
        }
        Ok(self
            .zones
            .entry(zone_idx)
            .or_insert_with(|| Zone::new(zone_idx)))
    }

    /// Returns the stored hot water, creating it on first reference.
    pub fn get_or_create_dhw(&mut self) -> &mut DhwZone {
        self.dhw.get_or_insert_with(DhwZone::new)
    }

    /// Sets the heating control relay, after validating it.
    ///
    /// The assignment, once made, may not silently change.
    pub fn set_htg_control(&mut self, device: DeviceIx) -> Result<()> {
        match self.htg_control {
            None => {
                debug!("System {}: heating control now set", self.ctl_addr);
                self.htg_control = Some(device);
                Ok(())
            }
            Some(existing) if existing == device => Ok(()),
            Some(_) => Err(Error::CorruptState(format!(
                "heating control of {} shouldn't change",
                self.ctl_addr
            ))),
        }
    }

    /// Acquires the per-system schedule-transfer lock for a zone.
    pub fn acquire_schedule_lock(&mut self, zone_idx: u8) -> Result<()> {
        match self.schedule_lock_idx {
            None => {
                self.schedule_lock_idx = Some(zone_idx);
                Ok(())
            }
            Some(existing) if existing == zone_idx => Ok(()),
            Some(existing) => Err(Error::Timeout(format!(
                "zone {existing:02X} holds the schedule lock"
            ))),
        }
    }

    /// Releases the schedule-transfer lock.
    pub fn release_schedule_lock(&mut self) {
        self.schedule_lock_idx = None;
    }

    /// The zones with no sensor assigned yet.
    pub fn sensorless_zones(&self) -> Vec<u8> {
        self.zones
            .values()
            .filter(|zone| zone.sensor.is_none())
            .map(|zone| zone.idx)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> System {
        System::new(DeviceIx(0), "01:145038".parse().unwrap())
    }

    #[test]
    fn test_get_or_create_zone() {
        let mut sys = system();

        sys.get_or_create_zone(0, 12).unwrap();
        sys.get_or_create_zone(11, 12).unwrap();
        sys.get_or_create_zone(0, 12).unwrap();
        assert_eq!(2, sys.zones.len());

        // the zone bound is respected
        assert!(sys.get_or_create_zone(12, 12).is_err());
        assert!(sys.get_or_create_zone(12, 16).is_ok());
    }

    #[test]
    fn test_set_htg_control() {
        let mut sys = system();

        sys.set_htg_control(DeviceIx(5)).unwrap();
        sys.set_htg_control(DeviceIx(5)).unwrap();
        assert!(matches!(
            sys.set_htg_control(DeviceIx(6)),
            Err(Error::CorruptState(_))
        ));
    }

    #[test]
    fn test_schedule_lock() {
        let mut sys = system();

        sys.acquire_schedule_lock(1).unwrap();
        sys.acquire_schedule_lock(1).unwrap();
        assert!(matches!(sys.acquire_schedule_lock(2), Err(Error::Timeout(_))));

        sys.release_schedule_lock();
        sys.acquire_schedule_lock(2).unwrap();
    }

    #[test]
    fn test_sensorless_zones() {
        let mut sys = system();

        sys.get_or_create_zone(0, 12).unwrap();
        sys.get_or_create_zone(1, 12).unwrap();
        sys.zones.get_mut(&0).unwrap().sensor = Some(DeviceIx(9));

        assert_eq!(vec![1], sys.sensorless_zones());
    }
}
