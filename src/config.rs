use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    error::{Error, Result},
    zone::ZoneKind,
};

/// The default zone limit (older installations had 8, Hometronics has 16).
#[cfg(not(feature = "dev-mode"))]
pub const DEFAULT_MAX_ZONES: u8 = 12;

/// The default zone limit, raised in dev mode.
#[cfg(feature = "dev-mode")]
pub const DEFAULT_MAX_ZONES: u8 = 16;

/// The gateway configuration block.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// The serial port to drive, if any.
    pub serial_port: Option<String>,

    /// A packet log to replay instead of a serial port.
    pub input_file: Option<String>,

    /// Where to write the packet log, if anywhere.
    pub packet_log: Option<String>,

    /// The known-devices file (friendly names and ignore flags).
    pub known_devices: Option<String>,

    /// Don't transmit at all (implied by replaying an input file).
    pub disable_sending: bool,

    /// Don't send discovery/poll traffic.
    pub disable_discovery: bool,

    /// Process only allowlisted devices.
    pub enforce_allowlist: bool,

    /// Drop blocklisted devices.
    pub enforce_blocklist: bool,

    /// The zone index bound.
    pub max_zones: u8,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            serial_port: None,
            input_file: None,
            packet_log: None,
            known_devices: None,
            disable_sending: false,
            disable_discovery: false,
            enforce_allowlist: false,
            enforce_blocklist: true,
            max_zones: DEFAULT_MAX_ZONES,
        }
    }
}

impl Config {
    /// Loads a configuration block from JSON.
    pub fn from_json(json: &str) -> Result<Config> {
        let mut config: Config = serde_json::from_str(json)?;
        // replay cannot transmit
        if config.serial_port.is_none() {
            config.disable_sending = true;
        }
        if config.disable_sending {
            config.disable_discovery = true;
        }
        Ok(config)
    }
}

/// One entry of the known-devices map (or of a filter list).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct KnownDevice {
    /// A display name for the device.
    pub friendly_name: Option<String>,

    /// Whether to ignore the device's packets.
    pub ignore: bool,
}

/// A map from device id to its tag record.
///
/// For the allow/block lists, present-ness is the only semantic.
pub type DeviceList = BTreeMap<String, KnownDevice>;

/// Loads a known-devices map (or filter list), validating the device ids.
pub fn load_device_list(json: &str) -> Result<DeviceList> {
    let list: DeviceList = serde_json::from_str(json)?;
    for device_id in list.keys() {
        device_id
            .parse::<Address>()
            .map_err(|_| Error::Schema(format!("invalid device id: {device_id:?}")))?;
    }
    Ok(list)
}

/// Serializes a known-devices map, sorted and pretty-printed.
pub fn save_device_list(list: &DeviceList) -> Result<String> {
    Ok(serde_json::to_string_pretty(list)?)
}

/// The optional installation schema, pre-populating the entity graph.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallationSchema {
    /// The controller's device id.
    pub controller: String,

    /// The system-level device bindings.
    pub system: SystemSchema,

    /// The stored hot water bindings, if any.
    pub stored_hotwater: Option<DhwSchema>,

    /// The zones, by two-hex-digit zone index.
    pub zones: BTreeMap<String, ZoneSchema>,

    /// Devices with no parent zone.
    pub orphans: Vec<String>,
}

/// The system block of an installation schema.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemSchema {
    /// The heating control relay (`10:` or `13:`).
    pub heating_control: Option<String>,
}

/// The stored hot water block of an installation schema.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DhwSchema {
    /// The DHW sensor (`07:`).
    pub hotwater_sensor: Option<String>,

    /// The hot-water valve (`13:`).
    pub hotwater_valve: Option<String>,

    /// The heating valve (`13:`).
    pub heating_valve: Option<String>,
}

/// One zone of an installation schema.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ZoneSchema {
    /// The zone's heating type slug.
    pub heating_type: Option<String>,

    /// The zone's sensor.
    pub sensor: Option<String>,

    /// The zone's actuator devices.
    pub devices: Vec<String>,
}

impl InstallationSchema {
    /// Loads and validates an installation schema from JSON.
    ///
    /// Unknown zone types, malformed device ids and out-of-range zone
    /// indexes fail validation.
    pub fn from_json(json: &str, max_zones: u8) -> Result<InstallationSchema> {
        let schema: InstallationSchema = serde_json::from_str(json)?;

        let ctl: Address = schema
            .controller
            .parse()
            .map_err(|_| Error::Schema(format!("invalid controller: {:?}", schema.controller)))?;
        if !ctl.is_controller() {
            return Err(Error::Schema(format!("not a controller: {ctl}")));
        }

        if let Some(htg) = &schema.system.heating_control {
            let addr: Address = htg
                .parse()
                .map_err(|_| Error::Schema(format!("invalid heating control: {htg:?}")))?;
            if !matches!(addr.dev_type(), 10 | 13) {
                return Err(Error::Schema(format!("heating control can't be: {addr}")));
            }
        }

        if let Some(dhw) = &schema.stored_hotwater {
            for (device_id, want) in [
                (&dhw.hotwater_sensor, 7),
                (&dhw.hotwater_valve, 13),
                (&dhw.heating_valve, 13),
            ] {
                if let Some(device_id) = device_id {
                    let addr: Address = device_id
                        .parse()
                        .map_err(|_| Error::Schema(format!("invalid device id: {device_id:?}")))?;
                    if addr.dev_type() != want {
                        return Err(Error::Schema(format!("invalid DHW device: {addr}")));
                    }
                }
            }
        }

        for (zone_idx, zone) in &schema.zones {
            let idx = u8::from_str_radix(zone_idx, 16)
                .map_err(|_| Error::Schema(format!("invalid zone idx: {zone_idx:?}")))?;
            if idx >= max_zones {
                return Err(Error::Schema(format!("invalid zone idx: {zone_idx:?}")));
            }
            if let Some(heating_type) = &zone.heating_type {
                if ZoneKind::from_slug(heating_type).is_none() {
                    return Err(Error::Schema(format!(
                        "unknown zone type: {heating_type:?}"
                    )));
                }
            }
            for device_id in zone.devices.iter().chain(zone.sensor.iter()) {
                device_id
                    .parse::<Address>()
                    .map_err(|_| Error::Schema(format!("invalid device id: {device_id:?}")))?;
            }
        }

        for device_id in &schema.orphans {
            device_id
                .parse::<Address>()
                .map_err(|_| Error::Schema(format!("invalid device id: {device_id:?}")))?;
        }

        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json() {
        let config = Config::from_json(r#"{"serial_port": "/dev/ttyUSB0", "max_zones": 16}"#)
            .unwrap();
        assert_eq!(Some("/dev/ttyUSB0".to_string()), config.serial_port);
        assert_eq!(16, config.max_zones);
        assert_eq!(false, config.disable_sending);

        // replaying a file disables sending and discovery
        let config =
            Config::from_json(r#"{"input_file": "packet.log", "disable_discovery": false}"#)
                .unwrap();
        assert_eq!(true, config.disable_sending);
        assert_eq!(true, config.disable_discovery);
    }

    #[test]
    fn test_device_list() {
        let list = load_device_list(
            r#"{"01:145038": {"friendly_name": "Main"}, "12:010740": {"ignore": true}}"#,
        )
        .unwrap();
        assert_eq!(2, list.len());
        assert_eq!(true, list["12:010740"].ignore);

        assert!(load_device_list(r#"{"xx:145038": {}}"#).is_err());

        let json = save_device_list(&list).unwrap();
        let round_tripped = load_device_list(&json).unwrap();
        assert_eq!(
            list["01:145038"].friendly_name,
            round_tripped["01:145038"].friendly_name
        );
    }

    #[test]
    fn test_schema_from_json() {
        let schema = InstallationSchema::from_json(
            r#"{
                "controller": "01:145038",
                "system": {"heating_control": "13:163733"},
                "stored_hotwater": {"hotwater_sensor": "07:045960"},
                "zones": {
                    "00": {"heating_type": "radiator_valve", "sensor": "34:092243",
                           "devices": ["04:056057", "04:056053"]},
                    "01": {"heating_type": "underfloor_heating"}
                }
            }"#,
            12,
        )
        .unwrap();
        assert_eq!("01:145038", schema.controller);
        assert_eq!(2, schema.zones.len());

        // unknown zone types fail validation
        let result = InstallationSchema::from_json(
            r#"{"controller": "01:145038", "zones": {"00": {"heating_type": "lava_moat"}}}"#,
            12,
        );
        assert!(matches!(result, Err(Error::Schema(_))));

        // as do non-controller controllers and out-of-range zones
        assert!(InstallationSchema::from_json(r#"{"controller": "04:056057"}"#, 12).is_err());
        assert!(InstallationSchema::from_json(
            r#"{"controller": "01:145038", "zones": {"0D": {}}}"#,
            12,
        )
        .is_err());
    }
}
