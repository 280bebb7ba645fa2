//! The per-opcode payload decoders.
//!
//! Each packet code maps to a pure decoder that turns the payload bytes into
//! a typed [`Payload`] record (or a list of records, for the controller's
//! self-broadcast arrays). Decoders assert the declared shape of their
//! payload and fail with a recoverable [`Error::CorruptPayload`]; the caller
//! logs and discards the message.

use byteorder::{BigEndian, ByteOrder};
use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    address::Address,
    error::{Error, Result},
    opentherm::{self, OtDecoded, OtMsgType},
    packet::{Packet, Verb},
};

/// Codes that treat a leading byte in `F8..FE` as a domain id.
pub const MAY_USE_DOMAIN_ID: [u16; 7] = [0x0001, 0x0008, 0x0009, 0x1100, 0x1FC9, 0x3150, 0x3B00];

/// Codes whose leading byte may be a zone index.
pub const MAY_USE_ZONE_IDX: [u16; 18] = [
    0x0001, 0x0004, 0x0008, 0x0009, 0x000A, 0x01D0, 0x01E9, 0x0404, 0x1030, 0x1060, 0x12B0,
    0x1FC9, 0x2249, 0x2309, 0x2349, 0x30C9, 0x3150, 0x3EF1,
];

/// A decoded temperature or setpoint.
///
/// The wire form is a two's-complement 16-bit value at scale 0.01; `31FF` and
/// `7FFF` decode to `None`, and `7EFF` to [`Temp::Off`] (a setpoint "off"
/// encoding).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Temp {
    /// A temperature in degrees Celsius.
    Celsius(f64),
    /// The setpoint "off" encoding.
    Off,
}

impl Temp {
    /// Returns the value in degrees Celsius, if this is not the off encoding.
    pub fn celsius(self) -> Option<f64> {
        match self {
            Temp::Celsius(value) => Some(value),
            Temp::Off => None,
        }
    }
}

/// A zone (or DHW) operating mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ZoneMode {
    /// Follow the weekly schedule.
    FollowSchedule,
    /// Override until the next scheduled setpoint.
    Advanced,
    /// Override indefinitely.
    Permanent,
    /// Override for a number of minutes.
    Countdown,
    /// Override until a given date/time.
    Temporary,
}

impl ZoneMode {
    /// Decodes the wire byte.
    pub fn from_byte(byte: u8) -> Option<ZoneMode> {
        match byte {
            0x00 => Some(ZoneMode::FollowSchedule),
            0x01 => Some(ZoneMode::Advanced),
            0x02 => Some(ZoneMode::Permanent),
            0x03 => Some(ZoneMode::Countdown),
            0x04 => Some(ZoneMode::Temporary),
            _ => None,
        }
    }

    /// Encodes as the wire byte.
    pub fn to_byte(self) -> u8 {
        match self {
            ZoneMode::FollowSchedule => 0x00,
            ZoneMode::Advanced => 0x01,
            ZoneMode::Permanent => 0x02,
            ZoneMode::Countdown => 0x03,
            ZoneMode::Temporary => 0x04,
        }
    }
}

/// A system operating mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SystemMode {
    /// Normal scheduled operation.
    Auto,
    /// All heating off.
    HeatOff,
    /// Eco, or boost.
    EcoBoost,
    /// Away.
    Away,
    /// Day off.
    DayOff,
    /// Day off, then eco.
    DayOffEco,
    /// Auto, resetting all zone overrides.
    AutoWithReset,
    /// The custom program.
    Custom,
}

impl SystemMode {
    /// Decodes the wire byte.
    pub fn from_byte(byte: u8) -> Option<SystemMode> {
        match byte {
            0x00 => Some(SystemMode::Auto),
            0x01 => Some(SystemMode::HeatOff),
            0x02 => Some(SystemMode::EcoBoost),
            0x03 => Some(SystemMode::Away),
            0x04 => Some(SystemMode::DayOff),
            0x05 => Some(SystemMode::DayOffEco),
            0x06 => Some(SystemMode::AutoWithReset),
            0x07 => Some(SystemMode::Custom),
            _ => None,
        }
    }

    /// Encodes as the wire byte.
    pub fn to_byte(self) -> u8 {
        match self {
            SystemMode::Auto => 0x00,
            SystemMode::HeatOff => 0x01,
            SystemMode::EcoBoost => 0x02,
            SystemMode::Away => 0x03,
            SystemMode::DayOff => 0x04,
            SystemMode::DayOffEco => 0x05,
            SystemMode::AutoWithReset => 0x06,
            SystemMode::Custom => 0x07,
        }
    }
}

/// The stored hot water on/off state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DhwState {
    /// Off.
    Off,
    /// On.
    On,
}

impl DhwState {
    /// Encodes as the wire byte.
    pub fn to_byte(self) -> u8 {
        match self {
            DhwState::Off => 0x00,
            DhwState::On => 0x01,
        }
    }
}

/// The state of a fault-log entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FaultState {
    /// The fault occurred.
    Fault,
    /// The fault was restored.
    Restore,
    /// An opaque state not shown in the controller UI.
    UnknownC0,
}

impl FaultState {
    fn from_byte(byte: u8) -> Option<FaultState> {
        match byte {
            0x00 => Some(FaultState::Fault),
            0x40 => Some(FaultState::Restore),
            0xC0 => Some(FaultState::UnknownC0),
            _ => None,
        }
    }
}

/// The type of a fault-log entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FaultType {
    /// A system fault.
    SystemFault,
    /// Mains voltage low.
    MainsLow,
    /// A device's battery is low.
    BatteryLow,
    /// A communications fault.
    CommsFault,
    /// A sensor error.
    SensorError,
}

impl FaultType {
    fn from_byte(byte: u8) -> Option<FaultType> {
        match byte {
            0x01 => Some(FaultType::SystemFault),
            0x03 => Some(FaultType::MainsLow),
            0x04 => Some(FaultType::BatteryLow),
            0x06 => Some(FaultType::CommsFault),
            0x0A => Some(FaultType::SensorError),
            _ => None,
        }
    }
}

/// The device class of a fault-log entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FaultDeviceClass {
    /// The controller itself.
    Controller,
    /// A zone sensor.
    Sensor,
    /// An actuator (the boiler relay, if the domain is `FC`).
    Actuator,
    /// The DHW sensor.
    DhwSensor,
    /// A remote gateway.
    RemoteGateway,
}

impl FaultDeviceClass {
    fn from_byte(byte: u8) -> Option<FaultDeviceClass> {
        match byte {
            0x00 => Some(FaultDeviceClass::Controller),
            0x01 => Some(FaultDeviceClass::Sensor),
            0x04 => Some(FaultDeviceClass::Actuator),
            0x05 => Some(FaultDeviceClass::DhwSensor),
            0x06 => Some(FaultDeviceClass::RemoteGateway),
            _ => None,
        }
    }
}

/// The device class byte of a `000C` payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceClass {
    /// `00` - all the actuators of a zone.
    ZoneActuators,
    /// `04` - the sensor of a zone.
    ZoneSensor,
    /// `08` - radiator valve actuators.
    RadActuators,
    /// `09` - underfloor heating actuators.
    UfhActuators,
    /// `0A` - zone valve actuators.
    ValActuators,
    /// `0B` - mixing valve actuators.
    MixActuators,
    /// `0D` - the DHW sensor.
    DhwSensor,
    /// `0E` - the DHW hot-water valve.
    DhwValve,
    /// `0E` with a `01` index - the DHW heating valve.
    HeatingValve,
    /// `0F` - the heating control relay.
    HtgControl,
    /// `10` - seen when binding a round thermostat.
    Unknown,
    /// `11` - electric heat actuators.
    EleActuators,
}

impl DeviceClass {
    /// Decodes the wire byte.
    pub fn from_byte(byte: u8) -> Option<DeviceClass> {
        match byte {
            0x00 => Some(DeviceClass::ZoneActuators),
            0x04 => Some(DeviceClass::ZoneSensor),
            0x08 => Some(DeviceClass::RadActuators),
            0x09 => Some(DeviceClass::UfhActuators),
            0x0A => Some(DeviceClass::ValActuators),
            0x0B => Some(DeviceClass::MixActuators),
            0x0D => Some(DeviceClass::DhwSensor),
            0x0E => Some(DeviceClass::DhwValve),
            0x0F => Some(DeviceClass::HtgControl),
            0x10 => Some(DeviceClass::Unknown),
            0x11 => Some(DeviceClass::EleActuators),
            _ => None,
        }
    }
}

/// The entity a payload addresses: a zone index, a UFH circuit, a domain id,
/// or nothing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MsgIndex {
    /// The payload carries no entity index.
    None,
    /// A zone index, `00..MAX_ZONES-1`.
    Zone(u8),
    /// The parent zone of the sending device.
    Parent(u8),
    /// A system-level domain id, `F8..FE`.
    Domain(u8),
    /// A UFH circuit index, with the matching zone if the controller knows it.
    UfhCircuit {
        /// The circuit index, `00..07`.
        idx: u8,
        /// The evohome zone the circuit maps to, if any.
        zone_idx: Option<u8>,
    },
    /// A ventilation unit id.
    Vent(u8),
}

impl MsgIndex {
    /// Returns the zone index, if this index addresses a zone.
    pub fn zone_idx(self) -> Option<u8> {
        match self {
            MsgIndex::Zone(idx) => Some(idx),
            _ => None,
        }
    }

    /// Returns the domain id, if this index addresses a domain.
    pub fn domain_id(self) -> Option<u8> {
        match self {
            MsgIndex::Domain(id) => Some(id),
            _ => None,
        }
    }
}

// array element records

/// One element of a `0005` zone-mask payload.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemZonesRec {
    /// The zone type byte the mask is for.
    pub zone_type: u8,
    /// One bit per possible zone index.
    pub zone_mask: Vec<bool>,
}

/// One element of a `0009` failsafe payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FailsafeRec {
    /// The domain or zone the flag is for.
    pub index: MsgIndex,
    /// Whether failsafe mode is enabled.
    pub failsafe_enabled: Option<bool>,
}

/// One element of a `000A` zone-configuration payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoneConfigRec {
    /// The zone index.
    pub zone_idx: u8,
    /// The minimum setpoint.
    pub min_temp: Option<Temp>,
    /// The maximum setpoint.
    pub max_temp: Option<Temp>,
    /// Whether local overrides are permitted.
    pub local_override: bool,
    /// Whether the open-window function is enabled.
    pub openwindow_function: bool,
    /// Whether multi-room mode is enabled.
    pub multiroom_mode: bool,
}

/// One element of a `1FC9` bind payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BindRec {
    /// The domain or zone byte.
    pub index: u8,
    /// The bound packet code.
    pub code: u16,
}

/// One element of a `2249` now/next setpoint payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NowNextRec {
    /// The zone index.
    pub zone_idx: u8,
    /// The current setpoint.
    pub setpoint_now: Option<Temp>,
    /// The next setpoint.
    pub setpoint_next: Option<Temp>,
    /// An undeciphered countdown field.
    pub countdown: u16,
}

/// One element of a `22C9` UFH setpoint payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UfhSetpointRec {
    /// The UFH circuit index.
    pub ufh_idx: u8,
    /// The lower setpoint bound.
    pub temp_low: Option<Temp>,
    /// The upper setpoint bound.
    pub temp_high: Option<Temp>,
}

/// One element of a `2309` setpoint payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SetpointRec {
    /// The zone index.
    pub zone_idx: u8,
    /// The setpoint.
    pub setpoint: Option<Temp>,
}

/// One element of a `30C9` temperature payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempRec {
    /// The zone index.
    pub zone_idx: u8,
    /// The measured temperature.
    pub temperature: Option<Temp>,
}

/// One element of a `3150` heat-demand payload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeatDemandRec {
    /// The domain, zone or circuit the demand is for.
    pub index: MsgIndex,
    /// The demand, 0.0 to 1.0.
    pub heat_demand: Option<f64>,
}

/// One fault-log entry (`0418`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaultLogRec {
    /// The position in the log, 0..63.
    pub log_idx: u8,
    /// When the fault occurred/restored.
    pub timestamp: NaiveDateTime,
    /// Fault or restore (or the opaque `C0` state).
    pub fault_state: FaultState,
    /// What kind of fault.
    pub fault_type: FaultType,
    /// What kind of device faulted.
    pub device_class: FaultDeviceClass,
    /// The zone or domain affected, if not the controller.
    pub index: MsgIndex,
    /// The device affected, if identified.
    pub device_id: Option<Address>,
}

/// The `1030` mixing valve parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MixConfigRec {
    /// The maximum flow temperature.
    pub max_flow_temp: u8,
    /// The pump run time, in minutes.
    pub pump_run_time: u8,
    /// The actuator run time, in seconds.
    pub actuator_run_time: u8,
    /// The minimum flow temperature.
    pub min_flow_temp: u8,
    /// An undeciphered boolean-ish parameter.
    pub unknown_0: u8,
}

/// A parsed payload: one typed record per packet code.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// A request (or reply) carrying no decoded fields.
    Empty,
    /// `0001` - RF test/check packets (not fully understood).
    RfUnknown {
        /// Bytes 1-2, `0000` or `FFFF`.
        unknown_0: [u8; 2],
        /// Byte 3, `02` or `05`.
        unknown_1: u8,
        /// The remainder.
        unknown_2: Vec<u8>,
    },
    /// `0002` - an outdoor weather sensor.
    WeatherSensor {
        /// The outdoor temperature.
        temperature: Option<Temp>,
        /// The remainder.
        unknown_0: Vec<u8>,
    },
    /// `0004` - a zone's display name.
    ZoneName {
        /// The name, unless the zone is unnamed.
        name: Option<String>,
    },
    /// `0005` - RQ for the zones of one type.
    SystemZonesRequest {
        /// The zone type byte.
        zone_type: u8,
    },
    /// `0005` - the zones configured for one or more types.
    SystemZones(Vec<SystemZonesRec>),
    /// `0006` - the schedule change counter.
    ScheduleVersion {
        /// The leading two bytes.
        header: [u8; 2],
        /// Incremented by 2 for every schedule change.
        num_changes: u16,
    },
    /// `0008` - a relay's demand.
    RelayDemand {
        /// The demand, 0.0 to 1.0.
        relay_demand: Option<f64>,
    },
    /// `0009` - relay failsafe flags.
    RelayFailsafe(Vec<FailsafeRec>),
    /// `000A` - one zone's configuration.
    ZoneConfig(ZoneConfigRec),
    /// `000A` - the controller's zone-configuration array.
    ZoneConfigArray(Vec<ZoneConfigRec>),
    /// `000C` - RQ for the devices of a zone/domain.
    ZoneDevicesRequest {
        /// The requested device class.
        device_class: DeviceClass,
    },
    /// `000C` - the devices of a zone/domain.
    ZoneDevices {
        /// The device class the list is for.
        device_class: DeviceClass,
        /// The member devices.
        devices: Vec<Address>,
    },
    /// `000E` - unknown, from a round thermostat.
    Unknown000E {
        /// The raw payload.
        unknown: Vec<u8>,
    },
    /// `0016` - an RF signal check reply.
    RfCheck {
        /// The strength, 1 (best) to 5.
        rf_strength: u8,
        /// The raw value.
        rf_value: u8,
    },
    /// `0100` - the controller's language.
    Language {
        /// A two-character language code.
        language: Option<String>,
    },
    /// `01D0` - unknown, from a radiator valve when its buttons are pushed.
    Unknown01D0 {
        /// `00` or `03`.
        unknown_0: u8,
    },
    /// `01E9` - unknown, from a radiator valve when its buttons are pushed.
    Unknown01E9 {
        /// `00` or `03`.
        unknown_0: u8,
    },
    /// `0404` - one fragment of a zone's schedule.
    ScheduleFragment {
        /// The 1-based fragment index.
        frag_index: u8,
        /// The total number of fragments (0 when not yet known).
        frag_total: u8,
        /// The fragment byte count.
        frag_length: u8,
        /// The fragment bytes (empty for an RQ).
        fragment: Vec<u8>,
    },
    /// `0418` - RQ for one fault-log entry.
    FaultLogRequest {
        /// The requested position in the log.
        log_idx: u8,
    },
    /// `0418` - the "log is exhausted" sentinel reply.
    FaultLogNull,
    /// `0418` - one fault-log entry.
    FaultLogEntry(FaultLogRec),
    /// `042F` - unknown counters, from a round thermostat.
    Counters {
        /// First counter.
        counter_1: u16,
        /// Second counter.
        counter_2: u16,
        /// Total counter.
        counter_total: u16,
        /// The remainder.
        unknown_0: Vec<u8>,
    },
    /// `1030` - a mixing valve's configuration.
    MixConfig(MixConfigRec),
    /// `1060` - a device's battery state.
    BatteryState {
        /// Whether the battery is low.
        low_battery: bool,
        /// The charge level, 0.0 to 1.0, if reported.
        battery_level: Option<f64>,
    },
    /// `1090` - unknown setpoint pair (non-evohome).
    Setpoints1090 {
        /// First temperature.
        temp_0: Option<Temp>,
        /// Second temperature.
        temp_1: Option<Temp>,
    },
    /// `10A0` - the DHW parameters.
    DhwParams {
        /// The setpoint, 30.0-85.0 C.
        setpoint: Option<Temp>,
        /// The overrun, 0-10 minutes.
        overrun: Option<u8>,
        /// The differential, 1.0-10.0 C.
        differential: Option<Temp>,
    },
    /// `10E0` - a device's hardware info.
    DeviceInfo {
        /// The model description.
        description: Option<String>,
        /// The firmware date.
        firmware: Option<NaiveDate>,
        /// The manufacture date.
        manufactured: Option<NaiveDate>,
        /// The undeciphered leading bytes.
        unknown: Vec<u8>,
    },
    /// `1100` - the boiler relay's TPI parameters.
    TpiParams {
        /// Cycles per hour.
        cycle_rate: f64,
        /// Minimum on time, in minutes.
        minimum_on_time: f64,
        /// Minimum off time, in minutes.
        minimum_off_time: f64,
        /// The proportional band width, in degrees C (long form only).
        proportional_band_width: Option<Temp>,
    },
    /// `1260` - the stored hot water temperature.
    DhwTemp {
        /// The temperature.
        temperature: Option<Temp>,
    },
    /// `1290` - the outdoor temperature.
    OutdoorTemp {
        /// The temperature.
        temperature: Option<Temp>,
    },
    /// `12A0` - indoor humidity (ventilation).
    IndoorHumidity {
        /// Relative humidity, 0.0 to 1.0.
        relative_humidity: f64,
        /// The temperature.
        temperature: Option<Temp>,
        /// The dewpoint temperature.
        dewpoint_temp: Option<Temp>,
    },
    /// `12B0` - a zone/device window state.
    WindowState {
        /// Whether a window is open.
        window_open: Option<bool>,
    },
    /// `1F09` - the controller's sync-cycle countdown.
    SystemSync {
        /// Seconds until the next sync cycle.
        remaining_seconds: f64,
    },
    /// `1F41` - the DHW mode.
    DhwMode {
        /// Whether the DHW is on.
        active: Option<bool>,
        /// The override mode.
        mode: Option<ZoneMode>,
        /// The end of a temporary override.
        until: Option<NaiveDateTime>,
    },
    /// `1FC9` - an RF bind array.
    RfBind(Vec<BindRec>),
    /// `1FD4` - the OpenTherm bridge's sync ticker.
    OpenthermSync {
        /// The ticker value.
        ticker: u16,
    },
    /// `2249` - one now/next setpoint (non-evohome programmer).
    NowNextSetpoint(NowNextRec),
    /// `2249` - the programmer's now/next setpoint array.
    NowNextSetpointArray(Vec<NowNextRec>),
    /// `22C9` - the UFH controller's setpoint-bounds array.
    UfhSetpoints(Vec<UfhSetpointRec>),
    /// `22D0` - unknown (system switch?).
    Unknown22D0 {
        /// The raw payload tail.
        unknown: Vec<u8>,
    },
    /// `22D9` - the boiler setpoint.
    BoilerSetpoint {
        /// The setpoint.
        setpoint: Option<Temp>,
    },
    /// `22F1` - a ventilation switch.
    Switch {
        /// The raw switch bitmap.
        bitmap: u8,
        /// The fan mode, if the bitmap selects one.
        fan_mode: Option<&'static str>,
        /// The heater mode, if the bitmap selects one.
        heater_mode: Option<&'static str>,
        /// The trailing byte.
        unknown_0: u8,
    },
    /// `22F3` - a ventilation switch (variant).
    SwitchOther {
        /// The raw switch bitmap.
        bitmap: u8,
    },
    /// `2309` - one setpoint.
    Setpoint(SetpointRec),
    /// `2309` - the controller's setpoint array.
    SetpointArray(Vec<SetpointRec>),
    /// `2349` - a zone's mode.
    ZoneMode {
        /// The override mode.
        mode: ZoneMode,
        /// The setpoint.
        setpoint: Option<Temp>,
        /// The end of a temporary override.
        until: Option<NaiveDateTime>,
    },
    /// `2D49` - unknown (hometronics).
    Unknown2D49 {
        /// An on/off state.
        state: Option<bool>,
    },
    /// `2E04` - the system mode.
    SystemMode {
        /// The mode.
        system_mode: SystemMode,
        /// The end of a temporary mode.
        until: Option<NaiveDateTime>,
    },
    /// `30C9` - one temperature.
    Temperature(TempRec),
    /// `30C9` - the controller's temperature array.
    TemperatureArray(Vec<TempRec>),
    /// `3120` - unknown, from a round thermostat.
    Unknown3120 {
        /// The raw payload.
        unknown: Vec<u8>,
    },
    /// `313F` - the controller's date and time.
    Datetime {
        /// The (naive, local) date and time.
        datetime: NaiveDateTime,
        /// Whether DST is flagged.
        is_dst: Option<bool>,
        /// The undeciphered second byte.
        unknown_0: u8,
    },
    /// `3150` - one heat demand.
    HeatDemand(HeatDemandRec),
    /// `3150` - the UFH controller's heat-demand array.
    HeatDemandArray(Vec<HeatDemandRec>),
    /// `31D9` - a ventilation fan state.
    FanState {
        /// A percentage, 0.0 to 1.0.
        percent_1: Option<f64>,
        /// Byte 1, `00` or `06`.
        unknown_0: u8,
        /// The remainder of the long form.
        unknown: Vec<u8>,
    },
    /// `31DA` - a ventilation unit's humidity report.
    VentHumidity {
        /// Relative humidity, 0.0 to 1.0.
        relative_humidity: Option<f64>,
        /// The undeciphered trailing fields.
        unknown: Vec<u8>,
    },
    /// `31E0` - a ventilation on/off state.
    VentState {
        /// The state.
        state: Option<bool>,
        /// The remainder.
        unknown: Vec<u8>,
    },
    /// `3220` - an encapsulated OpenTherm message.
    OpenTherm {
        /// The message (data) id.
        id: u8,
        /// The message name, from the static table.
        name: &'static str,
        /// The OpenTherm message type.
        msg_type: OtMsgType,
        /// The decoded data bytes (`None` for a request).
        value: Option<OtDecoded>,
    },
    /// `3B00` - the TPI cycle sync broadcast.
    ActuatorSync {
        /// Always `C8` (on).
        sync_tpi: Option<bool>,
    },
    /// `3EF0` - an actuator's state.
    ActuatorState {
        /// Whether the actuator is enabled.
        actuator_enabled: bool,
        /// The modulation level, 0.0 to 1.0.
        modulation_level: Option<f64>,
        /// Whether the flame is lit (OpenTherm bridges only).
        flame_active: Option<bool>,
        /// The raw flame state byte (OpenTherm bridges only).
        flame_state: Option<u8>,
    },
    /// `3EF1` - an actuator's cycle state.
    ActuatorCycle {
        /// Whether the actuator is enabled.
        actuator_enabled: bool,
        /// The modulation level, 0.0 to 1.0.
        modulation_level: Option<f64>,
        /// Seconds until the actuator state changes.
        actuator_countdown: u16,
        /// Seconds until the next TPI cycle (not for OpenTherm bridges).
        cycle_countdown: Option<u16>,
        /// The trailing byte.
        unknown_0: u8,
    },
}

impl Payload {
    /// Returns `true` if this payload is a list of records.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Payload::SystemZones(_)
                | Payload::RelayFailsafe(_)
                | Payload::ZoneConfigArray(_)
                | Payload::RfBind(_)
                | Payload::NowNextSetpointArray(_)
                | Payload::UfhSetpoints(_)
                | Payload::SetpointArray(_)
                | Payload::TemperatureArray(_)
                | Payload::HeatDemandArray(_)
        )
    }
}

struct Ctx<'a> {
    pkt: &'a Packet,
    is_array: bool,
    max_zones: u8,
}

fn ensure(cond: bool, what: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(Error::CorruptPayload(what.to_string()))
    }
}

// decode primitives

/// Decodes a two-byte two's-complement temperature at scale 0.01.
pub fn temp_from(bytes: &[u8]) -> Result<Option<Temp>> {
    ensure(bytes.len() >= 2, "short temperature field")?;
    match BigEndian::read_u16(bytes) {
        0x31FF | 0x7FFF => Ok(None),
        0x7EFF => Ok(Some(Temp::Off)),
        _ => Ok(Some(Temp::Celsius(
            f64::from(BigEndian::read_i16(bytes)) / 100.0,
        ))),
    }
}

/// Decodes a one-byte percentage at scale 0.005 (0..200 maps to 0.0..1.0).
pub fn percent_from(byte: u8) -> Result<Option<f64>> {
    match byte {
        0xFE | 0xFF => Ok(None),
        _ => {
            ensure(byte <= 200, "percentage out of range")?;
            Ok(Some(f64::from(byte) / 200.0))
        }
    }
}

/// Decodes a `00`/`C8` boolean (`FF` means not available).
pub fn bool_from(byte: u8) -> Result<Option<bool>> {
    match byte {
        0x00 => Ok(Some(false)),
        0xC8 => Ok(Some(true)),
        0xFF => Ok(None),
        _ => Err(Error::CorruptPayload(format!("invalid boolean: {byte:02X}"))),
    }
}

/// Decodes the 6- or 7-byte `[SS] MM HH DD MM YYYY` datetime form.
///
/// The top bit of the seconds field carries the DST flag and the top bits of
/// the hour field the day-of-week; both are masked off.
pub fn dtm_from(bytes: &[u8]) -> Result<NaiveDateTime> {
    let bytes: Vec<u8> = if bytes.len() == 6 {
        let mut v = vec![0u8];
        v.extend_from_slice(bytes);
        v
    } else {
        bytes.to_vec()
    };
    ensure(bytes.len() == 7, "invalid datetime field")?;

    let year = i32::from(BigEndian::read_u16(&bytes[5..7]));
    NaiveDate::from_ymd_opt(year, u32::from(bytes[4]), u32::from(bytes[3]))
        .and_then(|date| {
            date.and_hms_opt(
                u32::from(bytes[2] & 0b1_1111),
                u32::from(bytes[1]),
                u32::from(bytes[0] & 0b111_1111),
            )
        })
        .ok_or_else(|| Error::CorruptPayload("invalid datetime".to_string()))
}

/// Decodes the 4-byte `DD MM YYYY` date form (`FFFFFFFF` means unset).
pub fn date_from(bytes: &[u8]) -> Result<Option<NaiveDate>> {
    ensure(bytes.len() == 4, "invalid date field")?;
    if bytes == [0xFF; 4] {
        return Ok(None);
    }
    let year = i32::from(BigEndian::read_u16(&bytes[2..4]));
    NaiveDate::from_ymd_opt(year, u32::from(bytes[1]), u32::from(bytes[0] & 0b1_1111))
        .map(Some)
        .ok_or_else(|| Error::CorruptPayload("invalid date".to_string()))
}

/// Decodes the printable-ASCII characters of a byte field, if any.
pub fn str_from(bytes: &[u8]) -> Option<String> {
    let s: String = bytes
        .iter()
        .filter(|b| (0x20..0x7F).contains(*b))
        .map(|b| char::from(*b))
        .collect();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Detects whether a packet's payload is an array of records.
///
/// Certain codes are arrays when and only when the source equals the
/// destination (the controller self-broadcasts) and the verb is `I` or `RP`.
pub fn is_array(pkt: &Packet) -> bool {
    let inbound = matches!(pkt.verb, Verb::I | Verb::Rp);

    if matches!(pkt.code, 0x000C | 0x1FC9) {
        return inbound;
    }
    // address equality by canonical id
    if !inbound || pkt.src != pkt.dst || !pkt.src.is_device() {
        return false;
    }

    match (pkt.code, pkt.src.dev_type()) {
        (0x0009, 1) => pkt.payload.first().map_or(false, |b| b & 0xF0 == 0xF0),
        (0x000A | 0x2309 | 0x30C9, 1) => true,
        (0x22C9 | 0x3150, 2) => pkt.payload.first().map_or(false, |b| b & 0xF0 != 0xF0),
        (0x2249, 23) => true,
        _ => false,
    }
}

/// Determines what the leading byte of a payload addresses.
///
/// Codes in the no-index set carry none; codes in [`MAY_USE_DOMAIN_ID`] treat
/// `F8..FE` as a domain; `000C` branches on its device-class byte; the zone
/// index bound `< max_zones` is asserted.
fn index_of(seqx: u8, ctx: &Ctx) -> Result<MsgIndex> {
    let pkt = ctx.pkt;
    let (src_type, dst_type) = (pkt.src.dev_type(), pkt.dst.dev_type());

    if matches!(pkt.code, 0x1F09 | 0x1FC9 | 0x2E04) {
        return Ok(MsgIndex::None);
    }

    // a stat broadcasting to itself reports no index (1030/2309 excepted)
    if matches!(src_type, 3 | 12 | 22)
        && src_type == pkt.addrs[2].dev_type()
        && !matches!(pkt.code, 0x1030 | 0x2309)
    {
        ensure(seqx == 0, "unexpected index from a stat")?;
        return Ok(MsgIndex::None);
    }

    match pkt.code {
        0x000C => {
            if pkt.verb == Verb::I {
                return Ok(MsgIndex::None);
            }
            let class = *pkt.payload.get(1).ok_or_else(|| {
                Error::CorruptPayload("short 000C payload".to_string())
            })?;
            if matches!(class, 0x0D | 0x0E) {
                return Ok(MsgIndex::Domain(0xFA));
            }
            if class == 0x0F {
                return Ok(MsgIndex::Domain(0xFC));
            }
            if src_type == 2 {
                ensure(seqx < 8, "UFH circuit index out of range")?;
                let zone_id = *pkt.payload.get(2).ok_or_else(|| {
                    Error::CorruptPayload("short 000C payload".to_string())
                })?;
                if zone_id == 0x7F {
                    return Ok(MsgIndex::UfhCircuit {
                        idx: seqx,
                        zone_idx: None,
                    });
                }
                ensure(zone_id < ctx.max_zones, "zone index out of range")?;
                return Ok(MsgIndex::UfhCircuit {
                    idx: seqx,
                    zone_idx: Some(zone_id),
                });
            }
            if dst_type == 2 {
                ensure(seqx < 8, "UFH circuit index out of range")?;
                return Ok(MsgIndex::UfhCircuit {
                    idx: seqx,
                    zone_idx: None,
                });
            }
            ensure(seqx < ctx.max_zones, "zone index out of range")?;
            Ok(MsgIndex::Zone(seqx))
        }

        0x0016 if matches!(src_type, 12 | 22) || matches!(dst_type, 12 | 22) => {
            ensure(seqx < ctx.max_zones, "zone index out of range")?;
            if matches!(src_type, 1 | 2 | 18) {
                Ok(MsgIndex::Zone(seqx))
            } else {
                Ok(MsgIndex::Parent(seqx))
            }
        }

        // the log index is carried elsewhere in the payload
        0x0418 => {
            ensure(seqx < 64, "log index out of range")?;
            Ok(MsgIndex::None)
        }

        0x22C9 => {
            ensure(seqx < 8, "UFH circuit index out of range")?;
            Ok(MsgIndex::UfhCircuit {
                idx: seqx,
                zone_idx: None,
            })
        }

        0x31D9 | 0x31DA => {
            ensure(matches!(seqx, 0x00 | 0x01 | 0x21), "invalid vent id")?;
            Ok(MsgIndex::Vent(seqx))
        }

        // hometronics states use domains outside F8..FE
        0x2D49 => {
            if seqx >= 0x80 {
                Ok(MsgIndex::Domain(seqx))
            } else {
                ensure(seqx < ctx.max_zones, "zone index out of range")?;
                Ok(MsgIndex::Zone(seqx))
            }
        }

        code if MAY_USE_DOMAIN_ID.contains(&code) && (0xF8..=0xFE).contains(&seqx) => {
            Ok(MsgIndex::Domain(seqx))
        }

        code if MAY_USE_ZONE_IDX.contains(&code) => {
            ensure(seqx < ctx.max_zones, "zone index out of range")?;
            if matches!(src_type, 1 | 2 | 23) || matches!(dst_type, 1 | 2 | 23) {
                if src_type == 2 && pkt.src == pkt.dst {
                    Ok(MsgIndex::UfhCircuit {
                        idx: seqx,
                        zone_idx: None,
                    })
                } else if matches!(src_type, 1 | 2 | 18 | 23) {
                    Ok(MsgIndex::Zone(seqx))
                } else {
                    Ok(MsgIndex::Parent(seqx))
                }
            } else if src_type == 3 {
                Ok(MsgIndex::Parent(seqx))
            } else {
                ensure(seqx == 0, "unexpected index")?;
                Ok(MsgIndex::None)
            }
        }

        _ => {
            ensure(seqx == 0, "unexpected index")?;
            Ok(MsgIndex::None)
        }
    }
}

/// Parses a packet's payload into its index and typed record(s).
///
/// `is_array` comes from [`is_array`]; `max_zones` bounds every zone index.
pub fn parse(pkt: &Packet, is_array: bool, max_zones: u8) -> Result<(MsgIndex, Payload)> {
    let ctx = Ctx {
        pkt,
        is_array,
        max_zones,
    };
    let p = &pkt.payload;

    if pkt.verb == Verb::Rq {
        return parse_request(p, &ctx);
    }

    let payload = parse_payload(pkt.code, p, &ctx)?;
    let index = if payload.is_array() {
        MsgIndex::None
    } else {
        index_of(p.first().copied().unwrap_or(0), &ctx)?
    };
    Ok((index, payload))
}

/// The RQ shapes: most requests carry only an index, some carry real fields.
fn parse_request(p: &[u8], ctx: &Ctx) -> Result<(MsgIndex, Payload)> {
    let pkt = ctx.pkt;
    let seqx = p.first().copied().unwrap_or(0);

    // the host gateway probes with short, index-only requests
    if pkt.src.is_gateway() && matches!(pkt.code, 0x10A0 | 0x12B0 | 0x2349 | 0x30C9) {
        ensure(p.len() <= 2, "over-long request")?;
        return Ok((index_of(seqx, ctx)?, Payload::Empty));
    }

    match pkt.code {
        0x000C => {
            ensure(p.len() == 2, "000C request length")?;
            Ok((index_of(seqx, ctx)?, parser_000c(p, ctx)?))
        }
        0x0004 | 0x0016 | 0x12B0 | 0x30C9 => {
            ensure(p.len() == 2, "request length")?;
            Ok((index_of(seqx, ctx)?, Payload::Empty))
        }
        0x2349 => {
            ensure(p.len() == 7, "2349 request length")?;
            Ok((index_of(seqx, ctx)?, Payload::Empty))
        }
        0x000A | 0x2309 => {
            if matches!(pkt.src.dev_type(), 12 | 22) {
                // these stats request with a reply-length payload
                let want = if pkt.code == 0x000A { 6 } else { 3 };
                ensure(p.len() == want, "request length")?;
            } else {
                ensure(p.len() == 1, "request length")?;
            }
            Ok((index_of(seqx, ctx)?, Payload::Empty))
        }
        0x0005 => {
            ensure(p.len() == 2, "0005 request length")?;
            ensure(p[0] == 0, "0005 request index")?;
            Ok((MsgIndex::None, Payload::SystemZonesRequest { zone_type: p[1] }))
        }
        0x0100 => {
            ensure(matches!(p.len(), 1 | 5), "0100 request length")?;
            Ok((MsgIndex::None, parser_0100(p, ctx)?))
        }
        0x0404 => {
            ensure(p.len() == 7, "0404 request length")?;
            Ok((index_of(seqx, ctx)?, parser_0404(p, ctx)?))
        }
        0x0418 => {
            ensure(p.len() == 3, "0418 request length")?;
            ensure(p[0] == 0 && p[1] == 0, "0418 request prefix")?;
            ensure(p[2] <= 63, "log index out of range")?;
            Ok((MsgIndex::None, Payload::FaultLogRequest { log_idx: p[2] }))
        }
        0x10A0 => {
            let want = if pkt.src.dev_type() == 7 { 6 } else { 1 };
            ensure(p.len() == want, "10A0 request length")?;
            Ok((MsgIndex::None, parser_10a0(p, ctx)?))
        }
        0x1100 => {
            ensure(matches!(p[0], 0x00 | 0xFC), "1100 request index")?;
            if p.len() > 2 {
                Ok((index_of(seqx, ctx)?, parser_1100(p, ctx)?))
            } else {
                Ok((index_of(seqx, ctx)?, Payload::Empty))
            }
        }
        0x10E0 | 0x1260 | 0x1F41 | 0x1FC9 | 0x2E04 => {
            let want = if pkt.code == 0x2E04 { 0xFF } else { 0x00 };
            ensure(p == [want], "request payload")?;
            Ok((MsgIndex::None, Payload::Empty))
        }
        0x0006 | 0x0008 | 0x1F09 | 0x22D9 | 0x313F | 0x3EF0 => {
            ensure(p == [0x00], "request payload")?;
            Ok((MsgIndex::None, Payload::Empty))
        }
        0x31D9 | 0x31DA => {
            ensure(p.len() == 1, "request length")?;
            Ok((index_of(seqx, ctx)?, Payload::Empty))
        }
        0x3220 => {
            ensure(p.len() == 5, "3220 request length")?;
            Ok((MsgIndex::None, parser_3220(p, ctx)?))
        }
        0x3EF1 => {
            ensure(p.iter().skip(1).all(|b| *b == 0), "3EF1 request payload")?;
            Ok((index_of(seqx, ctx)?, Payload::Empty))
        }
        code if is_known_code(code) => {
            Err(Error::CorruptPayload(format!("unknown RQ for {code:04X}")))
        }
        code => Err(Error::UnknownCode(code)),
    }
}

/// Returns `true` if a decoder is registered for the code.
pub fn is_known_code(code: u16) -> bool {
    matches!(
        code,
        0x0001 | 0x0002 | 0x0004 | 0x0005 | 0x0006 | 0x0008 | 0x0009 | 0x000A | 0x000C | 0x000E
            | 0x0016 | 0x0100 | 0x01D0 | 0x01E9 | 0x0404 | 0x0418 | 0x042F | 0x1030 | 0x1060
            | 0x1090 | 0x10A0 | 0x10E0 | 0x1100 | 0x1260 | 0x1290 | 0x12A0 | 0x12B0 | 0x1F09
            | 0x1F41 | 0x1FC9 | 0x1FD4 | 0x2249 | 0x22C9 | 0x22D0 | 0x22D9 | 0x22F1 | 0x22F3
            | 0x2309 | 0x2349 | 0x2D49 | 0x2E04 | 0x30C9 | 0x3120 | 0x313F | 0x3150 | 0x31D9
            | 0x31DA | 0x31E0 | 0x3220 | 0x3B00 | 0x3EF0 | 0x3EF1
    )
}

fn parse_payload(code: u16, p: &[u8], ctx: &Ctx) -> Result<Payload> {
    match code {
        0x0001 => parser_0001(p, ctx),
        0x0002 => parser_0002(p, ctx),
        0x0004 => parser_0004(p, ctx),
        0x0005 => parser_0005(p, ctx),
        0x0006 => parser_0006(p, ctx),
        0x0008 => parser_0008(p, ctx),
        0x0009 => parser_0009(p, ctx),
        0x000A => parser_000a(p, ctx),
        0x000C => parser_000c(p, ctx),
        0x000E => parser_000e(p, ctx),
        0x0016 => parser_0016(p, ctx),
        0x0100 => parser_0100(p, ctx),
        0x01D0 => parser_01d0(p, ctx),
        0x01E9 => parser_01e9(p, ctx),
        0x0404 => parser_0404(p, ctx),
        0x0418 => parser_0418(p, ctx),
        0x042F => parser_042f(p, ctx),
        0x1030 => parser_1030(p, ctx),
        0x1060 => parser_1060(p, ctx),
        0x1090 => parser_1090(p, ctx),
        0x10A0 => parser_10a0(p, ctx),
        0x10E0 => parser_10e0(p, ctx),
        0x1100 => parser_1100(p, ctx),
        0x1260 => parser_1260(p, ctx),
        0x1290 => parser_1290(p, ctx),
        0x12A0 => parser_12a0(p, ctx),
        0x12B0 => parser_12b0(p, ctx),
        0x1F09 => parser_1f09(p, ctx),
        0x1F41 => parser_1f41(p, ctx),
        0x1FC9 => parser_1fc9(p, ctx),
        0x1FD4 => parser_1fd4(p, ctx),
        0x2249 => parser_2249(p, ctx),
        0x22C9 => parser_22c9(p, ctx),
        0x22D0 => parser_22d0(p, ctx),
        0x22D9 => parser_22d9(p, ctx),
        0x22F1 => parser_22f1(p, ctx),
        0x22F3 => parser_22f3(p, ctx),
        0x2309 => parser_2309(p, ctx),
        0x2349 => parser_2349(p, ctx),
        0x2D49 => parser_2d49(p, ctx),
        0x2E04 => parser_2e04(p, ctx),
        0x30C9 => parser_30c9(p, ctx),
        0x3120 => parser_3120(p, ctx),
        0x313F => parser_313f(p, ctx),
        0x3150 => parser_3150(p, ctx),
        0x31D9 => parser_31d9(p, ctx),
        0x31DA => parser_31da(p, ctx),
        0x31E0 => parser_31e0(p, ctx),
        0x3220 => parser_3220(p, ctx),
        0x3B00 => parser_3b00(p, ctx),
        0x3EF0 => parser_3ef0(p, ctx),
        0x3EF1 => parser_3ef1(p, ctx),
        code => Err(Error::UnknownCode(code)),
    }
}

// rf_unknown
fn parser_0001(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(matches!(ctx.pkt.verb, Verb::I | Verb::W), "0001 verb")?;
    ensure(p.len() == 5, "0001 length")?;
    ensure(
        matches!(p[0], 0xFC | 0xFF) || p[0] < ctx.max_zones,
        "0001 index",
    )?;
    ensure(
        (p[1] == 0 && p[2] == 0) || (p[1] == 0xFF && p[2] == 0xFF),
        "0001 body",
    )?;
    ensure(matches!(p[3], 0x02 | 0x05), "0001 body")?;
    Ok(Payload::RfUnknown {
        unknown_0: [p[1], p[2]],
        unknown_1: p[3],
        unknown_2: p[4..].to_vec(),
    })
}

// sensor_weather
fn parser_0002(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 4, "0002 length")?;
    Ok(Payload::WeatherSensor {
        temperature: temp_from(&p[1..3])?,
        unknown_0: p[3..].to_vec(),
    })
}

// zone_name
fn parser_0004(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 22, "0004 length")?;
    ensure(p[1] == 0, "0004 body")?;
    let name = if p[2..].iter().all(|b| *b == 0x7F) {
        None
    } else {
        str_from(&p[2..])
    };
    Ok(Payload::ZoneName { name })
}

// system_zone
fn parser_0005(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    fn rec(chunk: &[u8], max_zones: u8) -> Result<SystemZonesRec> {
        ensure(chunk.len() == 4, "0005 element length")?;
        let mut zone_mask = Vec::with_capacity(16);
        for byte in &chunk[2..4] {
            for bit in 0..8 {
                zone_mask.push(byte & (1 << bit) != 0);
            }
        }
        zone_mask.truncate(usize::from(max_zones));
        Ok(SystemZonesRec {
            zone_type: chunk[1],
            zone_mask,
        })
    }

    ensure(
        matches!(ctx.pkt.verb, Verb::I | Verb::Rp),
        "0005 verb",
    )?;
    if ctx.pkt.src.dev_type() == 34 {
        ensure(p.len() % 4 == 0 && !p.is_empty(), "0005 length")?;
        return Ok(Payload::SystemZones(
            p.chunks(4)
                .map(|chunk| rec(chunk, ctx.max_zones))
                .collect::<Result<_>>()?,
        ));
    }

    ensure(matches!(ctx.pkt.src.dev_type(), 1 | 2), "0005 source")?;
    ensure(p.len() == 4, "0005 length")?;
    Ok(Payload::SystemZones(vec![rec(p, ctx.max_zones)?]))
}

// schedule_sync
fn parser_0006(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(ctx.pkt.verb == Verb::Rp, "0006 verb")?;
    ensure(p.len() == 4, "0006 length")?;
    ensure(p[0] == 0, "0006 body")?;
    ensure(matches!(p[1], 0x05 | 0xFF), "0006 body")?;
    Ok(Payload::ScheduleVersion {
        header: [p[0], p[1]],
        num_changes: BigEndian::read_u16(&p[2..4]),
    })
}

// relay_demand
fn parser_0008(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 2, "0008 length")?;
    if !matches!(p[0], 0xF9 | 0xFA | 0xFC) {
        ensure(p[0] < ctx.max_zones, "0008 index")?;
    }
    Ok(Payload::RelayDemand {
        relay_demand: percent_from(p[1])?,
    })
}

// relay_failsafe
fn parser_0009(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    fn rec(chunk: &[u8], ctx: &Ctx) -> Result<FailsafeRec> {
        ensure(
            matches!(chunk[0], 0xF9 | 0xFC) || chunk[0] < ctx.max_zones,
            "0009 index",
        )?;
        ensure(matches!(chunk[1], 0x00 | 0x01), "0009 flag")?;
        ensure(matches!(chunk[2], 0x00 | 0xFF), "0009 body")?;
        Ok(FailsafeRec {
            index: index_of(chunk[0], ctx)?,
            failsafe_enabled: Some(chunk[1] == 0x01),
        })
    }

    if ctx.is_array {
        ensure(p.len() >= 3 && p.len() % 3 == 0, "0009 length")?;
        return Ok(Payload::RelayFailsafe(
            p.chunks(3).map(|chunk| rec(chunk, ctx)).collect::<Result<_>>()?,
        ));
    }

    ensure(p.len() == 3, "0009 length")?;
    Ok(Payload::RelayFailsafe(vec![rec(p, ctx)?]))
}

// zone_config
fn parser_000a(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    fn rec(chunk: &[u8], ctx: &Ctx) -> Result<ZoneConfigRec> {
        ensure(chunk[0] < ctx.max_zones, "zone index out of range")?;
        let bitmap = chunk[1];
        Ok(ZoneConfigRec {
            zone_idx: chunk[0],
            min_temp: temp_from(&chunk[2..4])?,
            max_temp: temp_from(&chunk[4..6])?,
            local_override: bitmap & 1 == 0,
            openwindow_function: bitmap & 2 == 0,
            multiroom_mode: bitmap & 16 == 0,
        })
    }

    if ctx.is_array {
        ensure(p.len() >= 6 && p.len() % 6 == 0, "000A length")?;
        return Ok(Payload::ZoneConfigArray(
            p.chunks(6).map(|chunk| rec(chunk, ctx)).collect::<Result<_>>()?,
        ));
    }

    ensure(p.len() == 6, "000A length")?;
    Ok(Payload::ZoneConfig(rec(p, ctx)?))
}

// zone_devices
fn parser_000c(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() >= 2, "000C length")?;
    let mut device_class = DeviceClass::from_byte(p[1])
        .ok_or_else(|| Error::CorruptPayload(format!("000C device class: {:02X}", p[1])))?;
    if device_class == DeviceClass::DhwValve && p[0] == 0x01 {
        device_class = DeviceClass::HeatingValve;
    }

    if ctx.pkt.verb == Verb::Rq {
        ensure(p.len() == 2, "000C request length")?;
        return Ok(Payload::ZoneDevicesRequest { device_class });
    }

    ensure(p.len() >= 6 && p.len() % 6 == 0, "000C length")?;
    let mut devices = Vec::new();
    for chunk in p.chunks(6) {
        ensure(chunk[0] == p[0], "000C element index")?;
        ensure(chunk[1] == p[1], "000C element class")?;
        ensure(
            chunk[2] == 0x7F || chunk[2] < ctx.max_zones,
            "000C element zone",
        )?;
        if chunk[2] != 0x7F {
            devices.push(Address::from_hex(&crate::packet::hex_from_payload(
                &chunk[3..6],
            ))?);
        }
    }
    Ok(Payload::ZoneDevices {
        device_class,
        devices,
    })
}

// unknown, from a round thermostat
fn parser_000e(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p == [0x00, 0x00, 0x14], "000E body")?;
    Ok(Payload::Unknown000E {
        unknown: p.to_vec(),
    })
}

// rf_check
fn parser_0016(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(
        matches!(ctx.pkt.verb, Verb::Rq | Verb::Rp),
        "0016 verb",
    )?;
    ensure(p.len() == 2, "0016 length")?;
    let rf_value = p[1];
    Ok(Payload::RfCheck {
        rf_strength: (rf_value / 5 + 1).min(5),
        rf_value,
    })
}

// language (of device/system)
fn parser_0100(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    if ctx.pkt.verb == Verb::Rq && p == [0x00] {
        return Ok(Payload::Empty);
    }
    ensure(p.len() == 5, "0100 length")?;
    ensure(p[0] == 0, "0100 body")?;
    ensure(p[3] == 0xFF && p[4] == 0xFF, "0100 body")?;
    Ok(Payload::Language {
        language: str_from(&p[1..3]),
    })
}

// unknown, from a HR91 (when its buttons are pushed)
fn parser_01d0(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 2, "01D0 length")?;
    ensure(matches!(p[1], 0x00 | 0x03), "01D0 body")?;
    Ok(Payload::Unknown01D0 { unknown_0: p[1] })
}

// unknown, from a HR91 (when its buttons are pushed)
fn parser_01e9(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 2, "01E9 length")?;
    ensure(matches!(p[1], 0x00 | 0x03), "01E9 body")?;
    Ok(Payload::Unknown01E9 { unknown_0: p[1] })
}

// zone_schedule (fragment)
fn parser_0404(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() >= 7, "0404 length")?;
    ensure(p[1] == 0x20 && p[2] == 0x00 && p[3] == 0x08, "0404 header")?;

    let fragment = if ctx.pkt.verb == Verb::Rq {
        ensure(p.len() == 7, "0404 request length")?;
        Vec::new()
    } else {
        p[7..].to_vec()
    };
    Ok(Payload::ScheduleFragment {
        frag_length: p[4],
        frag_index: p[5],
        frag_total: p[6],
        fragment,
    })
}

// system_fault
fn parser_0418(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    if p == crate::header::NULL_FAULT_LOG_RP {
        return Ok(Payload::FaultLogNull);
    }

    ensure(matches!(ctx.pkt.verb, Verb::I | Verb::Rp), "0418 verb")?;
    ensure(p.len() == 22, "0418 length")?;
    ensure(p[0] == 0, "0418 body")?;
    let fault_state = FaultState::from_byte(p[1])
        .ok_or_else(|| Error::CorruptPayload(format!("0418 fault state: {:02X}", p[1])))?;
    ensure(p[2] <= 63, "log index out of range")?;
    ensure(p[3] == 0xB0, "0418 body")?;
    let fault_type = FaultType::from_byte(p[4])
        .ok_or_else(|| Error::CorruptPayload(format!("0418 fault type: {:02X}", p[4])))?;
    // domain 1C has been seen where FC was expected
    ensure(
        p[5] < ctx.max_zones || matches!(p[5], 0xF9 | 0xFA | 0xFC | 0x1C),
        "0418 domain",
    )?;
    let device_class = FaultDeviceClass::from_byte(p[6])
        .ok_or_else(|| Error::CorruptPayload(format!("0418 device class: {:02X}", p[6])))?;
    ensure(p[7] == 0 && p[8] == 0, "0418 body")?;
    ensure(matches!(p[14], 0x7F | 0xFF), "0418 body")?;
    ensure(&p[15..19] == [0xFF, 0xFF, 0x70, 0x00], "0418 body")?;

    let index = if device_class == FaultDeviceClass::Controller {
        MsgIndex::None
    } else if p[5] < ctx.max_zones {
        MsgIndex::Zone(p[5])
    } else {
        MsgIndex::Domain(p[5])
    };

    let device_id = match &p[19..22] {
        [0x00, 0x00, 0x00..=0x02] => None,
        hex => Some(Address::from_hex(&crate::packet::hex_from_payload(hex))?),
    };

    Ok(Payload::FaultLogEntry(FaultLogRec {
        log_idx: p[2],
        timestamp: fault_timestamp(&p[9..15])?,
        fault_state,
        fault_type,
        device_class,
        index,
        device_id,
    }))
}

/// Unpacks the bit-packed 6-byte fault-log timestamp.
fn fault_timestamp(bytes: &[u8]) -> Result<NaiveDateTime> {
    let mut word = 0u64;
    for byte in bytes {
        word = word << 8 | u64::from(*byte);
    }

    let year = 2000 + ((word >> 24) & 0b111_1111) as i32;
    let month = ((word >> 36) & 0b1111) as u32;
    let day = ((word >> 31) & 0b1_1111) as u32;
    let hour = ((word >> 19) & 0b1_1111) as u32;
    let minute = ((word >> 13) & 0b11_1111) as u32;
    let second = ((word >> 7) & 0b11_1111) as u32;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| Error::CorruptPayload("0418 timestamp".to_string()))
}

// unknown counters, from a round thermostat
fn parser_042f(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(matches!(p.len(), 8 | 9), "042F length")?;
    ensure(p[0] == 0, "042F body")?;
    Ok(Payload::Counters {
        counter_1: BigEndian::read_u16(&p[1..3]),
        counter_2: BigEndian::read_u16(&p[3..5]),
        counter_total: BigEndian::read_u16(&p[5..7]),
        unknown_0: p[7..].to_vec(),
    })
}

// mixvalve_config
fn parser_1030(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 16, "1030 length")?;
    ensure(matches!(p[15], 0x00 | 0x01), "1030 body")?;

    let mut rec = MixConfigRec {
        max_flow_temp: 0,
        pump_run_time: 0,
        actuator_run_time: 0,
        min_flow_temp: 0,
        unknown_0: 0,
    };
    for chunk in p[1..16].chunks(3) {
        ensure(chunk[1] == 0x01, "1030 element")?;
        match chunk[0] {
            0xC8 => rec.max_flow_temp = chunk[2],
            0xC9 => rec.pump_run_time = chunk[2],
            0xCA => rec.actuator_run_time = chunk[2],
            0xCB => rec.min_flow_temp = chunk[2],
            0xCC => rec.unknown_0 = chunk[2],
            param => {
                return Err(Error::CorruptPayload(format!("1030 parameter: {param:02X}")));
            }
        }
    }
    Ok(Payload::MixConfig(rec))
}

// device_battery
fn parser_1060(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 3, "1060 length")?;
    ensure(matches!(p[2], 0x00 | 0x01), "1060 body")?;
    Ok(Payload::BatteryState {
        low_battery: p[2] == 0x00,
        battery_level: percent_from(p[1])?,
    })
}

// unknown (non-evohome, e.g. ST9520C)
fn parser_1090(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 5, "1090 length")?;
    ensure(p[0] < 2, "1090 index")?;
    Ok(Payload::Setpoints1090 {
        temp_0: temp_from(&p[1..3])?,
        temp_1: temp_from(&p[3..5])?,
    })
}

// dhw_params
fn parser_10a0(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(matches!(p.len(), 3 | 6), "10A0 length")?;
    ensure(p[0] == 0, "10A0 body")?;

    let mut setpoint = temp_from(&p[1..3])?;
    if setpoint == Some(Temp::Celsius(255.0)) {
        setpoint = None;
    }
    Ok(Payload::DhwParams {
        setpoint,
        overrun: p.get(3).copied(),
        differential: if p.len() >= 6 {
            temp_from(&p[4..6])?
        } else {
            None
        },
    })
}

// device_info
fn parser_10e0(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(matches!(p.len(), 30 | 36 | 38), "10E0 length")?;
    Ok(Payload::DeviceInfo {
        description: str_from(&p[18..]),
        firmware: date_from(&p[10..14])?,
        manufactured: date_from(&p[14..18])?,
        unknown: p[0..10].to_vec(),
    })
}

// tpi_params
fn parser_1100(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(matches!(p.len(), 5 | 8), "1100 length")?;
    ensure(matches!(p[0], 0x00 | 0xFC), "1100 index")?;
    ensure((4..=48).contains(&p[1]), "1100 cycle rate")?;
    ensure((4..=120).contains(&p[2]), "1100 min on time")?;
    ensure(matches!(p[4], 0x00 | 0xFF), "1100 body")?;

    let proportional_band_width = if p.len() == 8 {
        ensure(p[7] == 0x01, "1100 body")?;
        temp_from(&p[5..7])?
    } else {
        None
    };
    Ok(Payload::TpiParams {
        cycle_rate: f64::from(p[1]) / 4.0,
        minimum_on_time: f64::from(p[2]) / 4.0,
        minimum_off_time: f64::from(p[3]) / 4.0,
        proportional_band_width,
    })
}

// dhw_temp
fn parser_1260(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 3, "1260 length")?;
    ensure(p[0] == 0, "1260 body")?;
    Ok(Payload::DhwTemp {
        temperature: temp_from(&p[1..3])?,
    })
}

// outdoor_temp
fn parser_1290(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 3, "1290 length")?;
    ensure(p[0] == 0, "1290 body")?;
    Ok(Payload::OutdoorTemp {
        temperature: temp_from(&p[1..3])?,
    })
}

// indoor_humidity (Nuaire RH sensor)
fn parser_12a0(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 6, "12A0 length")?;
    ensure(p[0] == 0, "12A0 body")?;
    Ok(Payload::IndoorHumidity {
        relative_humidity: f64::from(p[1]) / 100.0,
        temperature: temp_from(&p[2..4])?,
        dewpoint_temp: temp_from(&p[4..6])?,
    })
}

// window_state (of a device/zone)
fn parser_12b0(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 3, "12B0 length")?;
    ensure(
        matches!(&p[1..3], [0x00, 0x00] | [0xC8, 0x00] | [0xFF, 0xFF]),
        "12B0 body",
    )?;
    Ok(Payload::WindowState {
        window_open: bool_from(p[1])?,
    })
}

// system_sync
fn parser_1f09(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 3, "1F09 length")?;
    ensure(matches!(p[0], 0x00 | 0xF8 | 0xFF), "1F09 index")?;
    Ok(Payload::SystemSync {
        remaining_seconds: f64::from(BigEndian::read_u16(&p[1..3])) / 10.0,
    })
}

// dhw_mode
fn parser_1f41(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(matches!(p.len(), 6 | 12), "1F41 length")?;
    ensure(p[0] == 0, "1F41 body")?;
    ensure(matches!(p[1], 0x00 | 0x01 | 0xFF), "1F41 state")?;
    let mode = ZoneMode::from_byte(p[2]);
    ensure(mode.is_some(), "1F41 mode")?;
    if p[2] == 0x04 {
        ensure(p.len() == 12, "1F41 length")?;
        ensure(&p[3..6] == [0xFF, 0xFF, 0xFF], "1F41 body")?;
    }

    Ok(Payload::DhwMode {
        active: match p[1] {
            0x00 => Some(false),
            0x01 => Some(true),
            _ => None,
        },
        mode,
        until: if p[2] == 0x04 {
            Some(dtm_from(&p[6..12])?)
        } else {
            None
        },
    })
}

// rf_bind
fn parser_1fc9(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(
        matches!(ctx.pkt.verb, Verb::I | Verb::W | Verb::Rp),
        "1FC9 verb",
    )?;
    ensure(p.len() >= 6 && p.len() % 6 == 0, "1FC9 length")?;
    ensure(
        ctx.pkt.src == Address::from_hex(&crate::packet::hex_from_payload(&p[3..6]))?,
        "1FC9 source",
    )?;

    let mut recs = Vec::new();
    for chunk in p.chunks(6) {
        if chunk[0] == 0x90 {
            continue;
        }
        ensure(&chunk[3..6] == &p[3..6], "1FC9 element device")?;
        if !matches!(chunk[0], 0xF9 | 0xFA | 0xFB | 0xFC) {
            ensure(chunk[0] < ctx.max_zones, "1FC9 element index")?;
        }
        recs.push(BindRec {
            index: chunk[0],
            code: BigEndian::read_u16(&chunk[1..3]),
        });
    }
    Ok(Payload::RfBind(recs))
}

// opentherm_sync
fn parser_1fd4(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(ctx.pkt.verb == Verb::I, "1FD4 verb")?;
    ensure(p.len() == 3, "1FD4 length")?;
    ensure(p[0] == 0, "1FD4 body")?;
    Ok(Payload::OpenthermSync {
        ticker: BigEndian::read_u16(&p[1..3]),
    })
}

// now_next_setpoint (non-evohome, e.g. Sundial programmer)
fn parser_2249(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    fn rec(chunk: &[u8], ctx: &Ctx) -> Result<NowNextRec> {
        ensure(chunk[0] < ctx.max_zones, "zone index out of range")?;
        Ok(NowNextRec {
            zone_idx: chunk[0],
            setpoint_now: temp_from(&chunk[1..3])?,
            setpoint_next: temp_from(&chunk[3..5])?,
            countdown: BigEndian::read_u16(&chunk[5..7]),
        })
    }

    if ctx.is_array {
        ensure(p.len() >= 7 && p.len() % 7 == 0, "2249 length")?;
        return Ok(Payload::NowNextSetpointArray(
            p.chunks(7).map(|chunk| rec(chunk, ctx)).collect::<Result<_>>()?,
        ));
    }

    ensure(p.len() == 7, "2249 length")?;
    Ok(Payload::NowNextSetpoint(rec(p, ctx)?))
}

// ufh_setpoint
fn parser_22c9(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() >= 6 && p.len() % 6 == 0, "22C9 length")?;
    let mut recs = Vec::new();
    for chunk in p.chunks(6) {
        ensure(chunk[5] == 0x01, "22C9 element")?;
        ensure(chunk[0] < 8, "UFH circuit index out of range")?;
        recs.push(UfhSetpointRec {
            ufh_idx: chunk[0],
            temp_low: temp_from(&chunk[1..3])?,
            temp_high: temp_from(&chunk[3..5])?,
        });
    }
    Ok(Payload::UfhSetpoints(recs))
}

// system switch?
fn parser_22d0(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 4, "22D0 length")?;
    ensure(p[0] == 0, "22D0 body")?;
    ensure(&p[1..4] == [0x00, 0x00, 0x02], "22D0 body")?;
    Ok(Payload::Unknown22D0 {
        unknown: p[1..].to_vec(),
    })
}

// boiler_setpoint
fn parser_22d9(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 3, "22D9 length")?;
    ensure(p[0] == 0, "22D9 body")?;
    Ok(Payload::BoilerSetpoint {
        setpoint: temp_from(&p[1..3])?,
    })
}

// ???? (Nuaire 2 x 2-way switch)
fn parser_22f1(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 3, "22F1 length")?;
    ensure(p[0] == 0, "22F1 body")?;
    ensure(matches!(p[2], 0x04 | 0x0A), "22F1 body")?;

    let bitmap = p[1];
    let (fan_mode, heater_mode) = match bitmap {
        2 => (Some("normal"), None),
        3 => (Some("boost"), None),
        9 => (None, Some("off")),
        10 => (None, Some("auto")),
        _ => (None, None),
    };
    Ok(Payload::Switch {
        bitmap,
        fan_mode,
        heater_mode,
        unknown_0: p[2],
    })
}

// similar to 22F1? switch?
fn parser_22f3(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 3, "22F3 length")?;
    ensure(p[0] == 0, "22F3 body")?;
    ensure(p[2] == 0x0A, "22F3 body")?;
    Ok(Payload::SwitchOther { bitmap: p[1] })
}

// setpoint (of device/zones)
fn parser_2309(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    fn rec(chunk: &[u8], ctx: &Ctx) -> Result<SetpointRec> {
        ensure(chunk[0] < ctx.max_zones, "zone index out of range")?;
        Ok(SetpointRec {
            zone_idx: chunk[0],
            setpoint: temp_from(&chunk[1..3])?,
        })
    }

    ensure(
        matches!(ctx.pkt.verb, Verb::I | Verb::Rp | Verb::W),
        "2309 verb",
    )?;
    if ctx.is_array {
        ensure(p.len() >= 3 && p.len() % 3 == 0, "2309 length")?;
        return Ok(Payload::SetpointArray(
            p.chunks(3).map(|chunk| rec(chunk, ctx)).collect::<Result<_>>()?,
        ));
    }

    ensure(p.len() == 3, "2309 length")?;
    Ok(Payload::Setpoint(rec(p, ctx)?))
}

// zone_mode
fn parser_2349(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(
        matches!(ctx.pkt.verb, Verb::I | Verb::Rp | Verb::W),
        "2349 verb",
    )?;
    ensure(matches!(p.len(), 4 | 7 | 13), "2349 length")?;
    let mode = ZoneMode::from_byte(p[3])
        .ok_or_else(|| Error::CorruptPayload(format!("2349 mode: {:02X}", p[3])))?;
    if p.len() >= 7 {
        ensure(&p[4..7] == [0xFF, 0xFF, 0xFF], "2349 body")?;
    }
    if p.len() >= 13 {
        ensure(mode == ZoneMode::Temporary, "2349 mode")?;
    }

    Ok(Payload::ZoneMode {
        mode,
        setpoint: temp_from(&p[1..3])?,
        until: if p.len() >= 13 {
            Some(dtm_from(&p[7..13])?)
        } else {
            None
        },
    })
}

// hometronics state (of unknown)
fn parser_2d49(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 3, "2D49 length")?;
    ensure(
        matches!(p[0], 0x88 | 0xFD) || p[0] < ctx.max_zones,
        "2D49 index",
    )?;
    ensure(
        matches!(&p[1..3], [0x00, 0x00] | [0xC8, 0x00]),
        "2D49 body",
    )?;
    Ok(Payload::Unknown2D49 {
        state: bool_from(p[1])?,
    })
}

// system_mode
fn parser_2e04(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 8, "2E04 length")?;
    let system_mode = SystemMode::from_byte(p[0])
        .ok_or_else(|| Error::CorruptPayload(format!("2E04 mode: {:02X}", p[0])))?;
    Ok(Payload::SystemMode {
        system_mode,
        until: if p[7] != 0 {
            Some(dtm_from(&p[1..7])?)
        } else {
            None
        },
    })
}

// temperature (of device, zone/s)
fn parser_30c9(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    fn rec(chunk: &[u8], ctx: &Ctx) -> Result<TempRec> {
        ensure(chunk[0] < ctx.max_zones, "zone index out of range")?;
        Ok(TempRec {
            zone_idx: chunk[0],
            temperature: temp_from(&chunk[1..3])?,
        })
    }

    if ctx.is_array {
        ensure(p.len() >= 3 && p.len() % 3 == 0, "30C9 length")?;
        return Ok(Payload::TemperatureArray(
            p.chunks(3).map(|chunk| rec(chunk, ctx)).collect::<Result<_>>()?,
        ));
    }

    ensure(p.len() == 3, "30C9 length")?;
    Ok(Payload::Temperature(rec(p, ctx)?))
}

// unknown, from a round thermostat (sent every ~3:45:00)
fn parser_3120(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(ctx.pkt.src.dev_type() == 34, "3120 source")?;
    ensure(p == [0x00, 0x70, 0xB0, 0x00, 0x00, 0x00, 0xFF], "3120 body")?;
    Ok(Payload::Unknown3120 {
        unknown: p.to_vec(),
    })
}

// datetime_sync
fn parser_313f(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 9, "313F length")?;
    ensure(p[0] == 0, "313F body")?;
    Ok(Payload::Datetime {
        datetime: dtm_from(&p[2..9])?,
        is_dst: if p[2] & 0x80 != 0 { Some(true) } else { None },
        unknown_0: p[1],
    })
}

// heat_demand (of device, FC domain)
fn parser_3150(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    if ctx.pkt.src.dev_type() == 2 && ctx.is_array {
        ensure(p.len() >= 2 && p.len() % 2 == 0, "3150 length")?;
        let mut recs = Vec::new();
        for chunk in p.chunks(2) {
            recs.push(HeatDemandRec {
                index: index_of(chunk[0], ctx)?,
                heat_demand: percent_from(chunk[1])?,
            });
        }
        return Ok(Payload::HeatDemandArray(recs));
    }

    ensure(p.len() == 2, "3150 length")?;
    Ok(Payload::HeatDemand(HeatDemandRec {
        index: index_of(p[0], ctx)?,
        heat_demand: percent_from(p[1])?,
    }))
}

// ventilation fan state
fn parser_31d9(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(matches!(p.len(), 3 | 17), "31D9 length")?;
    ensure(matches!(p[1], 0x00 | 0x06), "31D9 body")?;
    ensure(p[2] == 0xFF || p[2] <= 200, "31D9 percentage")?;

    if p.len() == 17 {
        ensure(p[3] == 0, "31D9 body")?;
        ensure(
            p[4..16].iter().all(|b| *b == 0x00) || p[4..16].iter().all(|b| *b == 0x20),
            "31D9 body",
        )?;
    }
    Ok(Payload::FanState {
        percent_1: percent_from(p[2])?,
        unknown_0: p[1],
        unknown: p.get(3..).unwrap_or_default().to_vec(),
    })
}

// ventilation humidity (Nuaire)
fn parser_31da(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 29, "31DA length")?;
    ensure(&p[1..5] == [0xEF, 0x00, 0x7F, 0xFF], "31DA body")?;
    ensure(
        &p[6..15] == [0xEF, 0x7F, 0xFF, 0x7F, 0xFF, 0x7F, 0xFF, 0x7F, 0xFF],
        "31DA body",
    )?;
    ensure(p[17] == 0xEF, "31DA body")?;
    ensure(p[21] == 0x00, "31DA body")?;
    ensure(matches!(p[23], 0x00 | 0xEF), "31DA body")?;
    ensure(
        &p[24..29] == [0xEF, 0x7F, 0xFF, 0x7F, 0xFF] || &p[24..29] == [0xEF, 0x7F, 0xFF, 0xFF, 0xFF],
        "31DA body",
    )?;

    let relative_humidity = if p[5] == 0xEF {
        None
    } else {
        Some(f64::from(p[5]) / 100.0)
    };
    Ok(Payload::VentHumidity {
        relative_humidity,
        unknown: p[15..].to_vec(),
    })
}

// ???? (Nuaire on/off)
fn parser_31e0(p: &[u8], _ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 4, "31E0 length")?;
    ensure(p[0] == 0 && p[1] == 0, "31E0 body")?;
    ensure(
        matches!(&p[2..4], [0x00, 0x00] | [0xC8, 0x00]),
        "31E0 body",
    )?;
    Ok(Payload::VentState {
        state: bool_from(p[2])?,
        unknown: vec![p[3]],
    })
}

// opentherm_msg
fn parser_3220(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 5 && p[0] == 0, "invalid OpenTherm payload")?;

    let frame = u32::from_be_bytes([p[1], p[2], p[3], p[4]]);
    ensure(
        p[1] >> 7 == opentherm::parity(frame & 0x7FFF_FFFF),
        "invalid OpenTherm check bit",
    )?;
    ensure(p[1] & 0x0F == 0, "invalid OpenTherm type byte")?;

    let masked_type = p[1] & 0x70;
    let msg_type = OtMsgType::from_type_byte(p[1]);
    let id = p[2];
    let message = opentherm::message(id)
        .ok_or_else(|| Error::CorruptPayload(format!("unknown OpenTherm msg id: {id}")))?;

    if ctx.pkt.verb == Verb::Rq {
        ensure(masked_type < 0x30, "invalid OpenTherm msg type")?;
        ensure(p[3] == 0 && p[4] == 0, "OpenTherm request data")?;
        return Ok(Payload::OpenTherm {
            id,
            name: message.name,
            msg_type,
            value: None,
        });
    }

    ensure(masked_type >= 0x30, "invalid OpenTherm msg type")?;
    Ok(Payload::OpenTherm {
        id,
        name: message.name,
        msg_type,
        value: Some(opentherm::decode_value(message.codec, [p[3], p[4]])),
    })
}

// actuator_sync (the TPI cycle heartbeat)
fn parser_3b00(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(p.len() == 2, "3B00 length")?;
    let want = match ctx.pkt.src.dev_type() {
        1 | 23 => 0xFC,
        13 => 0x00,
        _ => return Err(Error::CorruptPayload("3B00 source".to_string())),
    };
    ensure(p[0] == want, "3B00 index")?;
    ensure(p[1] == 0xC8, "3B00 body")?;
    Ok(Payload::ActuatorSync {
        sync_tpi: bool_from(p[1])?,
    })
}

// actuator_state
fn parser_3ef0(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(p[0] == 0, "3EF0 body")?;
    ensure(p.last() == Some(&0xFF), "3EF0 body")?;

    if ctx.pkt.src.dev_type() == 10 {
        ensure(p.len() == 6, "3EF0 length")?;
        ensure(p[1] == 0xFF || p[1] <= 100, "3EF0 modulation")?;
        ensure(matches!(p[2], 0x10 | 0x11), "3EF0 body")?;
        ensure(
            matches!(p[3], 0x00 | 0x01 | 0x02 | 0x04 | 0x08 | 0x0A | 0x0C),
            "3EF0 flame state",
        )?;
        let modulation_level = percent_from(p[1])?;
        return Ok(Payload::ActuatorState {
            actuator_enabled: modulation_level.map_or(false, |level| level > 0.0),
            modulation_level,
            flame_active: Some(p[3] == 0x0A),
            flame_state: Some(p[3]),
        });
    }

    ensure(p.len() == 3, "3EF0 length")?;
    ensure(matches!(p[1], 0x00 | 0xC8), "3EF0 body")?;
    let modulation_level = percent_from(p[1])?;
    Ok(Payload::ActuatorState {
        actuator_enabled: modulation_level.map_or(false, |level| level > 0.0),
        modulation_level,
        flame_active: None,
        flame_state: None,
    })
}

// actuator_cycle
fn parser_3ef1(p: &[u8], ctx: &Ctx) -> Result<Payload> {
    ensure(ctx.pkt.verb == Verb::Rp, "3EF1 verb")?;
    ensure(p.len() == 7, "3EF1 length")?;
    ensure(p[0] == 0, "3EF1 body")?;

    let modulation_level = percent_from(p[5])?;
    let cycle_countdown = match BigEndian::read_u16(&p[1..3]) {
        0x7FFF => None,
        value => Some(value),
    };
    Ok(Payload::ActuatorCycle {
        actuator_enabled: modulation_level.map_or(false, |level| level > 0.0),
        modulation_level,
        actuator_countdown: BigEndian::read_u16(&p[3..5]),
        cycle_countdown,
        unknown_0: p[6],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::{msg_from_line, pkt_from_line};

    #[test]
    fn test_temp_from() {
        assert_eq!(Some(Temp::Celsius(20.24)), temp_from(&[0x07, 0xE8]).unwrap());
        assert_eq!(Some(Temp::Celsius(-1.5)), temp_from(&[0xFF, 0x6A]).unwrap());
        assert_eq!(None, temp_from(&[0x31, 0xFF]).unwrap());
        assert_eq!(None, temp_from(&[0x7F, 0xFF]).unwrap());
        assert_eq!(Some(Temp::Off), temp_from(&[0x7E, 0xFF]).unwrap());
        assert!(temp_from(&[0x07]).is_err());
    }

    #[test]
    fn test_percent_from() {
        assert_eq!(Some(0.0), percent_from(0x00).unwrap());
        assert_eq!(Some(1.0), percent_from(0xC8).unwrap());
        assert_eq!(Some(0.5), percent_from(0x64).unwrap());
        assert_eq!(None, percent_from(0xFE).unwrap());
        assert_eq!(None, percent_from(0xFF).unwrap());
        assert!(percent_from(0xC9).is_err());
    }

    #[test]
    fn test_dtm_from() {
        // MM HH DD MM YYYY (6-byte form, no seconds)
        let dtm = dtm_from(&[0x00, 0x14, 0x1B, 0x0A, 0x07, 0xE3]).unwrap();
        assert_eq!(
            NaiveDate::from_ymd_opt(2019, 10, 27)
                .unwrap()
                .and_hms_opt(20, 0, 0)
                .unwrap(),
            dtm
        );

        // the hour field's top bits carry the day-of-week, the second's the DST flag
        let dtm = dtm_from(&[0x84, 0x00, 0x04 | 0xA0, 0x1C, 0x0A, 0x07, 0xE3]).unwrap();
        assert_eq!(
            NaiveDate::from_ymd_opt(2019, 10, 28)
                .unwrap()
                .and_hms_opt(4, 0, 4)
                .unwrap(),
            dtm
        );

        // day 99 does not exist
        assert!(dtm_from(&[0x00, 0x00, 0x00, 0x63, 0x0D, 0x07, 0xE3]).is_err());
    }

    #[test]
    fn test_temperature_array() {
        // a controller self-broadcast parses as an array
        let msg = msg_from_line(
            "045  I --- 01:145038 --:------ 01:145038 30C9 009 0007E8010800020834",
        );
        assert_eq!(MsgIndex::None, msg.index);
        assert_eq!(
            Payload::TemperatureArray(vec![
                TempRec {
                    zone_idx: 0,
                    temperature: Some(Temp::Celsius(20.24)),
                },
                TempRec {
                    zone_idx: 1,
                    temperature: Some(Temp::Celsius(20.48)),
                },
                TempRec {
                    zone_idx: 2,
                    temperature: Some(Temp::Celsius(21.0)),
                },
            ]),
            msg.payload
        );
    }

    #[test]
    fn test_temperature_single() {
        // a directed report parses as a single record
        let msg = msg_from_line("045  I --- 04:056057 --:------ 04:056057 30C9 003 000838");
        assert_eq!(
            Payload::Temperature(TempRec {
                zone_idx: 0,
                temperature: Some(Temp::Celsius(21.04)),
            }),
            msg.payload
        );
    }

    #[test]
    fn test_zone_idx_bound() {
        // zone_idx 13 with MAX_ZONES=12 is a parse error
        let pkt = pkt_from_line("045  I --- 01:145038 --:------ 01:145038 30C9 003 0DFFFF");
        let array = is_array(&pkt);
        assert!(parse(&pkt, array, 12).is_err());

        // but is accepted with MAX_ZONES=16
        assert!(parse(&pkt, array, 16).is_ok());
    }

    #[test]
    fn test_is_array() {
        let pkt =
            pkt_from_line("045  I --- 01:145038 --:------ 01:145038 2309 009 0007D0010834020834");
        assert_eq!(true, is_array(&pkt));

        // directed: not an array
        let pkt = pkt_from_line("045 RP --- 01:145038 18:013393 --:------ 2309 003 0007D0");
        assert_eq!(false, is_array(&pkt));

        // failsafe flags are an array only in the F domain
        let pkt = pkt_from_line("045  I --- 01:145038 --:------ 01:145038 0009 006 FC00FFF900FF");
        assert_eq!(true, is_array(&pkt));
        let pkt = pkt_from_line("045  I --- 01:145038 --:------ 01:145038 0009 003 0B00FF");
        assert_eq!(false, is_array(&pkt));

        // 000C and 1FC9 are always arrays on I/RP
        let pkt = pkt_from_line("045 RP --- 01:145038 18:013393 --:------ 000C 006 00000010DAFD");
        assert_eq!(true, is_array(&pkt));
    }

    #[test]
    fn test_setpoint_array_and_config() {
        let msg = msg_from_line(
            "045  I --- 01:145038 --:------ 01:145038 2309 009 0007D0010834020834",
        );
        match msg.payload {
            Payload::SetpointArray(recs) => {
                assert_eq!(3, recs.len());
                assert_eq!(Some(Temp::Celsius(20.0)), recs[0].setpoint);
            }
            payload => panic!("expected an array, got {payload:?}"),
        }

        let msg = msg_from_line(
            "045 RP --- 01:158182 34:044203 --:------ 000A 006 081001F409C4",
        );
        assert_eq!(MsgIndex::Zone(8), msg.index);
        assert_eq!(
            Payload::ZoneConfig(ZoneConfigRec {
                zone_idx: 8,
                min_temp: Some(Temp::Celsius(5.0)),
                max_temp: Some(Temp::Celsius(25.0)),
                local_override: true,
                openwindow_function: true,
                multiroom_mode: false,
            }),
            msg.payload
        );
    }

    #[test]
    fn test_zone_devices() {
        let msg = msg_from_line(
            "045 RP --- 01:145038 18:013393 --:------ 000C 012 01000010DAF501000010DAFB",
        );
        assert_eq!(MsgIndex::Zone(1), msg.index);
        assert_eq!(
            Payload::ZoneDevices {
                device_class: DeviceClass::ZoneActuators,
                devices: vec![
                    "04:056053".parse().unwrap(),
                    "04:056059".parse().unwrap(),
                ],
            },
            msg.payload
        );

        // the DHW valve class promotes to the heating valve on index 01
        let msg = msg_from_line("045 RP --- 01:145038 18:013393 --:------ 000C 006 010E00367F95");
        assert_eq!(MsgIndex::Domain(0xFA), msg.index);
        match msg.payload {
            Payload::ZoneDevices { device_class, .. } => {
                assert_eq!(DeviceClass::HeatingValve, device_class);
            }
            payload => panic!("unexpected payload: {payload:?}"),
        }

        // an absent sensor is an empty device list
        let msg = msg_from_line("045 RP --- 01:145038 18:013393 --:------ 000C 006 00047F7FFFFF");
        match msg.payload {
            Payload::ZoneDevices {
                device_class,
                devices,
            } => {
                assert_eq!(DeviceClass::ZoneSensor, device_class);
                assert_eq!(0, devices.len());
            }
            payload => panic!("unexpected payload: {payload:?}"),
        }
    }

    #[test]
    fn test_system_zones() {
        let msg = msg_from_line("045  I --- 01:145038 --:------ 01:145038 0005 004 00080300");
        match msg.payload {
            Payload::SystemZones(recs) => {
                assert_eq!(1, recs.len());
                assert_eq!(0x08, recs[0].zone_type);
                assert_eq!(12, recs[0].zone_mask.len());
                assert_eq!(
                    vec![true, true],
                    recs[0].zone_mask[0..2].to_vec()
                );
                assert!(recs[0].zone_mask[2..].iter().all(|bit| !bit));
            }
            payload => panic!("unexpected payload: {payload:?}"),
        }
    }

    #[test]
    fn test_schedule_fragment() {
        let msg = msg_from_line(
            "069 RQ --- 18:013393 01:145038 --:------ 0404 007 01200008000100",
        );
        assert_eq!(MsgIndex::Zone(1), msg.index);
        assert_eq!(
            Payload::ScheduleFragment {
                frag_index: 1,
                frag_total: 0,
                frag_length: 0,
                fragment: Vec::new(),
            },
            msg.payload
        );
    }

    #[test]
    fn test_fault_log() {
        let msg = msg_from_line(
            "045 RP --- 01:145038 18:013393 --:------ 0418 022 \
             000000B00401010000008694A3CC7FFFFF70000ECC8A",
        );
        match msg.payload {
            Payload::FaultLogEntry(rec) => {
                assert_eq!(0, rec.log_idx);
                assert_eq!(FaultState::Fault, rec.fault_state);
                assert_eq!(FaultType::BatteryLow, rec.fault_type);
                assert_eq!(FaultDeviceClass::Sensor, rec.device_class);
                assert_eq!(MsgIndex::Zone(1), rec.index);
                assert_eq!(Some("03:183434".parse().unwrap()), rec.device_id);
            }
            payload => panic!("unexpected payload: {payload:?}"),
        }

        // the C0 state is carried opaquely
        let msg = msg_from_line(
            "045 RP --- 01:145038 18:013393 --:------ 0418 022 \
             00C001B004010100000086949BCB7FFFFF70000ECC8A",
        );
        match msg.payload {
            Payload::FaultLogEntry(rec) => {
                assert_eq!(FaultState::UnknownC0, rec.fault_state);
            }
            payload => panic!("unexpected payload: {payload:?}"),
        }

        // the null record is the exhaustion sentinel
        let msg = msg_from_line(
            "045 RP --- 01:145038 18:013393 --:------ 0418 022 \
             000000B0000000000000000000007FFFFF7000000000",
        );
        assert_eq!(Payload::FaultLogNull, msg.payload);
    }

    #[test]
    fn test_zone_mode() {
        let msg = msg_from_line(
            "045  W --- 18:000730 01:145038 --:------ 2349 013 0107A604FFFFFF0012180C07E8",
        );
        assert_eq!(MsgIndex::Zone(1), msg.index);
        assert_eq!(
            Payload::ZoneMode {
                mode: ZoneMode::Temporary,
                setpoint: Some(Temp::Celsius(19.5)),
                until: NaiveDate::from_ymd_opt(2024, 12, 24)
                    .unwrap()
                    .and_hms_opt(18, 0, 0),
            },
            msg.payload
        );
    }

    #[test]
    fn test_system_sync_and_mode() {
        let msg = msg_from_line("045  I --- 01:145038 --:------ 01:145038 1F09 003 FF073F");
        assert_eq!(MsgIndex::None, msg.index);
        assert_eq!(
            Payload::SystemSync {
                remaining_seconds: 185.5,
            },
            msg.payload
        );

        let msg = msg_from_line(
            "045 RP --- 01:145038 18:013393 --:------ 2E04 008 03FFFFFFFFFFFF00",
        );
        assert_eq!(
            Payload::SystemMode {
                system_mode: SystemMode::Away,
                until: None,
            },
            msg.payload
        );
    }

    #[test]
    fn test_opentherm() {
        // RP: Read-Ack of id 0x19 (boiler water temperature), f8.8
        let msg = msg_from_line("049 RP --- 10:067219 01:078710 --:------ 3220 005 00401929E6");
        match msg.payload {
            Payload::OpenTherm {
                id,
                name,
                msg_type,
                value,
            } => {
                assert_eq!(0x19, id);
                assert_eq!("Boiler water temperature", name);
                assert_eq!(OtMsgType::ReadAck, msg_type);
                assert_eq!(
                    Some(OtDecoded::Whole(crate::opentherm::OtValue::F8_8(
                        f64::from(0x29E6) / 256.0
                    ))),
                    value
                );
            }
            payload => panic!("unexpected payload: {payload:?}"),
        }

        // a flipped bit fails the parity check
        let pkt = pkt_from_line("049 RP --- 10:067219 01:078710 --:------ 3220 005 00401929E7");
        assert!(parse(&pkt, false, 12).is_err());

        // an RQ must carry zero data bytes
        let pkt = pkt_from_line("066 RQ --- 01:078710 10:067219 --:------ 3220 005 008019FF00");
        assert!(parse(&pkt, false, 12).is_err());
    }

    #[test]
    fn test_heat_demand() {
        let msg = msg_from_line("045  I --- 01:145038 --:------ 01:145038 3150 002 FC5C");
        assert_eq!(
            Payload::HeatDemand(HeatDemandRec {
                index: MsgIndex::Domain(0xFC),
                heat_demand: Some(0.46),
            }),
            msg.payload
        );

        // a UFH controller's self-broadcast is an array of circuits
        let msg = msg_from_line(
            "055  I --- 02:001107 --:------ 02:001107 3150 006 0060015A025C",
        );
        match msg.payload {
            Payload::HeatDemandArray(recs) => {
                assert_eq!(3, recs.len());
                assert_eq!(
                    MsgIndex::UfhCircuit {
                        idx: 1,
                        zone_idx: None,
                    },
                    recs[1].index
                );
            }
            payload => panic!("unexpected payload: {payload:?}"),
        }
    }

    #[test]
    fn test_actuator_state() {
        let msg = msg_from_line("066 RP --- 10:067219 01:078710 --:------ 3EF0 006 003C100A00FF");
        assert_eq!(
            Payload::ActuatorState {
                actuator_enabled: true,
                modulation_level: Some(0.3),
                flame_active: Some(true),
                flame_state: Some(0x0A),
            },
            msg.payload
        );

        let msg = msg_from_line("054  I --- 13:209679 --:------ 13:209679 3EF0 003 00C8FF");
        assert_eq!(
            Payload::ActuatorState {
                actuator_enabled: true,
                modulation_level: Some(1.0),
                flame_active: None,
                flame_state: None,
            },
            msg.payload
        );
    }

    #[test]
    fn test_rf_bind() {
        let msg = msg_from_line(
            "049  I --- 01:145038 --:------ 01:145038 1FC9 018 \
             07000806368EFC3B0006368E071FC906368E",
        );
        match msg.payload {
            Payload::RfBind(recs) => {
                assert_eq!(
                    vec![
                        BindRec {
                            index: 0x07,
                            code: 0x0008,
                        },
                        BindRec {
                            index: 0xFC,
                            code: 0x3B00,
                        },
                        BindRec {
                            index: 0x07,
                            code: 0x1FC9,
                        },
                    ],
                    recs
                );
            }
            payload => panic!("unexpected payload: {payload:?}"),
        }
    }

    #[test]
    fn test_unknown_code() {
        let pkt = pkt_from_line("045  I --- 01:145038 --:------ 01:145038 7FFF 002 0000");
        match parse(&pkt, false, 12) {
            Err(Error::UnknownCode(0x7FFF)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unexpected_verb_is_recoverable() {
        // a W on a code that never carries one is a parse error, not a panic
        let pkt = pkt_from_line("045  W --- 18:000730 01:145038 --:------ 3EF1 002 0000");
        assert!(matches!(
            parse(&pkt, false, 12),
            Err(Error::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_battery_and_window() {
        let msg = msg_from_line("054  I --- 04:056057 --:------ 04:056057 1060 003 002800");
        assert_eq!(
            Payload::BatteryState {
                low_battery: true,
                battery_level: Some(0.2),
            },
            msg.payload
        );

        let msg = msg_from_line("045  I --- 04:189076 --:------ 01:145038 12B0 003 02C800");
        assert_eq!(MsgIndex::Parent(2), msg.index);
        assert_eq!(
            Payload::WindowState {
                window_open: Some(true),
            },
            msg.payload
        );
    }

    #[test]
    fn test_tpi_and_dhw_params() {
        let msg = msg_from_line(
            "047  I --- 13:079800 --:------ 13:079800 1100 008 00170498007FFF01",
        );
        assert_eq!(
            Payload::TpiParams {
                cycle_rate: 5.75,
                minimum_on_time: 1.0,
                minimum_off_time: 38.0,
                proportional_band_width: None,
            },
            msg.payload
        );

        let msg = msg_from_line(
            "045 RQ --- 07:045960 01:145038 --:------ 10A0 006 0013740003E4",
        );
        assert_eq!(
            Payload::DhwParams {
                setpoint: Some(Temp::Celsius(49.8)),
                overrun: Some(0),
                differential: Some(Temp::Celsius(10.0)),
            },
            msg.payload
        );
    }
}
