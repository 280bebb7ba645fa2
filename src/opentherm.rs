//! The OpenTherm sublayer carried over RAMSES-II in packet code `3220`.
//!
//! An encapsulated frame is five bytes: one reserved byte, a parity+type
//! byte, a message-id byte and two data bytes. The message id selects an
//! entry of a static table giving the message name, its direction and the
//! codec of its data bytes.

use std::fmt;

/// XOR-fold parity of a word (1 if an odd number of bits are set).
///
/// # Examples
///
/// ```rust
/// use ramses_rf::opentherm::parity;
///
/// assert_eq!(0, parity(0x0000_0005));
/// assert_eq!(1, parity(0x0019_0000));
/// ```
pub fn parity(x: u32) -> u8 {
    (x.count_ones() & 1) as u8
}

/// The OpenTherm message type (bits 4-6 of the type byte).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OtMsgType {
    /// `0b000` - master read request.
    ReadData,
    /// `0b001` - master write request.
    WriteData,
    /// `0b010` - master frame with invalid data.
    InvalidData,
    /// `0b011` - reserved.
    Reserved,
    /// `0b100` - slave read acknowledgement.
    ReadAck,
    /// `0b101` - slave write acknowledgement.
    WriteAck,
    /// `0b110` - slave rejects the data value.
    DataInvalid,
    /// `0b111` - slave does not recognise the data id.
    UnknownDataId,
}

impl OtMsgType {
    /// Decodes bits 4-6 of the type byte.
    pub fn from_type_byte(byte: u8) -> OtMsgType {
        match (byte >> 4) & 0x07 {
            0b000 => OtMsgType::ReadData,
            0b001 => OtMsgType::WriteData,
            0b010 => OtMsgType::InvalidData,
            0b011 => OtMsgType::Reserved,
            0b100 => OtMsgType::ReadAck,
            0b101 => OtMsgType::WriteAck,
            0b110 => OtMsgType::DataInvalid,
            _ => OtMsgType::UnknownDataId,
        }
    }

    /// Returns `true` for the master-to-slave (request) types.
    pub fn is_request(self) -> bool {
        matches!(
            self,
            OtMsgType::ReadData | OtMsgType::WriteData | OtMsgType::InvalidData
        )
    }
}

impl fmt::Display for OtMsgType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            OtMsgType::ReadData => "Read-Data",
            OtMsgType::WriteData => "Write-Data",
            OtMsgType::InvalidData => "Invalid-Data",
            OtMsgType::Reserved => "-reserved-",
            OtMsgType::ReadAck => "Read-Ack",
            OtMsgType::WriteAck => "Write-Ack",
            OtMsgType::DataInvalid => "Data-Invalid",
            OtMsgType::UnknownDataId => "Unknown-DataId",
        };
        write!(f, "{name}")
    }
}

/// The direction of an OpenTherm message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OtDir {
    /// `R-` - read by the master.
    Read,
    /// `-W` - written by the master.
    Write,
    /// `RW` - both.
    ReadWrite,
}

/// A scalar codec for one or both data bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OtScalar {
    /// Eight named bits.
    Flag8,
    /// Unsigned byte.
    U8,
    /// Signed byte.
    S8,
    /// Signed 16-bit fixed point, scale 1/256.
    F8_8,
    /// Unsigned 16-bit.
    U16,
    /// Signed 16-bit.
    S16,
}

/// The value codec of an OpenTherm message's two data bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OtCodec {
    /// Both bytes decode to a single value.
    Whole(OtScalar),
    /// High and low byte decode separately.
    Split(OtScalar, OtScalar),
    /// No defined codec (the data bytes are kept raw).
    Raw,
}

/// A decoded scalar value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OtValue {
    /// Eight bits, LSB first.
    Flags([bool; 8]),
    /// Unsigned byte.
    U8(u8),
    /// Signed byte.
    S8(i8),
    /// Fixed point.
    F8_8(f64),
    /// Unsigned 16-bit.
    U16(u16),
    /// Signed 16-bit.
    S16(i16),
}

/// The decoded data bytes of an OpenTherm message.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OtDecoded {
    /// A single value spanning the data bytes.
    Whole(OtValue),
    /// Separately decoded high and low bytes.
    Split {
        /// The decoded high byte.
        hb: OtValue,
        /// The decoded low byte.
        lb: OtValue,
    },
    /// The raw data bytes (no codec defined).
    Raw([u8; 2]),
}

fn decode_byte(scalar: OtScalar, byte: u8) -> OtValue {
    match scalar {
        OtScalar::Flag8 => {
            let mut flags = [false; 8];
            for (bit, flag) in flags.iter_mut().enumerate() {
                *flag = byte & (1 << bit) != 0;
            }
            OtValue::Flags(flags)
        }
        OtScalar::U8 => OtValue::U8(byte),
        _ => OtValue::S8(byte as i8),
    }
}

/// Decodes the two data bytes of a message with the given codec.
pub fn decode_value(codec: OtCodec, data: [u8; 2]) -> OtDecoded {
    let word = i16::from(data[0] as i8) << 8 | i16::from(data[1]);
    match codec {
        OtCodec::Whole(OtScalar::F8_8) => OtDecoded::Whole(OtValue::F8_8(f64::from(word) / 256.0)),
        OtCodec::Whole(OtScalar::U16) => {
            OtDecoded::Whole(OtValue::U16(u16::from(data[0]) << 8 | u16::from(data[1])))
        }
        OtCodec::Whole(OtScalar::S16) => OtDecoded::Whole(OtValue::S16(word)),
        OtCodec::Whole(scalar) => OtDecoded::Whole(decode_byte(scalar, data[0])),
        OtCodec::Split(hb, lb) => OtDecoded::Split {
            hb: decode_byte(hb, data[0]),
            lb: decode_byte(lb, data[1]),
        },
        OtCodec::Raw => OtDecoded::Raw(data),
    }
}

/// One entry of the message-id table.
#[derive(Debug)]
pub struct OtMessage {
    /// The message (data) id, 0..127 with gaps.
    pub id: u8,
    /// The message name.
    pub name: &'static str,
    /// The direction.
    pub dir: OtDir,
    /// The data byte codec.
    pub codec: OtCodec,
    /// The variable name, if the value is a single quantity.
    pub var: Option<&'static str>,
    /// The variable names of a split value's high/low bytes.
    pub var_hb_lb: (Option<&'static str>, Option<&'static str>),
    /// The flag-set name, for `flag8` values (see [`flag_names`]).
    pub flags: Option<&'static str>,
}

macro_rules! ot {
    ($id:expr, $name:expr, $dir:ident, $codec:expr) => {
        ot!($id, $name, $dir, $codec, None, (None, None), None)
    };
    ($id:expr, $name:expr, $dir:ident, $codec:expr, $var:expr) => {
        ot!($id, $name, $dir, $codec, Some($var), (None, None), None)
    };
    ($id:expr, $name:expr, $dir:ident, $codec:expr, $var:expr, $hb_lb:expr, $flags:expr) => {
        OtMessage {
            id: $id,
            name: $name,
            dir: OtDir::$dir,
            codec: $codec,
            var: $var,
            var_hb_lb: $hb_lb,
            flags: $flags,
        }
    };
}

use OtCodec::{Raw, Split, Whole};
use OtScalar::{Flag8, F8_8, S16, S8, U16, U8};

/// The static message-id table (data ids 0..127, with gaps).
pub static OT_MESSAGES: &[OtMessage] = &[
    ot!(0, "Status", Read, Whole(Flag8), None, (None, None), Some("StatusFlags")),
    ot!(1, "Control setpoint", Write, Whole(F8_8), "ControlSetpoint"),
    ot!(2, "Master configuration", Write, Split(Flag8, U8), None,
        (None, Some("MasterMemberId")), Some("MasterConfigFlags")),
    ot!(3, "Slave configuration", Read, Split(Flag8, U8), None,
        (None, Some("SlaveMemberId")), Some("SlaveConfigFlags")),
    ot!(4, "Remote command", Write, Whole(U8), "RemoteCommand"),
    ot!(5, "Fault flags & OEM fault code", Read, Split(Flag8, U8), None,
        (None, Some("OEMFaultCode")), Some("FaultFlags")),
    ot!(6, "Remote parameter flags", Read, Whole(Flag8), None, (None, None), Some("RemoteFlags")),
    ot!(7, "Cooling control signal", Write, Whole(F8_8), "CoolingControlSignal"),
    ot!(8, "Control setpoint central heating 2", Write, Whole(F8_8), "CH2ControlSetpoint"),
    ot!(9, "Remote override room setpoint", Read, Whole(F8_8), "RemoteOverrideRoomSetpoint"),
    ot!(10, "Number of transparent slave parameters (TSP) supported by slave", Read,
        Split(U8, U8), None, (Some("TSPNumber"), None), None),
    ot!(11, "Index number/value of referred-to transparent slave parameter (TSP)", ReadWrite,
        Split(U8, U8), None, (Some("TSPIndex"), Some("TSPValue")), None),
    ot!(12, "Size of fault history buffer (FHB) supported by slave", Read,
        Split(U8, U8), None, (Some("FHBSize"), None), None),
    ot!(13, "Index number/value of referred-to fault history buffer (FHB) entry", Read,
        Split(U8, U8), None, (Some("FHBIndex"), Some("FHBValue")), None),
    ot!(14, "Max. relative modulation level", Write, Whole(F8_8), "MaxRelativeModulationLevel"),
    ot!(15, "Max. boiler capacity (kW) and modulation level setting (%)", Read,
        Split(U8, U8), None, (Some("MaxBoilerCapacity"), Some("MinModulationLevel")), None),
    ot!(16, "Room setpoint", Write, Whole(F8_8), "CurrentSetpoint"),
    ot!(17, "Relative modulation level", Read, Whole(F8_8), "RelativeModulationLevel"),
    ot!(18, "Central heating water pressure", Read, Whole(F8_8), "CHWaterPressure"),
    ot!(19, "DHW flow rate (litres/minute)", Read, Whole(F8_8), "DHWFlowRate"),
    ot!(20, "Day of week & time of day", ReadWrite, Raw, "DayTime"),
    ot!(21, "Date", ReadWrite, Whole(U8), "Date"),
    ot!(22, "Year", ReadWrite, Whole(U16), "Year"),
    ot!(23, "Room setpoint central heating 2", Write, Whole(F8_8), "CH2CurrentSetpoint"),
    ot!(24, "Room temperature", Write, Whole(F8_8), "CurrentTemperature"),
    ot!(25, "Boiler water temperature", Read, Whole(F8_8), "BoilerWaterTemperature"),
    ot!(26, "DHW temperature", Read, Whole(F8_8), "DHWTemperature"),
    ot!(27, "Outside temperature", Read, Whole(F8_8), "OutsideTemperature"),
    ot!(28, "Return water temperature", Read, Whole(F8_8), "ReturnWaterTemperature"),
    ot!(29, "Solar storage temperature", Read, Whole(F8_8), "SolarStorageTemperature"),
    ot!(30, "Solar collector temperature", Read, Whole(F8_8), "SolarCollectorTemperature"),
    ot!(31, "Flow temperature central heating 2", Read, Whole(F8_8), "CH2FlowTemperature"),
    ot!(32, "DHW 2 temperature", Read, Whole(F8_8), "DHW2Temperature"),
    ot!(33, "Boiler exhaust temperature", Read, Whole(S16), "BoilerExhaustTemperature"),
    ot!(48, "DHW setpoint boundaries", Read, Whole(S8), "DHWBoundaries"),
    ot!(49, "Max. central heating setpoint boundaries", Read, Whole(S8), "CHBoundaries"),
    ot!(50, "OTC heat curve ratio upper & lower bounds", Read, Whole(S8), "OTCBoundaries"),
    ot!(56, "DHW setpoint", ReadWrite, Whole(F8_8), "DHWSetpoint"),
    ot!(57, "Max. central heating water setpoint", ReadWrite, Whole(F8_8), "MaxCHWaterSetpoint"),
    ot!(58, "OTC heat curve ratio", ReadWrite, Whole(F8_8), "OTCHeatCurveRatio"),
    // OpenTherm 2.3 ids (70-91) for ventilation/heat-recovery applications
    ot!(70, "Status ventilation/heat-recovery", Read, Whole(Flag8), "VHStatus"),
    ot!(71, "Control setpoint ventilation/heat-recovery", Write, Split(U8, U8), None,
        (Some("VHControlSetpoint"), None), None),
    ot!(72, "Fault flags/code ventilation/heat-recovery", Read, Split(Flag8, U8), None,
        (None, Some("VHFaultCode")), None),
    ot!(73, "Diagnostic code ventilation/heat-recovery", Read, Whole(U16), "VHDiagnosticCode"),
    ot!(74, "Config/memberID ventilation/heat-recovery", Read, Split(Flag8, U8), None,
        (None, Some("VHMemberId")), None),
    ot!(75, "OpenTherm version ventilation/heat-recovery", Read, Whole(F8_8), "VHOpenThermVersion"),
    ot!(76, "Version & type ventilation/heat-recovery", Read, Split(U8, U8), None,
        (Some("VHProductType"), Some("VHProductVersion")), None),
    ot!(77, "Relative ventilation", Read, Split(U8, U8), None,
        (Some("RelativeVentilation"), None), None),
    ot!(78, "Relative humidity", ReadWrite, Split(U8, U8), None,
        (Some("RelativeHumidity"), None), None),
    ot!(79, "CO2 level", ReadWrite, Whole(U16), "CO2Level"),
    ot!(80, "Supply inlet temperature", Read, Whole(F8_8), "SupplyInletTemperature"),
    ot!(81, "Supply outlet temperature", Read, Whole(F8_8), "SupplyOutletTemperature"),
    ot!(82, "Exhaust inlet temperature", Read, Whole(F8_8), "ExhaustInletTemperature"),
    ot!(83, "Exhaust outlet temperature", Read, Whole(F8_8), "ExhaustOutletTemperature"),
    ot!(84, "Actual exhaust fan speed", Read, Whole(U16), "ExhaustFanSpeed"),
    ot!(85, "Actual inlet fan speed", Read, Whole(U16), "InletFanSpeed"),
    ot!(86, "Remote parameter settings ventilation/heat-recovery", Read, Whole(Flag8),
        "VHRemoteParameter"),
    ot!(87, "Nominal ventilation value", ReadWrite, Whole(U8), "NominalVentilation"),
    ot!(88, "TSP number ventilation/heat-recovery", Read, Split(U8, U8), None,
        (Some("VHTSPSize"), None), None),
    ot!(89, "TSP entry ventilation/heat-recovery", ReadWrite, Split(U8, U8), None,
        (Some("VHTSPIndex"), Some("VHTSPValue")), None),
    ot!(90, "Fault buffer size ventilation/heat-recovery", Read, Split(U8, U8), None,
        (Some("VHFHBSize"), None), None),
    ot!(91, "Fault buffer entry ventilation/heat-recovery", Read, Split(U8, U8), None,
        (Some("VHFHBIndex"), Some("VHFHBValue")), None),
    // OpenTherm 2.2 ids
    ot!(100, "Remote override function", Read, Split(Flag8, U8), None,
        (Some("RemoteOverrideFunction"), None), None),
    ot!(113, "Number of un-successful burner starts", ReadWrite, Whole(U16), "BadStartsBurner"),
    ot!(114, "Number of times flame signal was too low", ReadWrite, Whole(U16), "LowSignalsFlame"),
    ot!(115, "OEM diagnostic code", Read, Whole(U16), "OEMDiagnosticCode"),
    ot!(116, "Number of starts burner", ReadWrite, Whole(U16), "StartsBurner"),
    ot!(117, "Number of starts central heating pump", ReadWrite, Whole(U16), "StartsCHPump"),
    ot!(118, "Number of starts DHW pump/valve", ReadWrite, Whole(U16), "StartsDHWPump"),
    ot!(119, "Number of starts burner during DHW mode", ReadWrite, Whole(U16), "StartsBurnerDHW"),
    ot!(120, "Number of hours burner is in operation (i.e. flame on)", ReadWrite, Whole(U16),
        "HoursBurner"),
    ot!(121, "Number of hours central heating pump has been running", ReadWrite, Whole(U16),
        "HoursCHPump"),
    ot!(122, "Number of hours DHW pump has been running/valve has been opened", ReadWrite,
        Whole(U16), "HoursDHWPump"),
    ot!(123, "Number of hours DHW burner is in operation during DHW mode", ReadWrite, Whole(U16),
        "HoursDHWBurner"),
    ot!(124, "Opentherm version Master", Write, Whole(F8_8), "MasterOpenThermVersion"),
    ot!(125, "Opentherm version Slave", Read, Whole(F8_8), "SlaveOpenThermVersion"),
    ot!(126, "Master product version and type", Write, Split(U8, U8), None,
        (Some("MasterProductType"), Some("MasterProductVersion")), None),
    ot!(127, "Slave product version and type", Read, Split(U8, U8), None,
        (Some("SlaveProductType"), Some("SlaveProductVersion")), None),
];

/// Looks up a message id in the static table.
pub fn message(id: u8) -> Option<&'static OtMessage> {
    OT_MESSAGES.iter().find(|msg| msg.id == id)
}

/// The named bits of each flag set, as `(mask, name)` over the 16-bit data
/// word (high byte first).
pub fn flag_names(flag_set: &str) -> &'static [(u16, &'static str)] {
    match flag_set {
        "StatusFlags" => &[
            (0x0100, "Central heating enable"),
            (0x0200, "DHW enable"),
            (0x0400, "Cooling enable"),
            (0x0800, "Outside temp. comp. active"),
            (0x1000, "Central heating 2 enable"),
            (0x2000, "Summer/winter mode"),
            (0x4000, "DHW blocking"),
            (0x0001, "Fault indication"),
            (0x0002, "Central heating mode"),
            (0x0004, "DHW mode"),
            (0x0008, "Flame status"),
            (0x0010, "Cooling status"),
            (0x0020, "Central heating 2 mode"),
            (0x0040, "Diagnostic indication"),
        ],
        "MasterConfigFlags" => &[(0x0100, "Smart Power")],
        "SlaveConfigFlags" => &[
            (0x0100, "DHW present"),
            (0x0200, "Control type (modulating on/off)"),
            (0x0400, "Cooling supported"),
            (0x0800, "DHW storage tank"),
            (0x1000, "Master low-off & pump control allowed"),
            (0x2000, "Central heating 2 present"),
        ],
        "FaultFlags" => &[
            (0x0100, "Service request"),
            (0x0200, "Lockout-reset"),
            (0x0400, "Low water pressure"),
            (0x0800, "Gas/flame fault"),
            (0x1000, "Air pressure fault"),
            (0x2000, "Water over-temperature"),
        ],
        "RemoteFlags" => &[
            (0x0100, "DHW setpoint enable"),
            (0x0200, "Max. CH setpoint enable"),
            (0x0001, "DHW setpoint read/write"),
            (0x0002, "Max. CH setpoint read/write"),
        ],
        _ => &[],
    }
}

/// Returns the names of the set bits of a flag-carrying data word.
pub fn decode_flags(flag_set: &str, data: [u8; 2]) -> Vec<&'static str> {
    let word = u16::from(data[0]) << 8 | u16::from(data[1]);
    flag_names(flag_set)
        .iter()
        .filter(|(mask, _)| word & mask != 0)
        .map(|(_, name)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity() {
        assert_eq!(0, parity(0x0000_0000));
        assert_eq!(1, parity(0x0000_0001));
        assert_eq!(0, parity(0x0000_0003));
        assert_eq!(1, parity(0x7FFF_FFFF));

        // 00C0110000: type byte 0xC0 has parity bit set over the other 31 bits
        let frame = u32::from_be_bytes([0xC0, 0x11, 0x00, 0x00]);
        assert_eq!(1, parity(frame & 0x7FFF_FFFF));
    }

    #[test]
    fn test_msg_type() {
        assert_eq!(OtMsgType::ReadData, OtMsgType::from_type_byte(0x00));
        assert_eq!(OtMsgType::ReadData, OtMsgType::from_type_byte(0x80));
        assert_eq!(OtMsgType::ReadAck, OtMsgType::from_type_byte(0x40));
        assert_eq!(OtMsgType::WriteAck, OtMsgType::from_type_byte(0xD0));
        assert_eq!(OtMsgType::UnknownDataId, OtMsgType::from_type_byte(0x70));

        assert_eq!(true, OtMsgType::WriteData.is_request());
        assert_eq!(false, OtMsgType::ReadAck.is_request());
        assert_eq!("Read-Ack", OtMsgType::ReadAck.to_string());
    }

    #[test]
    fn test_message_lookup() {
        let msg = message(0x19).unwrap();
        assert_eq!("Boiler water temperature", msg.name);
        assert_eq!(OtDir::Read, msg.dir);
        assert_eq!(OtCodec::Whole(OtScalar::F8_8), msg.codec);

        assert_eq!("Status", message(0).unwrap().name);
        assert_eq!(Some("StatusFlags"), message(0).unwrap().flags);
        assert!(message(34).is_none());
        assert!(message(99).is_none());
        assert!(message(127).is_some());
    }

    #[test]
    fn test_decode_value() {
        // f8.8: 0x29E6 / 256 = 41.8984375
        let decoded = decode_value(OtCodec::Whole(OtScalar::F8_8), [0x29, 0xE6]);
        assert_eq!(OtDecoded::Whole(OtValue::F8_8(10726.0 / 256.0)), decoded);

        // negative f8.8
        let decoded = decode_value(OtCodec::Whole(OtScalar::F8_8), [0xFF, 0x80]);
        assert_eq!(OtDecoded::Whole(OtValue::F8_8(-0.5)), decoded);

        let decoded = decode_value(OtCodec::Whole(OtScalar::U16), [0x01, 0x66]);
        assert_eq!(OtDecoded::Whole(OtValue::U16(0x0166)), decoded);

        let decoded = decode_value(OtCodec::Split(OtScalar::U8, OtScalar::U8), [0x01, 0x66]);
        assert_eq!(
            OtDecoded::Split {
                hb: OtValue::U8(1),
                lb: OtValue::U8(0x66),
            },
            decoded
        );

        let decoded = decode_value(OtCodec::Whole(OtScalar::Flag8), [0x0A, 0x00]);
        assert_eq!(
            OtDecoded::Whole(OtValue::Flags([false, true, false, true, false, false, false, false])),
            decoded
        );

        assert_eq!(OtDecoded::Raw([0x12, 0x34]), decode_value(OtCodec::Raw, [0x12, 0x34]));
    }

    #[test]
    fn test_decode_flags() {
        // CH enable + flame status
        let names = decode_flags("StatusFlags", [0x01, 0x08]);
        assert_eq!(vec!["Central heating enable", "Flame status"], names);

        assert!(decode_flags("NoSuchFlags", [0xFF, 0xFF]).is_empty());
    }

    #[test]
    fn test_table_ids_are_unique() {
        for (at, msg) in OT_MESSAGES.iter().enumerate() {
            assert!(
                OT_MESSAGES[at + 1..].iter().all(|other| other.id != msg.id),
                "duplicate id {}",
                msg.id
            );
        }
    }
}
