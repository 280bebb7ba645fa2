use std::fmt;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::{
    address::Address,
    header::Header,
    message::Message,
    opentherm,
    packet::{hex_from_payload, Verb},
    parsers::{DhwState, SystemMode, ZoneMode},
};

/// The default number of re-transmissions of an unanswered command.
pub const QOS_RETRIES: u8 = 2;

/// How long to wait for the gateway to echo a written command.
pub const QOS_TIMEOUT_ECHO: Duration = Duration::from_millis(50);

/// The base wait for the peer's reply (doubled on each re-transmission).
pub const QOS_TIMEOUT_REPLY: Duration = Duration::from_millis(150);

/// The default expiry of a command callback.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(1);

/// The priority band of an outbound command.
///
/// Commands of the same priority are sent in submission order; different
/// priorities are strict-priority. A higher-priority submission does not
/// preempt the command already in flight.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Priority {
    /// Jump the queue (e.g. binding handshakes).
    Asap = 0,
    /// Ahead of routine traffic.
    High = 2,
    /// The default band.
    Default = 4,
    /// Background polling.
    Low = 6,
}

/// The QoS envelope of an outbound command.
#[derive(Clone, Copy, Debug)]
pub struct Qos {
    /// The priority band.
    pub priority: Priority,

    /// How many times to re-transmit before expiring (total attempts are
    /// `retries + 1`).
    pub retries: u8,

    /// The per-attempt echo timeout.
    pub timeout: Duration,
}

impl Qos {
    /// The default envelope for a given command code.
    pub fn for_code(code: u16) -> Qos {
        let priority = match code {
            0x0016 | 0x1FC9 => Priority::High,
            _ => Priority::Default,
        };
        Qos {
            priority,
            ..Qos::default()
        }
    }

    /// Returns a copy with the given priority.
    pub fn with_priority(self, priority: Priority) -> Qos {
        Qos { priority, ..self }
    }

    /// Returns a copy with the given retry limit.
    pub fn with_retries(self, retries: u8) -> Qos {
        Qos { retries, ..self }
    }
}

impl Default for Qos {
    fn default() -> Qos {
        Qos {
            priority: Priority::Default,
            retries: QOS_RETRIES,
            timeout: QOS_TIMEOUT_ECHO,
        }
    }
}

/// A callback to be fired with the reply to a command.
///
/// Non-daemon callbacks are invoked once with the matching message and then
/// deregistered; on expiry without a match they are invoked once with `None`.
/// Daemon callbacks survive their expiry and keep matching (used for
/// unsolicited reply streams such as fault-log paging).
pub struct Callback {
    /// The function to invoke.
    pub func: Box<dyn FnMut(Option<&Message>)>,

    /// How long after registration the callback expires.
    pub timeout: Duration,

    /// Whether the callback survives its expiry.
    pub daemon: bool,
}

impl Callback {
    /// Constructs a one-shot callback with the default timeout.
    pub fn new<F: FnMut(Option<&Message>) + 'static>(func: F) -> Callback {
        Callback {
            func: Box::new(func),
            timeout: DEFAULT_CALLBACK_TIMEOUT,
            daemon: false,
        }
    }

    /// Returns a copy with the given timeout.
    pub fn with_timeout(self, timeout: Duration) -> Callback {
        Callback { timeout, ..self }
    }

    /// Returns a copy flagged as a daemon callback.
    pub fn as_daemon(self) -> Callback {
        Callback {
            daemon: true,
            ..self
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Callback")
            .field("timeout", &self.timeout)
            .field("daemon", &self.daemon)
            .finish()
    }
}

/// An outbound packet plus its QoS envelope.
#[derive(Debug)]
pub struct Command {
    /// The verb to send.
    pub verb: Verb,

    /// The source address (normally the host gateway interface).
    pub from_addr: Address,

    /// The destination address.
    pub dest_addr: Address,

    /// The packet code.
    pub code: u16,

    /// The payload bytes.
    pub payload: Vec<u8>,

    /// The QoS envelope.
    pub qos: Qos,

    /// An optional callback, registered before the command is written.
    pub callback: Option<Callback>,
}

impl Command {
    /// Constructs a `Command` with the default QoS envelope for its code.
    pub fn new(verb: Verb, dest_addr: Address, code: u16, payload: Vec<u8>) -> Command {
        Command {
            verb,
            from_addr: Address::HGI,
            dest_addr,
            code,
            payload,
            qos: Qos::for_code(code),
            callback: None,
        }
    }

    /// Constructs a `Command` from hex payload text (as found in packet logs).
    pub fn from_hex(verb: Verb, dest_addr: Address, code: u16, payload_hex: &str) -> Command {
        let payload = crate::packet::payload_from_hex(payload_hex).unwrap_or_default();
        Command::new(verb, dest_addr, code, payload)
    }

    /// Replaces the QoS envelope.
    pub fn with_qos(mut self, qos: Qos) -> Command {
        self.qos = qos;
        self
    }

    /// Attaches a callback, to be registered before the write.
    pub fn with_callback(mut self, callback: Callback) -> Command {
        self.callback = Some(callback);
        self
    }

    /// Returns the QoS header the gateway's echo of this command will carry.
    pub fn echo_header(&self) -> Header {
        // the representative address is the non-gateway end
        let addr = if self.from_addr.is_gateway() {
            self.dest_addr
        } else {
            self.from_addr
        };
        Header::from_parts(self.verb, addr, self.code, &self.payload)
    }

    /// Returns the QoS header of the expected reply, if any.
    pub fn reply_header(&self) -> Header {
        self.echo_header().to_reply()
    }

    /// Encodes the command as a serial line (sans the trailing CRLF).
    pub fn to_line(&self) -> String {
        format!(
            "{} --- {} {} --:------ {:04X} {:03} {}",
            self.verb,
            self.from_addr,
            self.dest_addr,
            self.code,
            self.payload.len(),
            hex_from_payload(&self.payload),
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_line())
    }
}

// typed constructors for the common operations

impl Command {
    /// `RQ 0004` - get a zone's name.
    pub fn get_zone_name(ctl: Address, zone_idx: u8) -> Command {
        Command::new(Verb::Rq, ctl, 0x0004, vec![zone_idx, 0x00])
    }

    /// `RQ 0005` - get the zone mask for a zone type.
    pub fn get_system_zones(ctl: Address, zone_type: u8) -> Command {
        Command::new(Verb::Rq, ctl, 0x0005, vec![0x00, zone_type])
    }

    /// `RQ 0006` - get the schedule change counter.
    pub fn get_schedule_version(ctl: Address) -> Command {
        Command::new(Verb::Rq, ctl, 0x0006, vec![0x00])
    }

    /// `RQ 0008` - get a relay's demand.
    pub fn get_relay_demand(dev: Address) -> Command {
        Command::new(Verb::Rq, dev, 0x0008, vec![0x00])
    }

    /// `RQ 000A` - get a zone's configuration.
    pub fn get_zone_config(ctl: Address, zone_idx: u8) -> Command {
        Command::new(Verb::Rq, ctl, 0x000A, vec![zone_idx])
    }

    /// `RQ 000C` - get the devices of a zone (or domain) by device class.
    pub fn get_zone_devices(ctl: Address, zone_idx: u8, device_class: u8) -> Command {
        Command::new(Verb::Rq, ctl, 0x000C, vec![zone_idx, device_class])
    }

    /// `RQ 0016` - check the RF signal strength to a device.
    pub fn get_rf_check(dev: Address) -> Command {
        Command::new(Verb::Rq, dev, 0x0016, vec![0x00, 0xFF])
    }

    /// `RQ 0100` - get the controller's language.
    pub fn get_language(ctl: Address) -> Command {
        Command::new(Verb::Rq, ctl, 0x0100, vec![0x00])
    }

    /// `RQ 0404` - get one fragment of a zone's schedule.
    ///
    /// `frag_total` is the total last reported by the peer (0 for the first
    /// request).
    pub fn get_schedule_fragment(
        ctl: Address,
        zone_idx: u8,
        frag_index: u8,
        frag_total: u8,
    ) -> Command {
        let payload = vec![zone_idx, 0x20, 0x00, 0x08, 0x00, frag_index, frag_total];
        Command::new(Verb::Rq, ctl, 0x0404, payload)
    }

    /// `W 0404` - send one fragment of a zone's schedule.
    pub fn set_schedule_fragment(
        ctl: Address,
        zone_idx: u8,
        frag_index: u8,
        frag_total: u8,
        fragment: &[u8],
    ) -> Command {
        let mut payload = vec![
            zone_idx,
            0x20,
            0x00,
            0x08,
            fragment.len() as u8,
            frag_index,
            frag_total,
        ];
        payload.extend_from_slice(fragment);
        Command::new(Verb::W, ctl, 0x0404, payload)
    }

    /// `RQ 0418` - get one fault-log entry.
    pub fn get_fault_log_entry(ctl: Address, log_idx: u8) -> Command {
        Command::new(Verb::Rq, ctl, 0x0418, vec![0x00, 0x00, log_idx])
    }

    /// `RQ 10A0` - get the DHW parameters.
    pub fn get_dhw_params(ctl: Address) -> Command {
        Command::new(Verb::Rq, ctl, 0x10A0, vec![0x00])
    }

    /// `RQ 10E0` - get a device's hardware info.
    pub fn get_device_info(dev: Address) -> Command {
        Command::new(Verb::Rq, dev, 0x10E0, vec![0x00])
    }

    /// `RQ 1100` - get the boiler relay's TPI parameters.
    pub fn get_tpi_params(dev: Address) -> Command {
        Command::new(Verb::Rq, dev, 0x1100, vec![0xFC])
    }

    /// `RQ 1260` - get the stored hot water temperature.
    pub fn get_dhw_temp(ctl: Address) -> Command {
        Command::new(Verb::Rq, ctl, 0x1260, vec![0x00])
    }

    /// `RQ 1F41` - get the DHW mode.
    pub fn get_dhw_mode(ctl: Address) -> Command {
        Command::new(Verb::Rq, ctl, 0x1F41, vec![0x00])
    }

    /// `W 1F41` - force the DHW on/off for a duration, or indefinitely.
    pub fn set_dhw_mode(
        ctl: Address,
        state: DhwState,
        mode: ZoneMode,
        until: Option<NaiveDateTime>,
    ) -> Command {
        let mut payload = vec![0x00, state.to_byte(), mode.to_byte(), 0xFF, 0xFF, 0xFF];
        if let Some(until) = until {
            payload.extend_from_slice(&dtm_to_bytes(until));
        }
        Command::new(Verb::W, ctl, 0x1F41, payload)
    }

    /// `RQ 2309` - get a zone's setpoint.
    pub fn get_zone_setpoint(ctl: Address, zone_idx: u8) -> Command {
        Command::new(Verb::Rq, ctl, 0x2309, vec![zone_idx])
    }

    /// `RQ 2349` - get a zone's mode.
    pub fn get_zone_mode(ctl: Address, zone_idx: u8) -> Command {
        Command::new(Verb::Rq, ctl, 0x2349, vec![zone_idx])
    }

    /// `W 2349` - override a zone's setpoint for a duration, or indefinitely.
    ///
    /// A `Temporary` mode requires `until`; the other modes ignore it.
    pub fn set_zone_mode(
        ctl: Address,
        zone_idx: u8,
        mode: ZoneMode,
        setpoint: Option<f64>,
        until: Option<NaiveDateTime>,
    ) -> Command {
        let mut payload = vec![zone_idx];
        payload.extend_from_slice(&temp_to_bytes(setpoint));
        payload.push(mode.to_byte());
        payload.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
        if let Some(until) = until {
            payload.extend_from_slice(&dtm_to_bytes(until));
        }
        Command::new(Verb::W, ctl, 0x2349, payload)
    }

    /// `RQ 2E04` - get the system mode.
    pub fn get_system_mode(ctl: Address) -> Command {
        Command::new(Verb::Rq, ctl, 0x2E04, vec![0xFF])
    }

    /// `W 2E04` - set the system mode for a duration, or indefinitely.
    pub fn set_system_mode(
        ctl: Address,
        mode: SystemMode,
        until: Option<NaiveDateTime>,
    ) -> Command {
        let mut payload = vec![mode.to_byte()];
        match until {
            Some(until) => {
                payload.extend_from_slice(&dtm_to_bytes(until));
                payload.push(0x01);
            }
            None => {
                payload.extend_from_slice(&[0xFF; 6]);
                payload.push(0x00);
            }
        }
        Command::new(Verb::W, ctl, 0x2E04, payload)
    }

    /// `RQ 30C9` - get a zone's temperature.
    pub fn get_zone_temp(ctl: Address, zone_idx: u8) -> Command {
        Command::new(Verb::Rq, ctl, 0x30C9, vec![zone_idx])
    }

    /// `RQ 313F` - get the controller's date and time.
    pub fn get_system_time(ctl: Address) -> Command {
        Command::new(Verb::Rq, ctl, 0x313F, vec![0x00])
    }

    /// `RQ 3220` - poll an OpenTherm bridge for one message id.
    pub fn get_opentherm(dev: Address, msg_id: u8) -> Command {
        // a Read-Data frame with zero data bytes, parity bit included
        let mut payload = vec![0x00, 0x00, msg_id, 0x00, 0x00];
        let frame = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
        payload[1] |= opentherm::parity(frame & 0x7FFF_FFFF) << 7;
        Command::new(Verb::Rq, dev, 0x3220, payload)
    }

    /// `RQ 3EF1` - get an actuator's cycle state.
    pub fn get_actuator_cycle(dev: Address) -> Command {
        Command::new(Verb::Rq, dev, 0x3EF1, vec![0x00])
    }
}

/// Encodes a datetime as the 6-byte `MM HH DD MM YYYY` wire form.
pub fn dtm_to_bytes(dtm: NaiveDateTime) -> [u8; 6] {
    let year = dtm.year() as u16;
    [
        dtm.minute() as u8,
        dtm.hour() as u8,
        dtm.day() as u8,
        dtm.month() as u8,
        (year >> 8) as u8,
        (year & 0xFF) as u8,
    ]
}

/// Encodes a temperature/setpoint as the 2-byte scale-0.01 wire form.
///
/// `None` encodes as the `7FFF` "not available" sentinel (the controller
/// substitutes the maximum setpoint where one is required).
pub fn temp_to_bytes(temp: Option<f64>) -> [u8; 2] {
    match temp {
        Some(temp) => {
            let value = (temp * 100.0).round() as i16;
            [(value >> 8) as u8, (value & 0xFF) as u8]
        }
        None => [0x7F, 0xFF],
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn ctl() -> Address {
        "01:145038".parse().unwrap()
    }

    #[test]
    fn test_to_line() {
        let cmd = Command::get_zone_config(ctl(), 0x01);
        assert_eq!(
            "RQ --- 18:000730 01:145038 --:------ 000A 001 01",
            cmd.to_line()
        );
    }

    #[test]
    fn test_set_zone_mode() {
        // W --- HGI CTL --:------ 2349 013 0107A604FFFFFF<dtm-hex>
        let until = NaiveDate::from_ymd_opt(2024, 12, 24)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        let cmd = Command::set_zone_mode(ctl(), 0x01, ZoneMode::Temporary, Some(19.5), Some(until));

        assert_eq!(
            " W --- 18:000730 01:145038 --:------ 2349 013 0107A604FFFFFF0012180C07E8",
            cmd.to_line()
        );
    }

    #[test]
    fn test_headers() {
        let cmd = Command::get_schedule_fragment(ctl(), 0x01, 1, 0);
        assert_eq!("RQ|01:145038|0404|0101", cmd.echo_header().to_string());
        assert_eq!("RP|01:145038|0404|0101", cmd.reply_header().to_string());

        let cmd = Command::get_fault_log_entry(ctl(), 3);
        assert_eq!("RQ|01:145038|0418|03", cmd.echo_header().to_string());

        let cmd = Command::get_system_mode(ctl());
        assert_eq!("RQ|01:145038|2E04", cmd.echo_header().to_string());
        assert_eq!("RP|01:145038|2E04", cmd.reply_header().to_string());
    }

    #[test]
    fn test_default_qos() {
        assert_eq!(Priority::High, Command::get_rf_check(ctl()).qos.priority);
        assert_eq!(
            Priority::Default,
            Command::get_zone_config(ctl(), 0).qos.priority
        );
        assert_eq!(QOS_RETRIES, Qos::default().retries);
    }

    #[test]
    fn test_get_opentherm_parity() {
        // id 0x05 has even bit count: no parity bit
        let cmd = Command::get_opentherm("10:067219".parse().unwrap(), 0x05);
        assert_eq!(vec![0x00, 0x00, 0x05, 0x00, 0x00], cmd.payload);

        // id 0x19 has odd bit count: parity bit set
        let cmd = Command::get_opentherm("10:067219".parse().unwrap(), 0x19);
        assert_eq!(vec![0x00, 0x80, 0x19, 0x00, 0x00], cmd.payload);
    }

    #[test]
    fn test_dtm_to_bytes() {
        let dtm = NaiveDate::from_ymd_opt(2020, 11, 30)
            .unwrap()
            .and_hms_opt(13, 15, 0)
            .unwrap();
        assert_eq!([0x0F, 0x0D, 0x1E, 0x0B, 0x07, 0xE4], dtm_to_bytes(dtm));
    }

    #[test]
    fn test_temp_to_bytes() {
        assert_eq!([0x07, 0xA6], temp_to_bytes(Some(19.5)));
        assert_eq!([0x08, 0x34], temp_to_bytes(Some(21.0)));
        assert_eq!([0x7F, 0xFF], temp_to_bytes(None));
    }
}
