use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use log::warn;

use crate::{
    address::Address,
    error::{Error, Result},
};

/// The largest declared payload length the protocol allows, in bytes.
pub const MAX_PAYLOAD_LEN: usize = 48;

/// A packet verb.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Verb {
    /// `" I"` - broadcast information.
    I,
    /// `"RQ"` - request.
    Rq,
    /// `"RP"` - reply.
    Rp,
    /// `" W"` - write.
    W,
}

impl Verb {
    /// Returns the verb of the expected reply: `RQ` pairs with `RP`, `W` with `I`.
    pub fn reply(self) -> Verb {
        match self {
            Verb::Rq => Verb::Rp,
            Verb::Rp => Verb::Rq,
            Verb::W => Verb::I,
            Verb::I => Verb::W,
        }
    }
}

impl FromStr for Verb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Verb> {
        match s {
            " I" | "I" => Ok(Verb::I),
            "RQ" => Ok(Verb::Rq),
            "RP" => Ok(Verb::Rp),
            " W" | "W" => Ok(Verb::W),
            _ => Err(Error::MalformedLine(format!("invalid verb: {s:?}"))),
        }
    }
}

impl fmt::Display for Verb {
    /// Formats as the fixed-width two-character on-wire form.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Verb::I => " I",
            Verb::Rq => "RQ",
            Verb::Rp => "RP",
            Verb::W => " W",
        };
        write!(f, "{s}")
    }
}

/// Splits a raw line into its packet text, firmware error tag and comment.
///
/// The line grammar is `<packet> [< parser-note] [* firmware-error] [# comment]`.
pub fn split_line(line: &str) -> (&str, Option<&str>, Option<&str>) {
    let (rest, comment) = match line.split_once('#') {
        Some((a, b)) => (a, Some(b.trim())),
        None => (line, None),
    };
    let (rest, error_text) = match rest.split_once('*') {
        Some((a, b)) => (a, Some(b.trim())),
        None => (rest, None),
    };
    let packet = match rest.split_once('<') {
        Some((a, _)) => a,
        None => rest,
    };
    (packet.trim(), error_text, comment)
}

/// A validated RAMSES-II packet, as captured at reception.
#[derive(Clone, Debug)]
pub struct Packet {
    /// The timestamp when this `Packet` was received.
    pub dtm: NaiveDateTime,

    /// The signal strength reported by the gateway, if any.
    pub rssi: Option<u8>,

    /// The verb of this `Packet`.
    pub verb: Verb,

    /// The sequence number, if any (used by some HVAC devices).
    pub seqn: Option<u8>,

    /// The three address slots, as they appeared on the wire.
    pub addrs: [Address; 3],

    /// The source device address derived from the address triple.
    pub src: Address,

    /// The destination device address derived from the address triple
    /// ([`Address::NON`] for an undirected broadcast).
    pub dst: Address,

    /// The packet code (4 hex digits on the wire).
    pub code: u16,

    /// The payload bytes (the declared length matches `payload.len()`).
    pub payload: Vec<u8>,
}

impl Packet {
    /// Parses and validates a packet from the text of one serial line.
    ///
    /// `line` must already be stripped of its `*`/`#` annotations (see
    /// [`split_line`]). Lines failing structural, address or length validation
    /// return an error; the caller logs and drops them.
    pub fn from_line(dtm: NaiveDateTime, line: &str) -> Result<Packet> {
        let malformed = |err: &str| Error::MalformedLine(format!("{err}: {line:?}"));

        // `RSSI VV SEQ ADDR0 ADDR1 ADDR2 CODE LEN PAYLOAD`, all fields fixed-width
        if line.len() < 52 || !line.is_ascii() {
            return Err(malformed("invalid packet structure"));
        }
        for idx in [3, 6, 10, 20, 30, 40, 45, 49] {
            if line.as_bytes()[idx] != b' ' {
                return Err(malformed("invalid packet structure"));
            }
        }

        let rssi = parse_optional_u8(&line[0..3], 10)?;
        let verb: Verb = line[4..6].parse()?;
        let seqn = parse_optional_u8(&line[7..10], 10)?;

        let addrs = [
            line[11..20].parse::<Address>()?,
            line[21..30].parse::<Address>()?,
            line[31..40].parse::<Address>()?,
        ];

        let code = u16::from_str_radix(&line[41..45], 16)
            .map_err(|_| malformed("invalid packet code"))?;
        let len: usize = line[46..49]
            .parse()
            .map_err(|_| malformed("invalid payload length"))?;

        let (src, dst) = validate_addresses(&addrs).ok_or_else(|| {
            malformed("invalid packet addresses")
        })?;

        if len > MAX_PAYLOAD_LEN {
            return Err(malformed("excessive payload length"));
        }
        let payload_hex = &line[50..];
        if payload_hex.len() != len * 2 {
            return Err(malformed("mismatched payload length"));
        }
        let payload = payload_from_hex(payload_hex)
            .ok_or_else(|| malformed("invalid payload hex"))?;

        Ok(Packet {
            dtm,
            rssi,
            verb,
            seqn,
            addrs,
            src,
            dst,
            code,
            payload,
        })
    }

    /// Parses a raw received line, including its annotations.
    ///
    /// A line with a firmware error tag, or a blank packet with only a
    /// comment, is logged at warning level and fails validation.
    pub fn from_raw_line(dtm: NaiveDateTime, raw_line: &str) -> Result<Packet> {
        let (packet, error_text, comment) = split_line(raw_line);

        if let Some(err) = error_text {
            warn!("{packet} < bad packet: * {err}");
            return Err(Error::MalformedLine(format!("firmware error: {err}")));
        }
        if packet.is_empty() {
            if let Some(comment) = comment {
                warn!("< null packet: # {comment}");
            }
            return Err(Error::MalformedLine("null packet".to_string()));
        }

        Packet::from_line(dtm, packet)
    }

    /// Returns the payload as an uppercase hex string.
    pub fn payload_hex(&self) -> String {
        hex_from_payload(&self.payload)
    }

    /// Recreates the packet text, e.g. for the packet log.
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {} {} {:04X} {:03} {}",
            match self.rssi {
                Some(rssi) => format!("{rssi:03}"),
                None => "---".to_string(),
            },
            self.verb,
            match self.seqn {
                Some(seqn) => format!("{seqn:03}"),
                None => "---".to_string(),
            },
            self.addrs[0],
            self.addrs[1],
            self.addrs[2],
            self.code,
            self.payload.len(),
            self.payload_hex(),
        )
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_line())
    }
}

/// Applies the "one or two real devices" rule, returning `(src, dst)`.
///
/// Either slot 0 holds the source (and exactly one of slots 1/2 is unused), or
/// slots 0/1 are both unused and slot 2 holds the true source. Source and
/// destination with the same device type (but different ids) are invalid.
fn validate_addresses(addrs: &[Address; 3]) -> Option<(Address, Address)> {
    let rule_1 = addrs[0].is_device()
        && (addrs[1].is_non_device() != addrs[2].is_non_device());
    let rule_2 = addrs[2].is_device()
        && addrs[0].is_non_device()
        && addrs[1].is_non_device();
    if !rule_1 && !rule_2 {
        return None;
    }

    let device_addrs: Vec<Address> = addrs
        .iter()
        .copied()
        .filter(|addr| !addr.is_non_device())
        .collect();
    if device_addrs.len() > 2 {
        return None;
    }

    let src = device_addrs[0];
    let dst = device_addrs.get(1).copied().unwrap_or(Address::NON);

    // e.g. `064  I --- 01:078710 --:------ 01:144246 1F09 003 FF04B5` is invalid
    if src != dst && dst.is_device() && src.dev_type() == dst.dev_type() {
        return None;
    }

    Some((src, dst))
}

fn parse_optional_u8(field: &str, radix: u32) -> Result<Option<u8>> {
    if field == "---" || field == "..." {
        Ok(None)
    } else {
        u8::from_str_radix(field, radix)
            .map(Some)
            .map_err(|_| Error::MalformedLine(format!("invalid numeric field: {field:?}")))
    }
}

/// Decodes an uppercase hex string into payload bytes.
pub fn payload_from_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    hex.as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

/// Encodes payload bytes as an uppercase hex string.
pub fn hex_from_payload(payload: &[u8]) -> String {
    payload.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::test_timestamp;

    #[test]
    fn test_split_line() {
        assert_eq!(("abc", None, None), split_line("abc"));
        assert_eq!(("abc", None, Some("cmt")), split_line("abc # cmt"));
        assert_eq!(("abc", Some("err"), None), split_line("abc * err"));
        assert_eq!(("abc", Some("err"), Some("cmt")), split_line("abc * err # cmt"));
        assert_eq!(("abc", None, None), split_line("abc < note"));
        assert_eq!(("", None, Some("evofw3 v0.7.0")), split_line("# evofw3 v0.7.0"));
    }

    #[test]
    fn test_from_line() {
        let dtm = test_timestamp();

        let pkt = Packet::from_line(
            dtm,
            "045  I --- 01:145038 --:------ 01:145038 1F09 003 FF073F",
        )
        .unwrap();
        assert_eq!(Some(45), pkt.rssi);
        assert_eq!(Verb::I, pkt.verb);
        assert_eq!(None, pkt.seqn);
        assert_eq!("01:145038".parse::<Address>().unwrap(), pkt.src);
        assert_eq!(pkt.src, pkt.dst);
        assert_eq!(0x1F09, pkt.code);
        assert_eq!(vec![0xFF, 0x07, 0x3F], pkt.payload);

        let pkt = Packet::from_line(
            dtm,
            "069 RQ --- 18:013393 01:145038 --:------ 0404 007 00200008000100",
        )
        .unwrap();
        assert_eq!(Verb::Rq, pkt.verb);
        assert_eq!("18:013393".parse::<Address>().unwrap(), pkt.src);
        assert_eq!("01:145038".parse::<Address>().unwrap(), pkt.dst);
        assert_eq!(7, pkt.payload.len());

        // a directed packet with the true source in slot 2
        let pkt = Packet::from_line(
            dtm,
            "056  I --- --:------ --:------ 12:207082 313F 009 0038021ECB1F0507E4",
        )
        .unwrap();
        assert_eq!("12:207082".parse::<Address>().unwrap(), pkt.src);
        assert_eq!(Address::NON, pkt.dst);
    }

    #[test]
    fn test_from_line_invalid() {
        let dtm = test_timestamp();

        // same device type in src and dst
        assert!(Packet::from_line(
            dtm,
            "064  I --- 01:078710 --:------ 01:144246 1F09 003 FF04B5",
        )
        .is_err());

        // three real devices
        assert!(Packet::from_line(
            dtm,
            "064  I --- 01:078710 04:056057 13:144246 1F09 003 FF04B5",
        )
        .is_err());

        // all three slots unused
        assert!(Packet::from_line(
            dtm,
            "000  I --- --:------ --:------ --:------ 0001 005 00FFFF02FF",
        )
        .is_err());

        // declared length does not match the payload
        assert!(Packet::from_line(
            dtm,
            "045  I --- 01:145038 --:------ 01:145038 1F09 004 FF073F",
        )
        .is_err());

        // excessive declared length
        let long = format!(
            "045  I --- 01:145038 --:------ 01:145038 1F09 049 {}",
            "00".repeat(49)
        );
        assert!(Packet::from_line(dtm, &long).is_err());

        // structural damage
        assert!(Packet::from_line(dtm, "045 I --- 01:145038").is_err());
        assert!(Packet::from_line(
            dtm,
            "045  X --- 01:145038 --:------ 01:145038 1F09 003 FF073F",
        )
        .is_err());
    }

    #[test]
    fn test_from_raw_line() {
        let dtm = test_timestamp();

        assert!(Packet::from_raw_line(dtm, "# evofw3 v0.7.0").is_err());
        assert!(Packet::from_raw_line(
            dtm,
            "045  I --- 01:145038 --:------ 01:145038 1F09 003 FF073F * CRC",
        )
        .is_err());

        let pkt = Packet::from_raw_line(
            dtm,
            "045  I --- 01:145038 --:------ 01:145038 1F09 003 FF073F",
        )
        .unwrap();
        assert_eq!(0x1F09, pkt.code);
    }

    #[test]
    fn test_to_line_round_trip() {
        let dtm = test_timestamp();
        let line = "045  I --- 01:145038 --:------ 01:145038 1F09 003 FF073F";

        let pkt = Packet::from_line(dtm, line).unwrap();
        assert_eq!(line, pkt.to_line());
        assert_eq!("FF073F", pkt.payload_hex());
    }

    #[test]
    fn test_verb() {
        assert_eq!(Verb::Rp, Verb::Rq.reply());
        assert_eq!(Verb::I, Verb::W.reply());
        assert_eq!(" I", Verb::I.to_string());
        assert_eq!(" W", Verb::W.to_string());
        assert_eq!("RQ", "RQ".parse::<Verb>().unwrap().to_string());
    }
}
