use std::fmt;

use chrono::NaiveDateTime;

use crate::{
    address::Address,
    error::Result,
    header::Header,
    packet::{Packet, Verb},
    parsers::{self, MsgIndex, Payload},
};

/// A packet plus its parsed payload.
///
/// Construction runs the packet through the opcode parser registry; a packet
/// whose payload fails its decoder's assertions never becomes a `Message`.
#[derive(Clone, Debug)]
pub struct Message {
    /// The underlying packet.
    pub pkt: Packet,

    /// The entity the payload addresses (zone, domain, circuit or none).
    pub index: MsgIndex,

    /// The parsed payload record(s).
    pub payload: Payload,

    /// Whether the raw payload was an array of records.
    pub is_array: bool,
}

impl Message {
    /// Parses a validated packet into a `Message`.
    pub fn new(pkt: Packet, max_zones: u8) -> Result<Message> {
        let is_array = parsers::is_array(&pkt);
        let (index, payload) = parsers::parse(&pkt, is_array, max_zones)?;
        Ok(Message {
            pkt,
            index,
            payload,
            is_array,
        })
    }

    /// Returns the QoS correlation header of the underlying packet.
    pub fn header(&self) -> Header {
        Header::from_packet(&self.pkt)
    }

    /// The source device address.
    pub fn src(&self) -> Address {
        self.pkt.src
    }

    /// The destination device address.
    pub fn dst(&self) -> Address {
        self.pkt.dst
    }

    /// The packet verb.
    pub fn verb(&self) -> Verb {
        self.pkt.verb
    }

    /// The packet code.
    pub fn code(&self) -> u16 {
        self.pkt.code
    }

    /// The reception timestamp.
    pub fn dtm(&self) -> NaiveDateTime {
        self.pkt.dtm
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "|| {:<10} | {:<10} | {} | {:04X} || {:?}",
            self.src().to_string(),
            if self.dst() == self.src() {
                String::new()
            } else {
                self.dst().to_string()
            },
            self.verb(),
            self.code(),
            self.payload,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        parsers::{Temp, TempRec},
        test_utils::{pkt_from_line, test_timestamp},
    };

    #[test]
    fn test_new() {
        let pkt = pkt_from_line("045  I --- 01:145038 --:------ 01:145038 30C9 003 000838");
        let msg = Message::new(pkt, 12).unwrap();

        assert_eq!(false, msg.is_array);
        assert_eq!(0x30C9, msg.code());
        assert_eq!(Verb::I, msg.verb());
        assert_eq!(msg.src(), msg.dst());
        assert_eq!(test_timestamp(), msg.dtm());
        assert_eq!(
            Payload::Temperature(TempRec {
                zone_idx: 0,
                temperature: Some(Temp::Celsius(21.04)),
            }),
            msg.payload
        );
        assert_eq!(" I|01:145038|30C9|00", msg.header().to_string());
    }

    #[test]
    fn test_new_array() {
        let pkt = pkt_from_line(
            "045  I --- 01:145038 --:------ 01:145038 30C9 009 0007E8010800020834",
        );
        let msg = Message::new(pkt, 12).unwrap();

        assert_eq!(true, msg.is_array);
        assert_eq!(MsgIndex::None, msg.index);
    }

    #[test]
    fn test_new_invalid() {
        // a payload failing its decoder's assertions is rejected
        let pkt = pkt_from_line("045  I --- 01:145038 --:------ 01:145038 30C9 003 0DFFFF");
        assert!(Message::new(pkt, 12).is_err());
    }

    #[test]
    fn test_display() {
        let pkt = pkt_from_line("045 RP --- 01:145038 18:013393 --:------ 1260 003 000911");
        let msg = Message::new(pkt, 12).unwrap();
        let text = msg.to_string();

        assert!(text.contains("01:145038"), "{text}");
        assert!(text.contains("18:013393"), "{text}");
        assert!(text.contains("1260"), "{text}");
    }
}
