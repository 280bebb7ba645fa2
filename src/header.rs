use std::fmt;

use crate::{
    address::Address,
    packet::{Packet, Verb},
};

/// Packet codes that carry no opcode-specific disambiguator: their headers
/// correlate on `verb|addr|code` alone.
pub const CODES_SANS_CONTEXT: [u16; 4] = [0x0016, 0x1F09, 0x1FC9, 0x2E04];

/// The payload of a "fault log exhausted" reply (a null 0418 record).
pub const NULL_FAULT_LOG_RP: [u8; 22] = [
    0x00, 0x00, 0x00, 0xB0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7F,
    0xFF, 0xFF, 0x70, 0x00, 0x00, 0x00, 0x00,
];

/// The QoS correlation key of a packet.
///
/// A request header and its expected reply header differ only by a verb swap
/// (`RQ`/`RP`, `W`/`I`). The optional context is opcode-specific: zone index
/// for `0005`/`000C`, zone index plus fragment index for `0404`, log index
/// for `0418`, the leading domain/zone byte for most others, and absent for
/// the [`CODES_SANS_CONTEXT`] set.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Header {
    /// The packet verb.
    pub verb: Verb,

    /// The representative device address (the non-gateway end).
    pub addr: Address,

    /// The packet code.
    pub code: u16,

    /// The opcode-specific context bytes, if any.
    pub ctx: Option<Vec<u8>>,
}

impl Header {
    /// Derives the header of a received packet.
    pub fn from_packet(pkt: &Packet) -> Header {
        // for packets to/from the gateway itself, correlate on the peer
        let addr = if pkt.addrs[0].is_gateway() {
            pkt.addrs[1]
        } else {
            pkt.addrs[0]
        };
        Header::from_parts(pkt.verb, addr, pkt.code, &pkt.payload)
    }

    /// Derives a header from the packet fields.
    pub fn from_parts(verb: Verb, addr: Address, code: u16, payload: &[u8]) -> Header {
        let ctx = header_context(code, payload);
        Header {
            verb,
            addr,
            code,
            ctx,
        }
    }

    /// Returns the header the expected reply will carry.
    pub fn to_reply(&self) -> Header {
        Header {
            verb: self.verb.reply(),
            addr: self.addr,
            code: self.code,
            ctx: self.ctx.clone(),
        }
    }
}

/// Extracts the opcode-specific context bytes from a payload, if any.
fn header_context(code: u16, payload: &[u8]) -> Option<Vec<u8>> {
    match code {
        // zone idx + zone/device class
        0x0005 | 0x000C => Some(payload.get(0..2)?.to_vec()),
        // zone idx + fragment index, so concurrent fragments don't mis-match
        0x0404 => Some(vec![*payload.first()?, *payload.get(5)?]),
        // log idx; the null reply correlates on the bare header
        0x0418 => {
            if payload == NULL_FAULT_LOG_RP {
                None
            } else {
                Some(vec![*payload.get(2)?])
            }
        }
        _ if CODES_SANS_CONTEXT.contains(&code) => None,
        // assume a leading domain id / zone idx
        _ => Some(vec![*payload.first()?]),
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}|{}|{:04X}", self.verb, self.addr, self.code)?;
        if let Some(ctx) = &self.ctx {
            write!(f, "|")?;
            for byte in ctx {
                write!(f, "{byte:02X}")?;
            }
        }
        Ok(())
    }
}
