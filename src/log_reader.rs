use std::io::{BufRead, BufReader, Read};

use chrono::NaiveDateTime;
use log::warn;

use crate::{error::Result, packet::Packet};

/// Replays validated `Packet`s from a packet log.
///
/// Each line is `ISO8601-timestamp<SP>packet-text`; packets are timestamped
/// from the log, not from the wall clock, so replay reconstructs the same
/// model the live run would have built. Lines with an invalid timestamp are
/// skipped with a warning (unless they are comments), as are lines failing
/// packet validation.
///
/// # Examples
///
/// ```rust,no_run
/// use std::fs::File;
///
/// use ramses_rf::LogReader;
///
/// let file = File::open("packet.log").expect("Unable to open the packet log");
/// let mut reader = LogReader::new(file);
///
/// while let Some(pkt) = reader.read_packet().unwrap() {
///     println!("{}", pkt);
/// }
/// ```
#[derive(Debug)]
pub struct LogReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> LogReader<R> {
    /// Constructs a `LogReader`.
    pub fn new(reader: R) -> LogReader<R> {
        LogReader {
            reader: BufReader::new(reader),
        }
    }

    /// Reads lines until a valid packet is found, or EOF.
    pub fn read_packet(&mut self) -> Result<Option<Packet>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }

            let line = line.trim_end_matches(&['\r', '\n'][..]);
            if line.is_empty() {
                continue;
            }

            let Some((dtm, packet_line)) = split_timestamp(line) else {
                if !line.trim_start().starts_with('#') {
                    warn!("{line} < packet line has an invalid timestamp (ignoring)");
                }
                continue;
            };

            match Packet::from_raw_line(dtm, packet_line) {
                Ok(pkt) => return Ok(Some(pkt)),
                Err(err) => warn!("{packet_line} < {err}"),
            }
        }
    }
}

/// Splits off the leading ISO8601 timestamp (`T` or space separated).
fn split_timestamp(line: &str) -> Option<(NaiveDateTime, &str)> {
    if line.len() < 27 {
        return None;
    }
    let (dtm, rest) = line.split_at(26);
    let dtm = NaiveDateTime::parse_from_str(dtm, "%Y-%m-%dT%H:%M:%S%.6f")
        .or_else(|_| NaiveDateTime::parse_from_str(dtm, "%Y-%m-%d %H:%M:%S%.6f"))
        .ok()?;
    Some((dtm, rest.trim_start()))
}
