//! The zone-schedule transfer protocol (code `0404`).
//!
//! A weekly schedule travels as zlib-compressed fragments of at most 41
//! bytes, requested (or written) one at a time. [`FragmentAssembly`] collects
//! inbound fragments into a slot array; a complete set inflates to a stream
//! of fixed 20-byte switchpoint records.

use std::io::{Read, Write};

use chrono::{Duration, NaiveDateTime};
use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use log::warn;

use crate::error::{Error, Result};

/// Fragments older than this, relative to the newest, are discarded.
const FRAGMENT_MAX_AGE_SECS: i64 = 300;

/// The fragment payload size: 48 bytes minus the 7-byte `0404` header.
pub const MAX_FRAGMENT_LEN: usize = 41;

/// One switchpoint of a day's schedule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Switchpoint {
    /// Minutes after midnight.
    pub time_of_day: u16,
    /// The setpoint from that time on, in degrees Celsius.
    pub heat_setpoint: f64,
}

impl Switchpoint {
    /// Formats the time of day as `HH:MM`.
    pub fn time_of_day_string(&self) -> String {
        format!("{:02}:{:02}", self.time_of_day / 60, self.time_of_day % 60)
    }
}

/// The switchpoints of one weekday.
#[derive(Clone, Debug, PartialEq)]
pub struct DaySchedule {
    /// The weekday, 0 (Monday) to 6.
    pub day_of_week: u8,
    /// The day's switchpoints, in time order.
    pub switchpoints: Vec<Switchpoint>,
}

/// A zone's weekly schedule.
#[derive(Clone, Debug, PartialEq)]
pub struct Schedule {
    /// The zone the schedule belongs to.
    pub zone_idx: u8,
    /// One entry per weekday.
    pub days: Vec<DaySchedule>,
}

/// Decodes the inflated switchpoint stream (one 20-byte record each).
pub fn schedule_from_blob(blob: &[u8]) -> Result<Schedule> {
    if blob.is_empty() || blob.len() % 20 != 0 {
        return Err(Error::CorruptPayload(format!(
            "invalid schedule length: {}",
            blob.len()
        )));
    }

    let mut zone_idx = 0;
    let mut days: Vec<DaySchedule> = Vec::new();
    for rec in blob.chunks(20) {
        // xxxx BB xxx DD xxx TTTT xx SSSS xx (little-endian words)
        zone_idx = rec[4];
        let day_of_week = rec[8];
        let time_of_day = u16::from(rec[12]) | u16::from(rec[13]) << 8;
        let temp = u16::from(rec[16]) | u16::from(rec[17]) << 8;

        if day_of_week > 6 {
            return Err(Error::CorruptPayload(format!(
                "invalid schedule day: {day_of_week}"
            )));
        }
        if days.last().map(|day| day.day_of_week) != Some(day_of_week) {
            days.push(DaySchedule {
                day_of_week,
                switchpoints: Vec::new(),
            });
        }
        if let Some(day) = days.last_mut() {
            day.switchpoints.push(Switchpoint {
                time_of_day,
                heat_setpoint: f64::from(temp) / 100.0,
            });
        }
    }

    Ok(Schedule { zone_idx, days })
}

/// Encodes a schedule as the fixed-layout switchpoint stream.
pub fn blob_from_schedule(schedule: &Schedule) -> Vec<u8> {
    let mut blob = Vec::new();
    for day in &schedule.days {
        for switchpoint in &day.switchpoints {
            let mut rec = [0u8; 20];
            rec[4] = schedule.zone_idx;
            rec[8] = day.day_of_week;
            rec[12] = (switchpoint.time_of_day & 0xFF) as u8;
            rec[13] = (switchpoint.time_of_day >> 8) as u8;
            let temp = (switchpoint.heat_setpoint * 100.0).round() as u16;
            rec[16] = (temp & 0xFF) as u8;
            rec[17] = (temp >> 8) as u8;
            blob.extend_from_slice(&rec);
        }
    }
    blob
}

/// Inflates and decodes a complete set of fragments.
pub fn schedule_from_fragments(fragments: &[Vec<u8>]) -> Result<Schedule> {
    let deflated: Vec<u8> = fragments.iter().flatten().copied().collect();

    let mut blob = Vec::new();
    ZlibDecoder::new(deflated.as_slice())
        .read_to_end(&mut blob)
        .map_err(|err| Error::CorruptPayload(format!("invalid schedule fragments: {err}")))?;

    schedule_from_blob(&blob)
}

/// Deflates a schedule and chunks it into fragments of at most 41 bytes.
pub fn fragments_from_schedule(schedule: &Schedule) -> Result<Vec<Vec<u8>>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&blob_from_schedule(schedule))?;
    let deflated = encoder.finish()?;

    Ok(deflated
        .chunks(MAX_FRAGMENT_LEN)
        .map(|chunk| chunk.to_vec())
        .collect())
}

#[derive(Clone, Debug)]
struct FragSlot {
    dtm: NaiveDateTime,
    bytes: Vec<u8>,
}

/// Collects the fragments of one schedule transfer into a slot array.
///
/// The array is sized to the total the peer last reported; if the total
/// changes mid-sequence the array is re-initialised, and fragments much older
/// than the newest one are discarded.
#[derive(Clone, Debug, Default)]
pub struct FragmentAssembly {
    total: u8,
    slots: Vec<Option<FragSlot>>,
}

impl FragmentAssembly {
    /// Constructs an empty `FragmentAssembly`.
    pub fn new() -> FragmentAssembly {
        FragmentAssembly::default()
    }

    /// Discards all fragments.
    pub fn reset(&mut self) {
        self.total = 0;
        self.slots.clear();
    }

    /// Stores one received fragment (`frag_index` is 1-based).
    pub fn add(&mut self, dtm: NaiveDateTime, frag_index: u8, frag_total: u8, bytes: Vec<u8>) {
        if frag_index == 0 || frag_total == 0 || frag_index > frag_total {
            warn!("discarding fragment {frag_index}/{frag_total}");
            return;
        }

        if self.total != frag_total {
            if self.total != 0 {
                warn!("total fragments has changed: will re-initialise array");
            }
            self.total = frag_total;
            self.slots = vec![None; usize::from(frag_total)];
        }

        self.slots[usize::from(frag_index) - 1] = Some(FragSlot { dtm, bytes });

        // discard any fragments significantly older than this most recent one
        let min_dtm = dtm - Duration::seconds(FRAGMENT_MAX_AGE_SECS);
        for slot in &mut self.slots {
            if slot.as_ref().map_or(false, |frag| frag.dtm < min_dtm) {
                *slot = None;
            }
        }
    }

    /// The total number of fragments the peer last reported (0 if unknown).
    pub fn total(&self) -> u8 {
        self.total
    }

    /// The 1-based index of the first missing fragment, if any.
    pub fn next_missing(&self) -> Option<u8> {
        if self.total == 0 {
            return Some(1);
        }
        self.slots
            .iter()
            .position(|slot| slot.is_none())
            .map(|at| at as u8 + 1)
    }

    /// Returns `true` once every slot is filled.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.slots.iter().all(|slot| slot.is_some())
    }

    /// Returns the collected fragments, if complete.
    pub fn fragments(&self) -> Option<Vec<Vec<u8>>> {
        if !self.is_complete() {
            return None;
        }
        Some(
            self.slots
                .iter()
                .flatten()
                .map(|frag| frag.bytes.clone())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::test_timestamp;

    fn weekly_schedule() -> Schedule {
        Schedule {
            zone_idx: 1,
            days: (0..7)
                .map(|day_of_week| DaySchedule {
                    day_of_week,
                    switchpoints: vec![
                        Switchpoint {
                            time_of_day: 6 * 60 + 30,
                            heat_setpoint: 21.0,
                        },
                        Switchpoint {
                            time_of_day: 8 * 60,
                            heat_setpoint: 18.5,
                        },
                        Switchpoint {
                            time_of_day: 22 * 60,
                            heat_setpoint: 15.0,
                        },
                    ],
                })
                .collect(),
        }
    }

    #[test]
    fn test_blob_round_trip() {
        let schedule = weekly_schedule();
        let blob = blob_from_schedule(&schedule);

        assert_eq!(7 * 3 * 20, blob.len());
        assert_eq!(schedule, schedule_from_blob(&blob).unwrap());
    }

    #[test]
    fn test_fragment_round_trip() {
        let schedule = weekly_schedule();
        let fragments = fragments_from_schedule(&schedule).unwrap();

        assert!(fragments.len() > 1);
        assert!(fragments.iter().all(|frag| frag.len() <= MAX_FRAGMENT_LEN));
        assert_eq!(schedule, schedule_from_fragments(&fragments).unwrap());
    }

    #[test]
    fn test_blob_invalid() {
        assert!(schedule_from_blob(&[]).is_err());
        assert!(schedule_from_blob(&[0u8; 21]).is_err());

        let mut rec = [0u8; 20];
        rec[8] = 9; // day 9 does not exist
        assert!(schedule_from_blob(&rec).is_err());
    }

    #[test]
    fn test_assembly() {
        let dtm = test_timestamp();
        let mut assembly = FragmentAssembly::new();

        assert_eq!(Some(1), assembly.next_missing());
        assert_eq!(false, assembly.is_complete());

        assembly.add(dtm, 1, 2, vec![0x01]);
        assert_eq!(2, assembly.total());
        assert_eq!(Some(2), assembly.next_missing());

        assembly.add(dtm, 2, 2, vec![0x02]);
        assert_eq!(true, assembly.is_complete());
        assert_eq!(
            Some(vec![vec![0x01], vec![0x02]]),
            assembly.fragments()
        );
    }

    #[test]
    fn test_assembly_total_change() {
        let dtm = test_timestamp();
        let mut assembly = FragmentAssembly::new();

        assembly.add(dtm, 1, 2, vec![0x01]);

        // a changed total re-initialises the slot array
        assembly.add(dtm, 2, 3, vec![0x02]);
        assert_eq!(3, assembly.total());
        assert_eq!(Some(1), assembly.next_missing());
        assert_eq!(false, assembly.is_complete());
    }

    #[test]
    fn test_assembly_staleness() {
        let dtm = test_timestamp();
        let mut assembly = FragmentAssembly::new();

        assembly.add(dtm, 1, 2, vec![0x01]);

        // a fragment arriving much later evicts the stale one
        assembly.add(dtm + Duration::seconds(600), 2, 2, vec![0x02]);
        assert_eq!(false, assembly.is_complete());
        assert_eq!(Some(1), assembly.next_missing());
    }
}
