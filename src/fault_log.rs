//! The fault-log paging protocol (code `0418`).
//!
//! The controller holds up to 64 fault records, fetched one `log_idx` at a
//! time. A null-record reply means the log is exhausted; entries received
//! unsolicited (the controller broadcasts new faults) are absorbed too.

use std::collections::BTreeMap;

use crate::parsers::FaultLogRec;

/// The reconstructed fault log of a system.
#[derive(Clone, Debug, Default)]
pub struct FaultLog {
    entries: BTreeMap<u8, FaultLogRec>,
    complete: bool,
}

impl FaultLog {
    /// Constructs an empty `FaultLog`.
    pub fn new() -> FaultLog {
        FaultLog::default()
    }

    /// Discards all entries and the completion flag.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.complete = false;
    }

    /// Stores one entry, keyed by its position in the log.
    pub fn add_entry(&mut self, entry: FaultLogRec) {
        self.entries.insert(entry.log_idx, entry);
    }

    /// Marks the log as retrieved in full (the null record was seen).
    pub fn set_complete(&mut self) {
        self.complete = true;
    }

    /// Returns `true` once the log has been retrieved in full.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The retrieved entries, ordered by log index.
    pub fn entries(&self) -> &BTreeMap<u8, FaultLogRec> {
        &self.entries
    }

    /// The highest retrieved log index, if any.
    pub fn last_idx(&self) -> Option<u8> {
        self.entries.keys().next_back().copied()
    }
}
