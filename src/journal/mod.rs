//! Bounded, insertion-ordered journal of log lines and classification decisions.
//!
//! The in-memory window holds at most `capacity` entries. The accepted total
//! is tracked beside the window so evicting old records never lowers it.
//!
//! On disk the journal is JSON lines: a header carrying the accepted total,
//! then one entry per line, oldest first.

mod entry;
pub mod storage;

pub use entry::{EntryKind, JournalEntry};
pub use storage::{Channel, MemoryChannel, Persistence, StorageError};

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::detector::CheckOutcome;

pub const MAX_RECORD_COUNT: usize = 500;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Header {
    accepted_total: u64,
    version: u32,
}

/// What `load_and_reconcile` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub loaded: usize,
    pub accepted_total: u64,
    /// Accepted total the persisted journal implies, if it held any evidence.
    pub on_disk_total: Option<u64>,
}

#[derive(Debug)]
pub struct RecordJournal {
    entries: VecDeque<JournalEntry>,
    capacity: usize,
    accepted_total: u64,
    /// Index of the first decision appended during this run. Once set,
    /// eviction removes entries from here instead of from the front.
    first_decision: Option<usize>,
    /// Entries at the front that were loaded from disk. They are evicted
    /// before anything written during this run.
    restored: usize,
}

impl RecordJournal {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            accepted_total: 0,
            first_decision: None,
            restored: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn accepted_total(&self) -> u64 {
        self.accepted_total
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    pub fn log(&mut self, text: impl Into<String>) {
        self.append(JournalEntry::log(text));
    }

    /// Rendered summary of one attempt; does not touch the accepted total.
    pub fn log_decision(&mut self, outcome: &CheckOutcome) {
        self.append(JournalEntry::decision(outcome, self.accepted_total));
    }

    /// Count an acceptance and keep it as a record. Returns the new total.
    pub fn record(&mut self, outcome: &CheckOutcome) -> u64 {
        self.accepted_total += 1;
        self.append(JournalEntry::record(outcome, self.accepted_total));
        self.accepted_total
    }

    pub fn append(&mut self, entry: JournalEntry) {
        if entry.is_decision() && self.first_decision.is_none() {
            self.first_decision = Some(self.entries.len());
        }
        self.entries.push_back(entry);
        if self.entries.len() > self.capacity {
            self.evict_one();
        }
    }

    /// Drop exactly one entry.
    ///
    /// Restored entries go first. After that, once a decision has been
    /// appended this run, the oldest entry from the marker on is removed,
    /// unless that would be the entry just appended.
    fn evict_one(&mut self) {
        if self.restored > 0 {
            self.pop_front();
            return;
        }
        match self.first_decision {
            Some(idx) if idx + 1 < self.entries.len() => {
                self.entries.remove(idx);
            }
            _ => self.pop_front(),
        }
    }

    fn pop_front(&mut self) {
        if self.entries.pop_front().is_some() {
            self.restored = self.restored.saturating_sub(1);
            self.first_decision = self.first_decision.map(|idx| idx.saturating_sub(1));
        }
    }

    /// Raise the accepted total to at least `total`.
    pub fn adopt_total(&mut self, total: u64) {
        self.accepted_total = self.accepted_total.max(total);
    }

    /// Serialize the window for the journal channel.
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        let mut out = serde_json::to_vec(&Header {
            accepted_total: self.accepted_total,
            version: FORMAT_VERSION,
        })?;
        out.push(b'\n');
        for entry in &self.entries {
            serde_json::to_writer(&mut out, entry)?;
            out.push(b'\n');
        }
        Ok(out)
    }

    /// Human-readable rendering of the window for the log channel.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.render());
            out.push('\n');
        }
        out
    }

    /// Load a persisted journal in front of the current window and settle the
    /// accepted total.
    ///
    /// The persisted total is the larger of the header value and the number of
    /// persisted records. When it disagrees with `count_hint` it wins and the
    /// mismatch is logged. An empty channel carries no evidence, so the hint
    /// is kept. On a parse failure nothing is changed.
    pub fn load_and_reconcile(
        &mut self,
        bytes: &[u8],
        count_hint: u64,
    ) -> Result<Reconciled, StorageError> {
        let text = std::str::from_utf8(bytes).map_err(|err| StorageError::Parse {
            line: 0,
            message: err.to_string(),
        })?;

        let mut header: Option<Header> = None;
        let mut loaded = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if header.is_none() && loaded.is_empty() {
                if let Ok(h) = serde_json::from_str::<Header>(line) {
                    header = Some(h);
                    continue;
                }
            }
            let entry: JournalEntry =
                serde_json::from_str(line).map_err(|err| StorageError::Parse {
                    line: idx + 1,
                    message: err.to_string(),
                })?;
            loaded.push(entry);
        }

        let records = loaded
            .iter()
            .filter(|entry| entry.kind == EntryKind::Record)
            .count() as u64;
        let on_disk_total = match header {
            Some(h) => Some(h.accepted_total.max(records)),
            None if loaded.is_empty() => None,
            None => Some(records),
        };

        let loaded_count = loaded.len();
        let mut window: VecDeque<JournalEntry> = loaded.into();
        window.extend(self.entries.drain(..));
        self.entries = window;
        self.first_decision = self.first_decision.map(|idx| idx + loaded_count);
        self.restored += loaded_count;
        while self.entries.len() > self.capacity {
            self.pop_front();
        }

        let total = match on_disk_total {
            Some(on_disk) => {
                if on_disk != count_hint {
                    self.log(format!(
                        "accepted count mismatch: counter says {count_hint}, journal says {on_disk}; using {on_disk}"
                    ));
                }
                on_disk
            }
            None => count_hint,
        };
        self.accepted_total = total;

        Ok(Reconciled {
            loaded: loaded_count,
            accepted_total: total,
            on_disk_total,
        })
    }

    /// Rewrite all three channels from the current window.
    ///
    /// Every channel is attempted; the first failure is returned.
    pub fn flush(&self, persistence: &mut Persistence) -> Result<(), StorageError> {
        let journal = self
            .encode()
            .and_then(|bytes| persistence.journal.rewrite(&bytes).map_err(StorageError::from));
        let log = persistence
            .log
            .rewrite(self.render().as_bytes())
            .map_err(StorageError::from);
        let counter = persistence.write_counter(self.accepted_total);
        journal.and(log).and(counter)
    }
}

impl Default for RecordJournal {
    fn default() -> Self {
        Self::new(MAX_RECORD_COUNT)
    }
}
