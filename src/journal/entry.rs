use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::detector::CheckOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Free-form line.
    Log,
    /// Rendered classification attempt, counted or not.
    Decision,
    /// Counted acceptance; these make up the accepted total.
    Record,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts_ms: i64,
    pub kind: EntryKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CheckOutcome>,
}

impl JournalEntry {
    pub fn log(text: impl Into<String>) -> Self {
        Self {
            ts_ms: now_ms(),
            kind: EntryKind::Log,
            text: text.into(),
            outcome: None,
        }
    }

    pub fn decision(outcome: &CheckOutcome, accepted_total: u64) -> Self {
        Self {
            ts_ms: now_ms(),
            kind: EntryKind::Decision,
            text: format!("{outcome} count={accepted_total}"),
            outcome: None,
        }
    }

    /// `ordinal` is the accepted total including this record.
    pub fn record(outcome: &CheckOutcome, ordinal: u64) -> Self {
        Self {
            ts_ms: now_ms(),
            kind: EntryKind::Record,
            text: format!("#{ordinal} {outcome}"),
            outcome: Some(outcome.clone()),
        }
    }

    pub fn is_decision(&self) -> bool {
        self.kind != EntryKind::Log
    }

    /// Human-readable line with a local timestamp.
    pub fn render(&self) -> String {
        match DateTime::<Utc>::from_timestamp_millis(self.ts_ms) {
            Some(ts) => {
                let local = ts.with_timezone(&Local);
                format!("[{}] {}", local.format("%Y-%m-%d %H:%M:%S%.3f"), self.text)
            }
            None => format!("[?] {}", self.text),
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
