//! Byte channels the journal persists into.
//!
//! The host hands over three independent channels: the accepted counter,
//! a human-readable log and the structured record journal. Each is only ever
//! read whole or rewritten whole.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use thiserror::Error;

pub const COUNTER_FILE: &str = "accepted.count";
pub const LOG_FILE: &str = "journal.log";
pub const JOURNAL_FILE: &str = "records.jsonl";

#[derive(Debug, Error)]
pub enum StorageError {
    /// Persisted data exists but cannot be understood.
    #[error("malformed persisted data at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("persistence I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("persistence encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait Channel: Send {
    fn read_all(&mut self) -> io::Result<Vec<u8>>;

    /// Truncate, then write `bytes` as the whole content.
    fn rewrite(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl Channel for File {
    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        self.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        self.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn rewrite(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.set_len(0)?;
        self.seek(SeekFrom::Start(0))?;
        self.write_all(bytes)?;
        self.sync_data()
    }
}

/// Shared in-memory channel. Clones see the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryChannel {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(bytes: &[u8]) -> Self {
        Self {
            buf: Arc::new(Mutex::new(bytes.to_vec())),
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().map(|buf| buf.clone()).unwrap_or_default()
    }
}

impl Channel for MemoryChannel {
    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        self.buf
            .lock()
            .map(|buf| buf.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory channel lock poisoned"))
    }

    fn rewrite(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut buf = self
            .buf
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory channel lock poisoned"))?;
        buf.clear();
        buf.extend_from_slice(bytes);
        Ok(())
    }
}

pub struct Persistence {
    pub counter: Box<dyn Channel>,
    pub log: Box<dyn Channel>,
    pub journal: Box<dyn Channel>,
}

impl Persistence {
    pub fn new(
        counter: impl Channel + 'static,
        log: impl Channel + 'static,
        journal: impl Channel + 'static,
    ) -> Self {
        Self {
            counter: Box::new(counter),
            log: Box::new(log),
            journal: Box::new(journal),
        }
    }

    /// Open (creating if needed) the three files under `dir`. Existing content
    /// is kept until the first flush.
    pub fn open_dir(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let open = |name: &str| {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(dir.join(name))
        };
        Ok(Self::new(
            open(COUNTER_FILE)?,
            open(LOG_FILE)?,
            open(JOURNAL_FILE)?,
        ))
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryChannel::new(), MemoryChannel::new(), MemoryChannel::new())
    }

    /// Counter channel content. `None` when the channel is empty.
    pub fn read_counter(&mut self) -> Result<Option<u64>, StorageError> {
        let bytes = self.counter.read_all()?;
        let text = String::from_utf8_lossy(&bytes);
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        text.parse::<u64>()
            .map(Some)
            .map_err(|err| StorageError::Parse {
                line: 1,
                message: format!("counter {text:?}: {err}"),
            })
    }

    pub fn write_counter(&mut self, total: u64) -> Result<(), StorageError> {
        self.counter.rewrite(total.to_string().as_bytes())?;
        Ok(())
    }
}
