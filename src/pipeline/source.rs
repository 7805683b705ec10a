//! Scan source abstraction for observation stream ingestion.
//!
//! Provides a unified trait for reading scan records from different sources:
//! the obsdoc multicast stream, stdin (JSON), and replay files.

use std::net::Ipv4Addr;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::acquisition::{parse_obsdoc_bytes, ObsdocListener};
use crate::types::ScanRecord;

/// Events produced by a scan source.
#[derive(Debug)]
pub enum ScanEvent {
    /// A decoded scan record.
    Record(ScanRecord),
    /// Source reached end of data (EOF for files/stdin).
    Eof,
}

/// Trait abstracting where scan records come from.
///
/// Implementations handle decoding and pacing internally and skip documents
/// they cannot decode. The processing loop calls [`next_record`] in a
/// `select!` with cancellation.
///
/// [`next_record`]: ScanSource::next_record
#[async_trait]
pub trait ScanSource: Send + 'static {
    /// Read the next scan record.
    ///
    /// Returns `ScanEvent::Eof` when no more data is available.
    /// Returns `Err` on unrecoverable errors.
    async fn next_record(&mut self) -> Result<ScanEvent>;

    /// Human-readable name for logging (e.g. "obsdoc-multicast", "stdin").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Replay Source
// ============================================================================

/// Replays pre-loaded scan records with optional inter-record delay.
pub struct ReplaySource {
    records: std::vec::IntoIter<ScanRecord>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(records: Vec<ScanRecord>, delay_ms: u64) -> Self {
        Self {
            records: records.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }

    /// Load a JSON-lines file of scan records.
    ///
    /// Blank lines and lines starting with `#` are ignored; any other line
    /// that fails to parse is an error naming its line number.
    pub fn from_file(path: &Path, delay_ms: u64) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file {}", path.display()))?;

        let mut records = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record: ScanRecord = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid scan record", path.display(), idx + 1))?;
            records.push(record);
        }
        Ok(Self::new(records, delay_ms))
    }
}

#[async_trait]
impl ScanSource for ReplaySource {
    async fn next_record(&mut self) -> Result<ScanEvent> {
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.records.next() {
            Some(r) => {
                self.yielded_first = true;
                Ok(ScanEvent::Record(r))
            }
            None => Ok(ScanEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Stdin Source (JSON scan records, one per line)
// ============================================================================

/// Reads JSON-formatted scan records from stdin.
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(512),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanSource for StdinSource {
    async fn next_record(&mut self) -> Result<ScanEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(ScanEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ScanRecord>(line) {
                Ok(record) => return Ok(ScanEvent::Record(record)),
                Err(e) => {
                    tracing::warn!("[StdinSource] Failed to parse scan record: {}", e);
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// Multicast Source (obsdoc XML)
// ============================================================================

/// Reads observation documents from the control system's multicast stream.
///
/// Never reaches EOF; runs until cancelled.
pub struct MulticastSource {
    listener: ObsdocListener,
    decode_failures: u64,
}

impl MulticastSource {
    /// Join the multicast group and return a ready source.
    pub fn bind(group: &str, port: u16) -> Result<Self> {
        let group: Ipv4Addr = group
            .parse()
            .with_context(|| format!("Invalid multicast group address {:?}", group))?;
        let listener = ObsdocListener::bind(group, port)?;
        Ok(Self {
            listener,
            decode_failures: 0,
        })
    }

    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }
}

#[async_trait]
impl ScanSource for MulticastSource {
    async fn next_record(&mut self) -> Result<ScanEvent> {
        loop {
            let bytes = self.listener.recv_document().await?;
            let decoded = parse_obsdoc_bytes(bytes).and_then(|doc| {
                let record = doc.to_scan_record()?;
                tracing::info!(
                    "Read obsdoc for project {} scan {} subscan {}.",
                    record.project_id,
                    record.scan_number,
                    doc.subscan_no.map_or_else(|| "-".to_string(), |n| n.to_string())
                );
                Ok(record)
            });
            match decoded {
                Ok(record) => return Ok(ScanEvent::Record(record)),
                Err(e) => {
                    self.decode_failures += 1;
                    tracing::warn!("[MulticastSource] Dropping undecodable obsdoc: {}", e);
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "obsdoc-multicast"
    }
}
