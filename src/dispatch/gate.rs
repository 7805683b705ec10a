//! Dispatch Gate
//!
//! Hands a [`DispatchEvent`] to the external consumer through a single-slot
//! command file. The consumer deletes the file after reading it; the gate
//! waits for that before writing the next command, so at most one command
//! is ever outstanding. The wait stalls the whole pipeline (backpressure).

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DispatchConfig, QueueFormat};
use crate::types::DispatchEvent;

/// Dispatch failures. Each is fatal for the event it was raised for only.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("queue slot {} still occupied after {waited:?}", .path.display())]
    QueueBusy { path: PathBuf, waited: Duration },

    #[error("failed to write command to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode command: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cancelled while waiting for queue slot")]
    Cancelled,
}

/// Result of a successful handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReceipt {
    /// Size of the command file
    pub bytes_written: usize,
    /// Number of times the slot was found occupied
    pub busy_polls: u32,
    /// Time spent waiting for the slot
    pub waited: Duration,
}

/// Writes commands into the single-slot queue file.
#[derive(Debug, Clone)]
pub struct DispatchGate {
    queue_path: PathBuf,
    poll_interval: Duration,
    wait_timeout: Option<Duration>,
    format: QueueFormat,
}

impl DispatchGate {
    pub fn new(queue_path: impl Into<PathBuf>) -> Self {
        let defaults = DispatchConfig::default();
        Self {
            queue_path: queue_path.into(),
            poll_interval: defaults.poll_interval(),
            wait_timeout: defaults.wait_timeout(),
            format: defaults.format,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            queue_path: config.queue_path.clone(),
            poll_interval: config.poll_interval(),
            wait_timeout: config.wait_timeout(),
            format: config.format,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// `None` waits for the slot indefinitely.
    pub fn with_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn with_format(mut self, format: QueueFormat) -> Self {
        self.format = format;
        self
    }

    pub fn queue_path(&self) -> &Path {
        &self.queue_path
    }

    /// Wait for the slot to clear, then write `event` as one whole file.
    pub async fn dispatch(
        &self,
        event: &DispatchEvent,
        cancel: &CancellationToken,
    ) -> Result<DispatchReceipt, DispatchError> {
        let bytes = self.render(event)?;
        let (busy_polls, waited) = self.wait_for_slot(cancel).await?;

        info!(
            "Dispatching {} command for obs serial# {} ({})",
            event.notice_type, event.event_id, event.project_id
        );
        self.write_atomic(&bytes).await?;
        info!("Done, wrote {} bytes.", bytes.len());

        Ok(DispatchReceipt {
            bytes_written: bytes.len(),
            busy_polls,
            waited,
        })
    }

    /// Encode `event` in the configured queue format.
    pub fn render(&self, event: &DispatchEvent) -> Result<Vec<u8>, DispatchError> {
        match self.format {
            QueueFormat::Json => Ok(serde_json::to_vec(event)?),
            QueueFormat::Legacy => Ok(event.to_legacy_line().into_bytes()),
        }
    }

    /// Block until the queue file is absent.
    ///
    /// Returns how many polls found it present and how long that took.
    async fn wait_for_slot(&self, cancel: &CancellationToken) -> Result<(u32, Duration), DispatchError> {
        let started = Instant::now();
        let mut busy_polls = 0u32;

        while self.slot_occupied().await? {
            if busy_polls == 0 {
                info!(path = %self.queue_path.display(), "Waiting for cmd queue to clear...");
            }
            busy_polls += 1;

            let waited = started.elapsed();
            if let Some(limit) = self.wait_timeout {
                if waited >= limit {
                    warn!(
                        path = %self.queue_path.display(),
                        waited_secs = waited.as_secs_f64(),
                        "Queue consumer did not clear the slot in time"
                    );
                    return Err(DispatchError::QueueBusy {
                        path: self.queue_path.clone(),
                        waited,
                    });
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        let waited = started.elapsed();
        if busy_polls > 0 {
            debug!(polls = busy_polls, waited_ms = waited.as_millis() as u64, "Queue slot cleared");
        }
        Ok((busy_polls, waited))
    }

    async fn slot_occupied(&self) -> Result<bool, DispatchError> {
        tokio::fs::try_exists(&self.queue_path)
            .await
            .map_err(|source| DispatchError::Write {
                path: self.queue_path.clone(),
                source,
            })
    }

    /// Write to a sibling temp file, then rename over the queue path so the
    /// consumer never sees a partial command.
    async fn write_atomic(&self, bytes: &[u8]) -> Result<(), DispatchError> {
        let tmp = self.temp_path();
        if let Err(source) = tokio::fs::write(&tmp, bytes).await {
            return Err(DispatchError::Write { path: tmp, source });
        }
        if let Err(source) = tokio::fs::rename(&tmp, &self.queue_path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(DispatchError::Write {
                path: self.queue_path.clone(),
                source,
            });
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .queue_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "queue".to_string());
        self.queue_path.with_file_name(format!(".{}.tmp", name))
    }
}
