//! Scan processing loop shared across all input modes.
//!
//! Each record is carried all the way through classify -> dispatch -> mutate
//! before the next one is read. The dispatch gate's wait for the queue slot
//! therefore holds back ingestion.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::classifier::{Classification, SkipReason, TransitionClassifier};
use super::event_id::EventIdGenerator;
use super::source::{ScanEvent, ScanSource};
use super::state::{ProjectStateTable, StateChange};
use crate::dispatch::{DispatchError, DispatchGate, DispatchReceipt};
use crate::types::{DispatchEvent, NoticeType, ScanRecord};

// ============================================================================
// Statistics
// ============================================================================

/// Pipeline statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub records_processed: u64,
    pub ready_events: u64,
    pub session_events: u64,
    pub done_events: u64,
    pub dispatched: u64,
    pub dispatch_failures: u64,
    pub project_skips: u64,
    pub intent_skips: u64,
    pub negative_durations: u64,
    pub open_sessions: usize,
}

impl PipelineStats {
    pub fn events_classified(&self) -> u64 {
        self.ready_events + self.session_events + self.done_events
    }
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline: {} records, {} events ({} READY, {} SESSION, {} DONE), {} dispatched, {} failed",
            self.records_processed,
            self.events_classified(),
            self.ready_events,
            self.session_events,
            self.done_events,
            self.dispatched,
            self.dispatch_failures
        )
    }
}

// ============================================================================
// Per-record outcome
// ============================================================================

/// What happened to the event classified from a record.
#[derive(Debug)]
pub enum Delivery {
    /// The record produced no event
    NoEvent,
    /// Dispatch mode is off; the event was only logged
    Listening,
    /// The command was written to the queue
    Delivered(DispatchReceipt),
    /// The handoff failed for this event
    Failed(DispatchError),
}

/// Result of carrying one record through the pipeline.
#[derive(Debug)]
pub struct RecordOutcome {
    pub classification: Classification,
    pub delivery: Delivery,
    pub state_change: StateChange,
}

impl RecordOutcome {
    pub fn event(&self) -> Option<&DispatchEvent> {
        self.classification.event()
    }
}

// ============================================================================
// Processing Loop
// ============================================================================

/// Owns all state needed for the scan processing loop.
///
/// Built with [`new()`](ProcessingLoop::new), optionally given a dispatch
/// gate with [`with_dispatch()`](ProcessingLoop::with_dispatch), then driven
/// by [`run()`](ProcessingLoop::run) or record by record with
/// [`process_record()`](ProcessingLoop::process_record).
pub struct ProcessingLoop {
    classifier: TransitionClassifier,
    table: ProjectStateTable,
    ids: EventIdGenerator,
    /// `None` in listening mode
    gate: Option<DispatchGate>,
    cancel_token: CancellationToken,
    stats: PipelineStats,
}

impl ProcessingLoop {
    pub fn new(classifier: TransitionClassifier, cancel_token: CancellationToken) -> Self {
        Self {
            classifier,
            table: ProjectStateTable::new(),
            ids: EventIdGenerator::new(),
            gate: None,
            cancel_token,
            stats: PipelineStats::default(),
        }
    }

    /// Enable dispatch mode: classified events are written through `gate`.
    pub fn with_dispatch(mut self, gate: DispatchGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn state_table(&self) -> &ProjectStateTable {
        &self.table
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn dispatch_enabled(&self) -> bool {
        self.gate.is_some()
    }

    /// Run until the source is exhausted or cancellation.
    ///
    /// Returns final pipeline statistics, or the source's error if it failed.
    /// Statistics are logged either way.
    pub async fn run<S: ScanSource>(mut self, source: &mut S) -> Result<PipelineStats> {
        info!("📡 Processing scan records from {}...", source.source_name());

        let result = loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    info!("[ScanProcessor] Shutdown signal received");
                    break Ok(());
                }
                result = source.next_record() => {
                    match result {
                        Ok(ev) => ev,
                        Err(e) => {
                            error!("[ScanProcessor] Source error: {:#}", e);
                            break Err(e.context(format!("{} source failed", source.source_name())));
                        }
                    }
                }
            };

            let record = match event {
                ScanEvent::Record(r) => r,
                ScanEvent::Eof => {
                    info!(
                        "[ScanProcessor] Source reached end ({} records processed)",
                        self.stats.records_processed
                    );
                    break Ok(());
                }
            };

            self.process_record(&record).await;
        };

        log_final_stats(&self.stats);
        result.map(|()| self.stats)
    }

    /// Classify one record, dispatch its event if any, then update the
    /// project's state.
    pub async fn process_record(&mut self, record: &ScanRecord) -> RecordOutcome {
        self.stats.records_processed += 1;

        // One id per record, shared by its event and its stored state.
        let event_id = self.ids.mint();
        let classification = self
            .classifier
            .classify(record, self.table.get(&record.project_id), event_id);

        let delivery = match &classification {
            Classification::Event { event, .. } => {
                self.count_event(event.notice_type);
                log_event(event);
                self.deliver(event).await
            }
            Classification::Skip(reason) => {
                self.log_skip(record, *reason);
                Delivery::NoEvent
            }
        };

        let state_change = self.table.apply(record, event_id);
        self.stats.open_sessions = self.table.len();
        log_state_change(record, state_change);

        RecordOutcome {
            classification,
            delivery,
            state_change,
        }
    }

    async fn deliver(&mut self, event: &DispatchEvent) -> Delivery {
        let Some(gate) = &self.gate else {
            info!(
                "Listening mode: would dispatch {} for {} (serial# {})",
                event.notice_type, event.project_id, event.event_id
            );
            return Delivery::Listening;
        };

        match gate.dispatch(event, &self.cancel_token).await {
            Ok(receipt) => {
                self.stats.dispatched += 1;
                Delivery::Delivered(receipt)
            }
            Err(DispatchError::Cancelled) => {
                warn!(
                    "Shutdown while waiting for queue; {} for {} not dispatched",
                    event.notice_type, event.project_id
                );
                Delivery::Failed(DispatchError::Cancelled)
            }
            Err(e) => {
                self.stats.dispatch_failures += 1;
                error!(
                    project = %event.project_id,
                    event_id = event.event_id,
                    "Failed to dispatch {} command: {}",
                    event.notice_type,
                    e
                );
                Delivery::Failed(e)
            }
        }
    }

    fn count_event(&mut self, notice_type: NoticeType) {
        match notice_type {
            NoticeType::Ready => self.stats.ready_events += 1,
            NoticeType::Session => self.stats.session_events += 1,
            NoticeType::Done => self.stats.done_events += 1,
        }
    }

    fn log_skip(&mut self, record: &ScanRecord, reason: SkipReason) {
        match reason {
            SkipReason::ProjectFilter => {
                self.stats.project_skips += 1;
                info!(
                    "*** Skipping scan no project match: {} ({}, {}).",
                    record.scan_number, record.scan_intent, record.project_id
                );
            }
            SkipReason::NegativeDuration { duration_seconds } => {
                self.stats.negative_durations += 1;
                info!(
                    project = %record.project_id,
                    scan = record.scan_number,
                    "Duration: {:.3} s, session not yet elapsed",
                    duration_seconds
                );
            }
            SkipReason::NoMatchingRule => {
                self.stats.intent_skips += 1;
                info!(
                    "*** Skipping scan no intent match: {} ({}, {})!",
                    record.scan_number, record.scan_intent, record.project_id
                );
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn log_event(event: &DispatchEvent) {
    match event.notice_type {
        NoticeType::Ready => info!(
            "*** First scan {} ({}, {}).",
            event.scan_number, event.intent, event.project_id
        ),
        NoticeType::Session => info!(
            "Will dispatch {} for position {:.6} {:.6} (duration {:.1} s)",
            event.project_id, event.ra_deg, event.dec_deg, event.duration_seconds
        ),
        NoticeType::Done => info!(
            "*** Project {} has finished (source={})",
            event.project_id, event.source
        ),
    }
}

fn log_state_change(record: &ScanRecord, change: StateChange) {
    match change {
        StateChange::Closed | StateChange::AlreadyClosed => info!(
            "*** Project {} finish scan (source={})",
            record.project_id, record.source_name
        ),
        StateChange::Opened | StateChange::Updated => {
            debug!(
                project = %record.project_id,
                scan = record.scan_number,
                intent = %record.scan_intent,
                "Scan stored as project's latest"
            );
            debug!(
                "*** Position of source {} is ({} , {}) and start time (unixtime {:.3}).",
                record.source_name,
                record.ra_str(),
                record.dec_str(),
                record.absolute_time()
            );
        }
    }
}

fn log_final_stats(stats: &PipelineStats) {
    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("📊 FINAL STATISTICS");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Records Processed:    {}", stats.records_processed);
    info!("   READY Events:         {}", stats.ready_events);
    info!("   SESSION Events:       {}", stats.session_events);
    info!("   DONE Events:          {}", stats.done_events);
    info!("   Dispatched:           {}", stats.dispatched);
    info!("   Dispatch Failures:    {}", stats.dispatch_failures);
    info!("   Project Skips:        {}", stats.project_skips);
    info!("   Intent Skips:         {}", stats.intent_skips);
    info!("   Negative Durations:   {}", stats.negative_durations);
    info!("   Open Sessions:        {}", stats.open_sessions);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
