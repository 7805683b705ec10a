//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Time
// ============================================================================

/// Offset in days between the Julian Day and the Modified Julian Day.
pub const MJD_OFFSET_DAYS: f64 = 2_400_000.5;

/// Julian Day of the Unix epoch (1970-01-01T00:00:00Z).
pub const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Seconds in one day.
pub const SECS_IN_DAY: f64 = 86_400.0;

// ============================================================================
// Classifier
// ============================================================================

/// Expected latency between a scan being scheduled and it executing (seconds).
///
/// Subtracted from every SESSION duration.
pub const SESSION_LATENCY_SECS: f64 = 30.0;

// ============================================================================
// Dispatch
// ============================================================================

/// Default path of the single-slot command queue file.
pub const DEFAULT_QUEUE_PATH: &str = "incoming.cmd";

/// Interval between checks for the queue slot to clear (milliseconds).
pub const QUEUE_POLL_INTERVAL_MS: u64 = 1_000;

/// Longest wait for the queue slot before giving up on an event (seconds).
///
/// `0` waits forever.
pub const QUEUE_WAIT_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// Listener
// ============================================================================

/// Multicast group the observation documents are broadcast on.
pub const OBSDOC_MULTICAST_GROUP: &str = "239.192.3.2";

/// UDP port of the observation document stream.
pub const OBSDOC_MULTICAST_PORT: u16 = 53_001;

/// Receive buffer for one observation document datagram (bytes).
pub const OBSDOC_MAX_DATAGRAM_BYTES: usize = 100_000;

// ============================================================================
// Replay
// ============================================================================

/// Default delay between replayed scan records (milliseconds).
pub const REPLAY_DELAY_MS: u64 = 0;
