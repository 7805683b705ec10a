//! Transition Classifier
//!
//! Decides, for one scan record and the project's open session (if any),
//! whether a trigger is raised and with what fields.
//!
//! ## Rule Table
//!
//! Rules are tried in order; the first match wins.
//!
//! ```text
//! #  session       condition                                 result
//! 1  NoSession     scan_number == 1                          READY   (record time, fresh id)
//! 2  NoSession     source == FINISH                          DONE    (record time, fresh id)
//! 3  OpenSession   intent filter ⊆ session intent            SESSION (session time/pos/id,
//!                                                                      duration = t - t0 - 30 s)
//! 4  OpenSession   source == FINISH                          DONE    (record time, fresh id)
//! -  any           otherwise                                 no event
//! ```
//!
//! Rule 3 is checked before rule 4, so a FINISH scan closing a session whose
//! intent still matches produces a SESSION event, not DONE. A negative rule-3
//! duration suppresses the event instead of falling through.
//!
//! The project filter is applied before the table; a mismatch skips the
//! record entirely.

use crate::config::defaults::SESSION_LATENCY_SECS;
use crate::config::FilterConfig;
use crate::types::{DispatchEvent, NoticeType, ProjectState, ScanRecord, UNSET};

/// Whether the project has an open session when a record arrives.
#[derive(Debug, Clone, Copy)]
pub enum SessionState<'a> {
    NoSession,
    OpenSession(&'a ProjectState),
}

impl<'a> From<Option<&'a ProjectState>> for SessionState<'a> {
    fn from(prior: Option<&'a ProjectState>) -> Self {
        match prior {
            Some(state) => SessionState::OpenSession(state),
            None => SessionState::NoSession,
        }
    }
}

/// A row of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    FirstScan,
    FinishWithoutSession,
    MatchingSession,
    FinishAfterMismatch,
}

/// Rules in precedence order.
pub const RULES: [Rule; 4] = [
    Rule::FirstScan,
    Rule::FinishWithoutSession,
    Rule::MatchingSession,
    Rule::FinishAfterMismatch,
];

impl Rule {
    /// Whether this rule applies. Earlier rules are assumed not to have matched.
    fn matches(self, record: &ScanRecord, session: SessionState<'_>, filters: &FilterConfig) -> bool {
        match (self, session) {
            (Rule::FirstScan, SessionState::NoSession) => record.scan_number == 1,
            (Rule::FinishWithoutSession, SessionState::NoSession) => record.is_finish(),
            (Rule::MatchingSession, SessionState::OpenSession(prior)) => {
                prior.intent.contains(filters.intent.as_str())
            }
            (Rule::FinishAfterMismatch, SessionState::OpenSession(_)) => record.is_finish(),
            _ => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Rule::FirstScan => "first-scan",
            Rule::FinishWithoutSession => "finish-without-session",
            Rule::MatchingSession => "matching-session",
            Rule::FinishAfterMismatch => "finish-after-mismatch",
        }
    }
}

/// Why a record produced no event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// Project id does not contain the project filter
    ProjectFilter,
    /// Rule 3 matched but the session has not elapsed yet
    NegativeDuration { duration_seconds: f64 },
    /// No rule matched
    NoMatchingRule,
}

/// Outcome of classifying one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Event { rule: Rule, event: DispatchEvent },
    Skip(SkipReason),
}

impl Classification {
    pub fn event(&self) -> Option<&DispatchEvent> {
        match self {
            Classification::Event { event, .. } => Some(event),
            Classification::Skip(_) => None,
        }
    }
}

/// Applies the project filter and the rule table.
#[derive(Debug, Clone, Default)]
pub struct TransitionClassifier {
    filters: FilterConfig,
}

impl TransitionClassifier {
    pub fn new(filters: FilterConfig) -> Self {
        Self { filters }
    }

    pub fn filters(&self) -> &FilterConfig {
        &self.filters
    }

    /// Whether the record's project passes the project filter.
    pub fn project_matches(&self, record: &ScanRecord) -> bool {
        self.filters.project.is_empty() || record.project_id.contains(self.filters.project.as_str())
    }

    /// Classify `record` against the project's prior state.
    ///
    /// `event_id` is the id minted for this record; it is used by the rules
    /// that mint a fresh id (READY, DONE).
    pub fn classify(
        &self,
        record: &ScanRecord,
        prior: Option<&ProjectState>,
        event_id: u64,
    ) -> Classification {
        if !self.project_matches(record) {
            return Classification::Skip(SkipReason::ProjectFilter);
        }

        let session = SessionState::from(prior);
        let Some(rule) = RULES
            .iter()
            .copied()
            .find(|rule| rule.matches(record, session, &self.filters))
        else {
            return Classification::Skip(SkipReason::NoMatchingRule);
        };

        tracing::debug!(
            project = %record.project_id,
            scan = record.scan_number,
            rule = rule.name(),
            "Classifier rule matched"
        );

        match (rule, session) {
            (Rule::FirstScan, _) => Classification::Event {
                rule,
                event: fresh_event(NoticeType::Ready, record, event_id),
            },
            (Rule::FinishWithoutSession | Rule::FinishAfterMismatch, _) => Classification::Event {
                rule,
                event: fresh_event(NoticeType::Done, record, event_id),
            },
            (Rule::MatchingSession, SessionState::OpenSession(prior)) => {
                let duration_seconds = record.absolute_time() - prior.unix_time - SESSION_LATENCY_SECS;
                if duration_seconds < 0.0 {
                    return Classification::Skip(SkipReason::NegativeDuration { duration_seconds });
                }
                Classification::Event {
                    rule,
                    event: DispatchEvent {
                        notice_type: NoticeType::Session,
                        event_id: prior.event_id,
                        project_id: record.project_id.clone(),
                        scan_number: record.scan_number,
                        intent: prior.intent.clone(),
                        event_time: prior.unix_time,
                        source: prior.source_name.clone(),
                        ra_deg: prior.ra_deg,
                        dec_deg: prior.dec_deg,
                        duration_seconds,
                    },
                }
            }
            // MatchingSession only matches an open session.
            (Rule::MatchingSession, SessionState::NoSession) => {
                Classification::Skip(SkipReason::NoMatchingRule)
            }
        }
    }
}

/// Event timed at the record itself, without position or duration.
fn fresh_event(notice_type: NoticeType, record: &ScanRecord, event_id: u64) -> DispatchEvent {
    DispatchEvent {
        notice_type,
        event_id,
        project_id: record.project_id.clone(),
        scan_number: record.scan_number,
        intent: record.scan_intent.clone(),
        event_time: record.absolute_time(),
        source: record.source_name.clone(),
        ra_deg: UNSET,
        dec_deg: UNSET,
        duration_seconds: UNSET,
    }
}
