//! Project State Table
//!
//! Last-seen scan per project. Owned by the processing loop and passed by
//! reference to the classifier (read) and the mutator (write); nothing else
//! touches it, so it carries no lock.

use std::collections::HashMap;

use crate::types::{ProjectState, ScanRecord};

/// What [`ProjectStateTable::apply`] did to a project's entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// No entry existed; one was created
    Opened,
    /// The existing entry was replaced
    Updated,
    /// A FINISH scan removed the entry
    Closed,
    /// A FINISH scan arrived for a project with no entry
    AlreadyClosed,
}

/// Mapping from project id to that project's open session.
///
/// Invariant: at most one entry per project id; absence means no open session.
#[derive(Debug, Default)]
pub struct ProjectStateTable {
    entries: HashMap<String, ProjectState>,
}

impl ProjectStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, project_id: &str) -> Option<&ProjectState> {
        self.entries.get(project_id)
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.entries.contains_key(project_id)
    }

    /// Number of projects with an open session.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Project ids with an open session, sorted.
    pub fn open_projects(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// State mutator: record `record` as the project's latest scan.
    ///
    /// A FINISH scan deletes the entry; any other scan inserts or overwrites
    /// it with a snapshot taken under `event_id`. Runs for every record,
    /// including ones the filters skipped.
    pub fn apply(&mut self, record: &ScanRecord, event_id: u64) -> StateChange {
        if record.is_finish() {
            return match self.entries.remove(&record.project_id) {
                Some(_) => StateChange::Closed,
                None => StateChange::AlreadyClosed,
            };
        }

        let state = ProjectState::from_record(record, event_id);
        match self.entries.insert(record.project_id.clone(), state) {
            Some(_) => StateChange::Updated,
            None => StateChange::Opened,
        }
    }
}
