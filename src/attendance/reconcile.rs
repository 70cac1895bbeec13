use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::draft::Draft;
use super::status::{ConfirmedRecord, Persistence, StudentId};

/// How an empty confirmed snapshot ("nothing saved for this date") is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptySnapshotPolicy {
    /// Every entry goes back to the default status, blank remarks, virtual.
    /// Edits made while the fetch was in flight are lost.
    #[default]
    ResetAll,
    /// Only entries the operator has not touched since the last merge are reset.
    KeepTouched,
}

impl EmptySnapshotPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "resetAll" => Some(Self::ResetAll),
            "keepTouched" => Some(Self::KeepTouched),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Roster entries overwritten from a confirmed record.
    pub applied: usize,
    /// Roster entries with no confirmed record, excluding local edits kept
    /// over an empty snapshot.
    pub defaulted: usize,
    /// Confirmed records for students not on the roster.
    pub dropped_outside_roster: usize,
    /// Students whose unsynced local edit was replaced by confirmed state.
    pub overwritten_local_edits: Vec<StudentId>,
    /// An empty snapshot put every entry back to the default.
    pub reset_all: bool,
    /// Students whose confirmed record differs from what this session last submitted.
    pub conflicts: Vec<StudentId>,
}

/// Merges `snapshot` into `draft`. Confirmed state always wins; the roster key-set
/// never changes.
pub fn reconcile(
    draft: &mut Draft,
    snapshot: &[ConfirmedRecord],
    policy: EmptySnapshotPolicy,
) -> ReconcileReport {
    let report = if snapshot.is_empty() {
        reconcile_empty(draft, policy)
    } else {
        reconcile_records(draft, snapshot)
    };
    if !report.overwritten_local_edits.is_empty() {
        warn!(
            batch_id = %draft.key().batch_id,
            date = %draft.key().date,
            count = report.overwritten_local_edits.len(),
            "confirmed state replaced local edits"
        );
    }
    debug!(
        batch_id = %draft.key().batch_id,
        date = %draft.key().date,
        applied = report.applied,
        defaulted = report.defaulted,
        dropped = report.dropped_outside_roster,
        reset_all = report.reset_all,
        "reconciled draft"
    );
    draft.finish_reconcile();
    report
}

fn reconcile_empty(draft: &mut Draft, policy: EmptySnapshotPolicy) -> ReconcileReport {
    let default_status = draft.default_status();
    let touched = draft.touched().clone();
    let mut report = ReconcileReport::default();
    let mut kept = 0;
    for entry in draft.entries_mut() {
        let is_touched = touched.contains(&entry.student_id);
        if is_touched && policy == EmptySnapshotPolicy::KeepTouched {
            entry.persistence = Persistence::Virtual;
            kept += 1;
            continue;
        }
        report.defaulted += 1;
        let differs = entry.status != default_status || !entry.remarks.is_empty();
        if is_touched && differs {
            report.overwritten_local_edits.push(entry.student_id.clone());
        }
        entry.status = default_status;
        entry.remarks.clear();
        entry.persistence = Persistence::Virtual;
    }
    report.reset_all = kept == 0;
    report
}

fn reconcile_records(draft: &mut Draft, snapshot: &[ConfirmedRecord]) -> ReconcileReport {
    let mut by_student: HashMap<&StudentId, &ConfirmedRecord> = HashMap::new();
    let mut report = ReconcileReport::default();
    for rec in snapshot {
        if draft.contains(&rec.student_id) {
            by_student.insert(&rec.student_id, rec);
        } else {
            report.dropped_outside_roster += 1;
        }
    }

    let touched = draft.touched().clone();
    for entry in draft.entries_mut() {
        match by_student.get(&entry.student_id) {
            Some(rec) => {
                let differs = entry.status != rec.status || entry.remarks != rec.remarks;
                if differs && touched.contains(&entry.student_id) {
                    report.overwritten_local_edits.push(entry.student_id.clone());
                }
                entry.status = rec.status;
                entry.remarks = rec.remarks.clone();
                entry.persistence = Persistence::Persisted(rec.record_id.clone());
                report.applied += 1;
            }
            None => {
                // The record behind a previously persisted entry is gone.
                if !entry.persistence.is_virtual() {
                    entry.persistence = Persistence::Virtual;
                }
                report.defaulted += 1;
            }
        }
    }
    report
}
