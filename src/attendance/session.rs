//! Drives a [`LoadController`] against an [`AttendanceStore`].
//!
//! The controller never performs I/O; these helpers run each request it hands
//! out and feed the result back, one event at a time.

use chrono::NaiveDate;

use super::controller::{Delivery, LoadController, RequestKind, Ticket};
use super::draft::DraftKey;
use super::error::AttendanceError;
use super::status::{AttendanceStatus, StudentId};
use super::store::{AttendanceStore, HistoryRow};
use super::summary::{summarize, AttendanceSummary};

fn failed(ctrl: &LoadController) -> Result<(), AttendanceError> {
    match ctrl.last_error() {
        Some(e) => Err(e.clone()),
        None => Ok(()),
    }
}

fn run_roster<S: AttendanceStore>(
    ctrl: &mut LoadController,
    store: &S,
    ticket: Ticket,
) -> Result<(), AttendanceError> {
    let result = store.get_roster(&ticket.key().batch_id);
    match ctrl.roster_loaded(&ticket, result) {
        Delivery::Applied(Some(next)) => run_snapshot(ctrl, store, next),
        Delivery::Applied(None) => failed(ctrl),
        Delivery::Discarded => Ok(()),
    }
}

fn run_snapshot<S: AttendanceStore>(
    ctrl: &mut LoadController,
    store: &S,
    ticket: Ticket,
) -> Result<(), AttendanceError> {
    let key = ticket.key();
    let result = store.get_confirmed_attendance(&key.batch_id, key.date);
    let failed_fetch = result.as_ref().err().cloned();
    if ctrl.snapshot_loaded(&ticket, result).is_discarded() {
        return Ok(());
    }
    match failed_fetch {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn run<S: AttendanceStore>(
    ctrl: &mut LoadController,
    store: &S,
    ticket: Ticket,
) -> Result<(), AttendanceError> {
    match ticket.kind() {
        RequestKind::Roster => run_roster(ctrl, store, ticket),
        RequestKind::Snapshot => run_snapshot(ctrl, store, ticket),
        RequestKind::Submit | RequestKind::Update => Ok(()),
    }
}

/// Selects (batch, date) and loads roster and confirmed state into a fresh draft.
pub fn load<S: AttendanceStore>(
    ctrl: &mut LoadController,
    store: &S,
    key: DraftKey,
    now: NaiveDate,
) -> Result<(), AttendanceError> {
    let ticket = ctrl.select(key, now)?;
    run(ctrl, store, ticket)
}

pub fn refresh<S: AttendanceStore>(ctrl: &mut LoadController, store: &S) -> Result<(), AttendanceError> {
    let ticket = ctrl.begin_refresh()?;
    run(ctrl, store, ticket)
}

pub fn retry<S: AttendanceStore>(ctrl: &mut LoadController, store: &S) -> Result<(), AttendanceError> {
    let ticket = ctrl.retry()?;
    run(ctrl, store, ticket)
}

/// Upserts the whole draft, then refetches and reconciles.
pub fn submit<S: AttendanceStore>(
    ctrl: &mut LoadController,
    store: &mut S,
    now: NaiveDate,
) -> Result<(), AttendanceError> {
    let (ticket, batch) = ctrl.begin_submit(now)?;
    let result = store.upsert_batch_attendance(&batch);
    match ctrl.submit_resolved(&ticket, result) {
        Delivery::Applied(Some(next)) => run(ctrl, store, next),
        Delivery::Applied(None) => failed(ctrl),
        Delivery::Discarded => Ok(()),
    }
}

pub fn edit_one<S: AttendanceStore>(
    ctrl: &mut LoadController,
    store: &mut S,
    student_id: &StudentId,
    status: AttendanceStatus,
    remarks: &str,
) -> Result<(), AttendanceError> {
    let Some((ticket, update)) = ctrl.edit_one(student_id, status, remarks)? else {
        return Ok(());
    };
    let result = store.update_attendance_record(&update);
    let failed_update = result.as_ref().err().cloned();
    match ctrl.record_updated(&ticket, result) {
        Delivery::Applied(Some(next)) => run(ctrl, store, next),
        Delivery::Applied(None) => match failed_update {
            Some(e) => Err(e.into()),
            None => Ok(()),
        },
        Delivery::Discarded => Ok(()),
    }
}

pub fn student_history<S: AttendanceStore>(
    store: &S,
    student_id: &StudentId,
    batch_id: &str,
) -> Result<(Vec<HistoryRow>, AttendanceSummary), AttendanceError> {
    let rows = store.get_student_attendance_history(student_id, batch_id)?;
    let summary = summarize(rows.iter().map(|r| r.status));
    Ok((rows, summary))
}
