//! Load controller: the explicit state machine that owns the live draft.
//!
//! Every round trip to the backing store is represented by a [`Ticket`]. The
//! controller hands out a ticket when it wants something fetched or written and
//! accepts the result only if that ticket is still the one it is waiting for.
//! Selecting a new (batch, date) drops the pending ticket, so a late answer for
//! the previous selection is discarded on arrival: last selection wins, not
//! last response.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use super::config::EngineConfig;
use super::draft::{Draft, DraftKey};
use super::error::{AttendanceError, TransportError, ValidationError};
use super::reconcile::{reconcile, ReconcileReport};
use super::status::{AttendanceStatus, ConfirmedRecord, RosterMember, StudentId};
use super::submit::{build_batch, conflicts_with_submitted, BatchRequest};
use super::transition::{self, EditOutcome, UpdateRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadStateKind {
    Idle,
    RosterLoading,
    SnapshotLoading,
    Ready,
    Submitting,
    Error,
}

impl LoadStateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::RosterLoading => "rosterLoading",
            Self::SnapshotLoading => "snapshotLoading",
            Self::Ready => "ready",
            Self::Submitting => "submitting",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LoadStateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Roster,
    Snapshot,
    Submit,
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    seq: u64,
    selection: u64,
    kind: RequestKind,
    key: DraftKey,
}

impl Ticket {
    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }
}

/// Result of handing a completed request back to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<T> {
    Applied(T),
    /// The request belonged to a selection or stage that is no longer current.
    Discarded,
}

impl<T> Delivery<T> {
    pub fn is_discarded(&self) -> bool {
        matches!(self, Self::Discarded)
    }
}

pub struct LoadController {
    config: EngineConfig,
    next_config: Option<EngineConfig>,
    state: LoadStateKind,
    selection: Option<DraftKey>,
    selection_gen: u64,
    next_seq: u64,
    pending: Option<Ticket>,
    draft: Option<Draft>,
    in_flight_batch: Option<BatchRequest>,
    submitted: Option<BatchRequest>,
    last_error: Option<AttendanceError>,
    last_report: Option<ReconcileReport>,
}

impl LoadController {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            next_config: None,
            state: LoadStateKind::Idle,
            selection: None,
            selection_gen: 0,
            next_seq: 0,
            pending: None,
            draft: None,
            in_flight_batch: None,
            submitted: None,
            last_error: None,
            last_report: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The configuration the next selection will run under.
    pub fn upcoming_config(&self) -> &EngineConfig {
        self.next_config.as_ref().unwrap_or(&self.config)
    }

    /// Takes effect on the next selection; the live draft keeps its rules.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.next_config = Some(config);
    }

    pub fn state(&self) -> LoadStateKind {
        self.state
    }

    pub fn selection(&self) -> Option<&DraftKey> {
        self.selection.as_ref()
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    pub fn last_error(&self) -> Option<&AttendanceError> {
        self.last_error.as_ref()
    }

    pub fn last_report(&self) -> Option<&ReconcileReport> {
        self.last_report.as_ref()
    }

    fn issue(&mut self, kind: RequestKind, key: DraftKey) -> Ticket {
        self.next_seq += 1;
        let ticket = Ticket {
            seq: self.next_seq,
            selection: self.selection_gen,
            kind,
            key,
        };
        if kind != RequestKind::Update {
            self.pending = Some(ticket.clone());
        }
        ticket
    }

    fn take_if_pending(&mut self, ticket: &Ticket) -> bool {
        if self.pending.as_ref() == Some(ticket) {
            self.pending = None;
            return true;
        }
        debug!(
            kind = ?ticket.kind,
            batch_id = %ticket.key.batch_id,
            date = %ticket.key.date,
            "discarding stale delivery"
        );
        false
    }

    fn invalid(&self, action: &'static str) -> AttendanceError {
        AttendanceError::InvalidState {
            action,
            state: self.state,
        }
    }

    /// Starts a fresh load for `key`. An out-of-window date is refused and the
    /// current session is left as it was.
    pub fn select(&mut self, key: DraftKey, now: NaiveDate) -> Result<Ticket, AttendanceError> {
        self.upcoming_config().window().check(key.date, now)?;
        if let Some(config) = self.next_config.take() {
            self.config = config;
        }
        info!(batch_id = %key.batch_id, date = %key.date, "selection changed");
        self.selection_gen += 1;
        self.selection = Some(key.clone());
        self.draft = None;
        self.in_flight_batch = None;
        self.submitted = None;
        self.last_error = None;
        self.last_report = None;
        self.state = LoadStateKind::RosterLoading;
        Ok(self.issue(RequestKind::Roster, key))
    }

    /// On success returns the snapshot request to run next.
    pub fn roster_loaded(
        &mut self,
        ticket: &Ticket,
        result: Result<Vec<RosterMember>, TransportError>,
    ) -> Delivery<Option<Ticket>> {
        if ticket.kind != RequestKind::Roster || !self.take_if_pending(ticket) {
            return Delivery::Discarded;
        }
        match result {
            Ok(roster) => {
                let draft = Draft::from_roster(ticket.key.clone(), &roster, self.config.default_status);
                debug!(students = draft.len(), "roster loaded");
                self.draft = Some(draft);
                self.state = LoadStateKind::SnapshotLoading;
                Delivery::Applied(Some(self.issue(RequestKind::Snapshot, ticket.key.clone())))
            }
            Err(e) => {
                warn!(error = %e, "roster fetch failed");
                self.state = LoadStateKind::Error;
                self.last_error = Some(e.into());
                Delivery::Applied(None)
            }
        }
    }

    pub fn snapshot_loaded(
        &mut self,
        ticket: &Ticket,
        result: Result<Vec<ConfirmedRecord>, TransportError>,
    ) -> Delivery<()> {
        if ticket.kind != RequestKind::Snapshot || !self.take_if_pending(ticket) {
            return Delivery::Discarded;
        }
        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Keep the draft: nothing the operator entered is lost.
                warn!(error = %e, "confirmed snapshot fetch failed");
                self.state = LoadStateKind::Error;
                self.last_error = Some(e.into());
                return Delivery::Applied(());
            }
        };
        let Some(draft) = self.draft.as_mut() else {
            return Delivery::Discarded;
        };
        let mut report = reconcile(draft, &snapshot, self.config.empty_snapshot_policy);
        self.last_error = None;
        if let Some(submitted) = self.submitted.take() {
            report.conflicts = conflicts_with_submitted(&submitted, &snapshot);
            if !report.conflicts.is_empty() {
                warn!(
                    count = report.conflicts.len(),
                    "confirmed records changed elsewhere after submit"
                );
                self.last_error = Some(AttendanceError::Conflict {
                    student_ids: report.conflicts.clone(),
                });
            }
        }
        self.last_report = Some(report);
        self.state = LoadStateKind::Ready;
        Delivery::Applied(())
    }

    /// Serializes the current draft for a full-replace upsert.
    pub fn begin_submit(&mut self, now: NaiveDate) -> Result<(Ticket, BatchRequest), AttendanceError> {
        let Some(draft) = self.draft.as_ref() else {
            return Err(ValidationError::NoDraft.into());
        };
        if self.state != LoadStateKind::Ready {
            return Err(self.invalid("submit"));
        }
        let batch = build_batch(draft, &self.config.window(), now)?;
        info!(
            batch_id = %batch.key.batch_id,
            date = %batch.key.date,
            entries = batch.entries.len(),
            "submitting attendance"
        );
        self.in_flight_batch = Some(batch.clone());
        self.state = LoadStateKind::Submitting;
        let key = batch.key.clone();
        Ok((self.issue(RequestKind::Submit, key), batch))
    }

    /// On success returns the refetch request that closes the loop.
    pub fn submit_resolved(
        &mut self,
        ticket: &Ticket,
        result: Result<(), TransportError>,
    ) -> Delivery<Option<Ticket>> {
        if ticket.kind != RequestKind::Submit || !self.take_if_pending(ticket) {
            return Delivery::Discarded;
        }
        let batch = self.in_flight_batch.take();
        match result {
            Ok(()) => {
                self.submitted = batch;
                self.last_error = None;
                self.state = LoadStateKind::SnapshotLoading;
                Delivery::Applied(Some(self.issue(RequestKind::Snapshot, ticket.key.clone())))
            }
            Err(e) => {
                warn!(error = %e, "attendance submit failed");
                self.state = LoadStateKind::Ready;
                self.last_error = Some(e.into());
                Delivery::Applied(None)
            }
        }
    }

    /// Re-fetches the confirmed snapshot for the live selection.
    pub fn begin_refresh(&mut self) -> Result<Ticket, AttendanceError> {
        let Some(key) = self.draft.as_ref().map(|d| d.key().clone()) else {
            return Err(ValidationError::NoDraft.into());
        };
        match self.state {
            LoadStateKind::Ready | LoadStateKind::Error => {
                self.state = LoadStateKind::SnapshotLoading;
                Ok(self.issue(RequestKind::Snapshot, key))
            }
            _ => Err(self.invalid("refresh")),
        }
    }

    /// Re-issues whichever load stage failed.
    pub fn retry(&mut self) -> Result<Ticket, AttendanceError> {
        if self.state != LoadStateKind::Error {
            return Err(self.invalid("retry"));
        }
        let Some(key) = self.selection.clone() else {
            return Err(ValidationError::NoDraft.into());
        };
        if self.draft.is_some() {
            self.state = LoadStateKind::SnapshotLoading;
            Ok(self.issue(RequestKind::Snapshot, key))
        } else {
            self.state = LoadStateKind::RosterLoading;
            Ok(self.issue(RequestKind::Roster, key))
        }
    }

    fn draft_mut(&mut self) -> Result<&mut Draft, AttendanceError> {
        self.draft
            .as_mut()
            .ok_or_else(|| ValidationError::NoDraft.into())
    }

    pub fn toggle(&mut self, student_id: &StudentId) -> Result<AttendanceStatus, AttendanceError> {
        Ok(transition::toggle_cycle(self.draft_mut()?, student_id))
    }

    pub fn bulk_assign(
        &mut self,
        student_ids: &[StudentId],
        status: AttendanceStatus,
    ) -> Result<usize, AttendanceError> {
        Ok(transition::bulk_assign(self.draft_mut()?, student_ids, status))
    }

    pub fn mark_all(&mut self, status: AttendanceStatus) -> Result<usize, AttendanceError> {
        Ok(transition::mark_all(self.draft_mut()?, status))
    }

    /// For a persisted entry, returns the record update the caller must run
    /// and report back through [`LoadController::record_updated`].
    pub fn edit_one(
        &mut self,
        student_id: &StudentId,
        status: AttendanceStatus,
        remarks: &str,
    ) -> Result<Option<(Ticket, UpdateRequest)>, AttendanceError> {
        let draft = self.draft_mut()?;
        let key = draft.key().clone();
        match transition::edit_one(draft, student_id, status, remarks) {
            EditOutcome::LocalOnly => Ok(None),
            EditOutcome::UpdateRecord(update) => {
                Ok(Some((self.issue(RequestKind::Update, key), update)))
            }
        }
    }

    /// Returns a refetch request when the configuration asks for one after a
    /// successful single-record update.
    pub fn record_updated(
        &mut self,
        ticket: &Ticket,
        result: Result<(), TransportError>,
    ) -> Delivery<Option<Ticket>> {
        if ticket.kind != RequestKind::Update || ticket.selection != self.selection_gen {
            return Delivery::Discarded;
        }
        if let Err(e) = result {
            warn!(error = %e, "attendance record update failed");
            self.last_error = Some(e.into());
            return Delivery::Applied(None);
        }
        if self.config.refetch_after_update && self.state == LoadStateKind::Ready {
            self.state = LoadStateKind::SnapshotLoading;
            return Delivery::Applied(Some(self.issue(RequestKind::Snapshot, ticket.key.clone())));
        }
        Delivery::Applied(None)
    }
}
