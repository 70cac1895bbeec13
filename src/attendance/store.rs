use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::error::TransportError;
use super::status::{AttendanceStatus, ConfirmedRecord, RecordId, RosterMember, StudentId};
use super::submit::BatchRequest;
use super::transition::UpdateRequest;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// The collaborators the engine talks to. Reads take `&self`; writes take
/// `&mut self`. An `Ok(vec![])` is a real "nothing stored" answer, never a
/// stand-in for a failed call.
pub trait AttendanceStore {
    fn get_roster(&self, batch_id: &str) -> Result<Vec<RosterMember>, TransportError>;

    fn get_confirmed_attendance(
        &self,
        batch_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ConfirmedRecord>, TransportError>;

    fn upsert_batch_attendance(&mut self, batch: &BatchRequest) -> Result<(), TransportError>;

    fn update_attendance_record(&mut self, update: &UpdateRequest) -> Result<(), TransportError>;

    fn get_student_attendance_history(
        &self,
        student_id: &StudentId,
        batch_id: &str,
    ) -> Result<Vec<HistoryRow>, TransportError>;
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn roster(&self, batch_id: &str) -> anyhow::Result<Vec<RosterMember>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.last_name, s.first_name, s.email
             FROM batch_members m
             JOIN students s ON s.id = m.student_id
             WHERE m.batch_id = ? AND m.active = 1
             ORDER BY m.sort_order, s.last_name, s.first_name",
        )?;
        let rows = stmt
            .query_map([batch_id], |r| {
                let last: String = r.get(1)?;
                let first: String = r.get(2)?;
                Ok(RosterMember {
                    student_id: StudentId(r.get(0)?),
                    name: format!("{}, {}", last, first),
                    email: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn confirmed(&self, batch_id: &str, date: NaiveDate) -> anyhow::Result<Vec<ConfirmedRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, student_id, status, remarks
             FROM attendance_records
             WHERE batch_id = ? AND date = ?",
        )?;
        let raw = stmt
            .query_map((batch_id, date.format(DATE_FORMAT).to_string()), |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(id, student_id, status, remarks)| -> anyhow::Result<ConfirmedRecord> {
                Ok(ConfirmedRecord {
                    student_id: StudentId(student_id),
                    status: parse_stored_status(&status)?,
                    remarks,
                    record_id: RecordId::new(id),
                })
            })
            .collect()
    }

    fn upsert(&self, batch: &BatchRequest) -> anyhow::Result<()> {
        let date = batch.key.date.format(DATE_FORMAT).to_string();
        let updated_at = chrono::Utc::now().to_rfc3339();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("failed to start attendance transaction")?;
        for entry in &batch.entries {
            tx.execute(
                "INSERT INTO attendance_records(id, batch_id, student_id, date, status, remarks, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(batch_id, student_id, date) DO UPDATE SET
                   status = excluded.status,
                   remarks = excluded.remarks,
                   updated_at = excluded.updated_at",
                (
                    Uuid::new_v4().to_string(),
                    &batch.key.batch_id,
                    entry.student_id.as_str(),
                    &date,
                    entry.status.as_str(),
                    &entry.remarks,
                    &updated_at,
                ),
            )
            .with_context(|| format!("failed to upsert attendance for {}", entry.student_id))?;
        }
        tx.commit().context("failed to commit attendance batch")?;
        Ok(())
    }

    fn update(&self, update: &UpdateRequest) -> anyhow::Result<()> {
        let changed = self.conn.execute(
            "UPDATE attendance_records SET status = ?, remarks = ?, updated_at = ? WHERE id = ?",
            (
                update.status.as_str(),
                &update.remarks,
                chrono::Utc::now().to_rfc3339(),
                update.record_id.as_str(),
            ),
        )?;
        if changed == 0 {
            return Err(anyhow!("attendance record {} not found", update.record_id));
        }
        Ok(())
    }

    fn history(&self, student_id: &StudentId, batch_id: &str) -> anyhow::Result<Vec<HistoryRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, status
             FROM attendance_records
             WHERE student_id = ? AND batch_id = ?
             ORDER BY date DESC",
        )?;
        let raw = stmt
            .query_map((student_id.as_str(), batch_id), |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(date, status)| -> anyhow::Result<HistoryRow> {
                Ok(HistoryRow {
                    date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
                        .with_context(|| format!("bad stored date {}", date))?,
                    status: parse_stored_status(&status)?,
                })
            })
            .collect()
    }
}

fn parse_stored_status(raw: &str) -> anyhow::Result<AttendanceStatus> {
    raw.parse::<AttendanceStatus>()
        .map_err(|e| anyhow!("corrupt attendance row: {}", e))
}

impl AttendanceStore for SqliteStore<'_> {
    fn get_roster(&self, batch_id: &str) -> Result<Vec<RosterMember>, TransportError> {
        self.roster(batch_id)
            .map_err(|e| TransportError::new("getRoster", format!("{e:#}")))
    }

    fn get_confirmed_attendance(
        &self,
        batch_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ConfirmedRecord>, TransportError> {
        self.confirmed(batch_id, date)
            .map_err(|e| TransportError::new("getConfirmedAttendance", format!("{e:#}")))
    }

    fn upsert_batch_attendance(&mut self, batch: &BatchRequest) -> Result<(), TransportError> {
        self.upsert(batch)
            .map_err(|e| TransportError::new("upsertBatchAttendance", format!("{e:#}")))
    }

    fn update_attendance_record(&mut self, update: &UpdateRequest) -> Result<(), TransportError> {
        self.update(update)
            .map_err(|e| TransportError::new("updateAttendanceRecord", format!("{e:#}")))
    }

    fn get_student_attendance_history(
        &self,
        student_id: &StudentId,
        batch_id: &str,
    ) -> Result<Vec<HistoryRow>, TransportError> {
        self.history(student_id, batch_id)
            .map_err(|e| TransportError::new("getStudentAttendanceHistory", format!("{e:#}")))
    }
}
