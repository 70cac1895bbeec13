use chrono::NaiveDate;
use std::collections::HashMap;

use super::draft::{Draft, DraftKey};
use super::error::ValidationError;
use super::status::{AttendanceStatus, ConfirmedRecord, StudentId};
use super::window::DateWindow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub student_id: StudentId,
    pub status: AttendanceStatus,
    pub remarks: String,
}

/// Full-replace payload for one (batch, date): one entry per roster student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    pub key: DraftKey,
    pub entries: Vec<BatchEntry>,
}

/// Serializes the current draft. Record ids are not sent; remarks are trimmed.
///
/// The window is checked here even though callers check it on selection, so a
/// draft that aged out of the window (e.g. left open past midnight) is refused.
pub fn build_batch(
    draft: &Draft,
    window: &DateWindow,
    now: NaiveDate,
) -> Result<BatchRequest, ValidationError> {
    window.check(draft.key().date, now)?;
    if draft.is_empty() {
        return Err(ValidationError::EmptyDraft);
    }
    let entries = draft
        .entries()
        .iter()
        .map(|e| BatchEntry {
            student_id: e.student_id.clone(),
            status: e.status,
            remarks: e.remarks.trim().to_string(),
        })
        .collect();
    Ok(BatchRequest {
        key: draft.key().clone(),
        entries,
    })
}

/// Students whose confirmed record does not match what was just submitted.
pub fn conflicts_with_submitted(
    submitted: &BatchRequest,
    snapshot: &[ConfirmedRecord],
) -> Vec<StudentId> {
    let by_student: HashMap<&StudentId, &ConfirmedRecord> =
        snapshot.iter().map(|r| (&r.student_id, r)).collect();
    submitted
        .entries
        .iter()
        .filter(|e| match by_student.get(&e.student_id) {
            Some(rec) => rec.status != e.status || rec.remarks != e.remarks,
            None => true,
        })
        .map(|e| e.student_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::status::{RecordId, RosterMember};
    use crate::attendance::transition::{edit_one, mark_all};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("date")
    }

    fn draft_on(date: NaiveDate, ids: &[&str]) -> Draft {
        let roster: Vec<RosterMember> = ids
            .iter()
            .map(|id| RosterMember {
                student_id: StudentId::new(*id),
                name: id.to_string(),
                email: None,
            })
            .collect();
        Draft::from_roster(DraftKey::new("b1", date), &roster, AttendanceStatus::Absent)
    }

    #[test]
    fn batch_carries_every_entry_with_trimmed_remarks() {
        let today = d(2026, 10, 17);
        let mut draft = draft_on(today, &["s1", "s2"]);
        mark_all(&mut draft, AttendanceStatus::Present);
        edit_one(&mut draft, &StudentId::new("s2"), AttendanceStatus::Late, "  bus  ");
        let batch = build_batch(&draft, &DateWindow::default(), today).expect("batch");
        assert_eq!(batch.key, DraftKey::new("b1", today));
        assert_eq!(
            batch.entries,
            vec![
                BatchEntry {
                    student_id: StudentId::new("s1"),
                    status: AttendanceStatus::Present,
                    remarks: String::new(),
                },
                BatchEntry {
                    student_id: StudentId::new("s2"),
                    status: AttendanceStatus::Late,
                    remarks: "bus".to_string(),
                },
            ]
        );
    }

    #[test]
    fn batch_outside_window_is_rejected() {
        let today = d(2026, 10, 17);
        let draft = draft_on(d(2026, 10, 13), &["s1"]);
        let err = build_batch(&draft, &DateWindow::default(), today).expect_err("rejected");
        assert!(matches!(err, ValidationError::OutsideWindow { .. }));
    }

    #[test]
    fn empty_roster_is_rejected() {
        let today = d(2026, 10, 17);
        let draft = draft_on(today, &[]);
        assert_eq!(
            build_batch(&draft, &DateWindow::default(), today),
            Err(ValidationError::EmptyDraft)
        );
    }

    #[test]
    fn conflicts_flag_differing_and_missing_records() {
        let today = d(2026, 10, 17);
        let mut draft = draft_on(today, &["s1", "s2", "s3"]);
        mark_all(&mut draft, AttendanceStatus::Present);
        let batch = build_batch(&draft, &DateWindow::default(), today).expect("batch");
        let snapshot = vec![
            ConfirmedRecord {
                student_id: StudentId::new("s1"),
                status: AttendanceStatus::Present,
                remarks: String::new(),
                record_id: RecordId::new("r1"),
            },
            ConfirmedRecord {
                student_id: StudentId::new("s2"),
                status: AttendanceStatus::Absent,
                remarks: String::new(),
                record_id: RecordId::new("r2"),
            },
        ];
        assert_eq!(
            conflicts_with_submitted(&batch, &snapshot),
            vec![StudentId::new("s2"), StudentId::new("s3")]
        );
    }
}
