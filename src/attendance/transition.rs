//! Operator edits against the live draft. None of these add or remove entries.

use super::draft::Draft;
use super::status::{AttendanceStatus, RecordId, StudentId};

/// What the caller still has to do after `edit_one`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Virtual entry: only the draft changed.
    LocalOnly,
    /// Persisted entry: the record must also be written out of band.
    UpdateRecord(UpdateRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub record_id: RecordId,
    pub status: AttendanceStatus,
    pub remarks: String,
}

pub fn toggle_cycle(draft: &mut Draft, student_id: &StudentId) -> AttendanceStatus {
    let entry = draft.entry_mut(student_id);
    entry.status = entry.status.next_in_cycle();
    let status = entry.status;
    draft.mark_touched(student_id);
    status
}

/// Sets `status` on each listed student; remarks are left alone.
pub fn bulk_assign<'a, I>(draft: &mut Draft, student_ids: I, status: AttendanceStatus) -> usize
where
    I: IntoIterator<Item = &'a StudentId>,
{
    let mut changed = 0;
    for student_id in student_ids {
        draft.entry_mut(student_id).status = status;
        draft.mark_touched(student_id);
        changed += 1;
    }
    changed
}

/// `bulk_assign` over the whole roster. "Class cancelled" is `mark_all(Cancelled)`.
pub fn mark_all(draft: &mut Draft, status: AttendanceStatus) -> usize {
    let ids: Vec<StudentId> = draft.student_ids().cloned().collect();
    bulk_assign(draft, ids.iter(), status)
}

pub fn edit_one(
    draft: &mut Draft,
    student_id: &StudentId,
    status: AttendanceStatus,
    remarks: &str,
) -> EditOutcome {
    let remarks = remarks.trim();
    let entry = draft.entry_mut(student_id);
    entry.status = status;
    entry.remarks = remarks.to_string();
    let outcome = match entry.persistence.record_id() {
        Some(record_id) => EditOutcome::UpdateRecord(UpdateRequest {
            record_id: record_id.clone(),
            status,
            remarks: remarks.to_string(),
        }),
        None => EditOutcome::LocalOnly,
    };
    draft.mark_touched(student_id);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::draft::DraftKey;
    use crate::attendance::status::{Persistence, RosterMember};
    use chrono::NaiveDate;

    fn draft(ids: &[&str]) -> Draft {
        let roster: Vec<RosterMember> = ids
            .iter()
            .map(|id| RosterMember {
                student_id: StudentId::new(*id),
                name: id.to_uppercase(),
                email: None,
            })
            .collect();
        Draft::from_roster(
            DraftKey::new("b1", NaiveDate::from_ymd_opt(2026, 10, 15).expect("date")),
            &roster,
            AttendanceStatus::Absent,
        )
    }

    fn statuses(d: &Draft) -> Vec<AttendanceStatus> {
        d.entries().iter().map(|e| e.status).collect()
    }

    #[test]
    fn toggle_walks_the_cycle_and_marks_touched() {
        let mut d = draft(&["s1", "s2"]);
        let s1 = StudentId::new("s1");
        assert_eq!(toggle_cycle(&mut d, &s1), AttendanceStatus::Present);
        assert_eq!(toggle_cycle(&mut d, &s1), AttendanceStatus::Late);
        assert!(d.is_touched(&s1));
        assert!(!d.is_touched(&StudentId::new("s2")));
    }

    #[test]
    fn bulk_assign_keeps_remarks_and_untouched_entries() {
        let mut d = draft(&["s1", "s2", "s3"]);
        edit_one(&mut d, &StudentId::new("s1"), AttendanceStatus::Late, "bus");
        let picked = [StudentId::new("s1"), StudentId::new("s3")];
        assert_eq!(bulk_assign(&mut d, picked.iter(), AttendanceStatus::Excused), 2);
        assert_eq!(
            statuses(&d),
            vec![AttendanceStatus::Excused, AttendanceStatus::Absent, AttendanceStatus::Excused]
        );
        assert_eq!(d.get(&StudentId::new("s1")).expect("s1").remarks, "bus");
    }

    #[test]
    fn mark_all_cancelled_sets_every_entry() {
        let mut d = draft(&["s1", "s2"]);
        assert_eq!(mark_all(&mut d, AttendanceStatus::Cancelled), 2);
        assert_eq!(statuses(&d), vec![AttendanceStatus::Cancelled; 2]);
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn edit_one_on_virtual_entry_stays_local() {
        let mut d = draft(&["s1"]);
        let out = edit_one(&mut d, &StudentId::new("s1"), AttendanceStatus::Present, "  ok ");
        assert_eq!(out, EditOutcome::LocalOnly);
        assert_eq!(d.get(&StudentId::new("s1")).expect("s1").remarks, "ok");
    }

    #[test]
    fn edit_one_on_persisted_entry_requests_record_update() {
        let mut d = draft(&["s1"]);
        d.entry_mut(&StudentId::new("s1")).persistence = Persistence::Persisted(RecordId::new("r1"));
        let out = edit_one(&mut d, &StudentId::new("s1"), AttendanceStatus::Late, " traffic ");
        assert_eq!(
            out,
            EditOutcome::UpdateRecord(UpdateRequest {
                record_id: RecordId::new("r1"),
                status: AttendanceStatus::Late,
                remarks: "traffic".to_string(),
            })
        );
        assert_eq!(d.get(&StudentId::new("s1")).expect("s1").remarks, "traffic");
    }

    #[test]
    #[should_panic]
    fn toggling_a_student_off_the_roster_is_fatal() {
        let mut d = draft(&["s1"]);
        toggle_cycle(&mut d, &StudentId::new("s9"));
    }
}
