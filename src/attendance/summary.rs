use serde::Serialize;

use super::status::AttendanceStatus;

/// Per-status counts over a student's history.
///
/// `cancelled` days had no session: they are counted on their own and left out
/// of the rate's denominator. `excused` counts as a held session the student
/// did not attend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub cancelled: usize,
    pub sessions_held: usize,
    pub attendance_rate: Option<f64>,
}

pub fn summarize<I>(statuses: I) -> AttendanceSummary
where
    I: IntoIterator<Item = AttendanceStatus>,
{
    let mut s = AttendanceSummary::default();
    for status in statuses {
        s.total += 1;
        match status {
            AttendanceStatus::Present => s.present += 1,
            AttendanceStatus::Absent => s.absent += 1,
            AttendanceStatus::Late => s.late += 1,
            AttendanceStatus::Excused => s.excused += 1,
            AttendanceStatus::Cancelled => s.cancelled += 1,
        }
    }
    s.sessions_held = s.total - s.cancelled;
    s.attendance_rate = if s.sessions_held > 0 {
        Some((s.present + s.late) as f64 / s.sessions_held as f64)
    } else {
        None
    };
    s
}
