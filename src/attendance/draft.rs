use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use super::status::{AttendanceEntry, AttendanceStatus, RosterMember, StudentId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey {
    pub batch_id: String,
    pub date: NaiveDate,
}

impl DraftKey {
    pub fn new(batch_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            batch_id: batch_id.into(),
            date,
        }
    }
}

/// Local, possibly unsaved attendance for one (batch, date).
///
/// Holds exactly one entry per roster member, in roster order. The key-set is
/// fixed when the draft is materialized and nothing afterwards adds or removes
/// entries.
#[derive(Debug, Clone)]
pub struct Draft {
    key: DraftKey,
    entries: Vec<AttendanceEntry>,
    index: HashMap<StudentId, usize>,
    touched: HashSet<StudentId>,
    default_status: AttendanceStatus,
    reconciled: bool,
}

impl Draft {
    /// Every roster member starts as a virtual entry carrying `default_status`.
    /// Duplicate roster ids keep their first occurrence.
    pub fn from_roster(key: DraftKey, roster: &[RosterMember], default_status: AttendanceStatus) -> Self {
        let mut entries = Vec::with_capacity(roster.len());
        let mut index = HashMap::with_capacity(roster.len());
        for member in roster {
            if index.contains_key(&member.student_id) {
                continue;
            }
            index.insert(member.student_id.clone(), entries.len());
            entries.push(AttendanceEntry::virtual_default(member, default_status));
        }
        Self {
            key,
            entries,
            index,
            touched: HashSet::new(),
            default_status,
            reconciled: false,
        }
    }

    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    pub fn entries(&self) -> &[AttendanceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, student_id: &StudentId) -> bool {
        self.index.contains_key(student_id)
    }

    pub fn get(&self, student_id: &StudentId) -> Option<&AttendanceEntry> {
        self.index.get(student_id).map(|&i| &self.entries[i])
    }

    pub fn student_ids(&self) -> impl Iterator<Item = &StudentId> {
        self.entries.iter().map(|e| &e.student_id)
    }

    pub fn default_status(&self) -> AttendanceStatus {
        self.default_status
    }

    /// True once any snapshot has been merged into this draft.
    pub fn is_reconciled(&self) -> bool {
        self.reconciled
    }

    pub fn touched(&self) -> &HashSet<StudentId> {
        &self.touched
    }

    pub fn is_touched(&self, student_id: &StudentId) -> bool {
        self.touched.contains(student_id)
    }

    /// Panics if `student_id` is not on the roster: callers validate ids first.
    pub(super) fn entry_mut(&mut self, student_id: &StudentId) -> &mut AttendanceEntry {
        let Some(&i) = self.index.get(student_id) else {
            panic!(
                "student {} is not on the roster for batch {} on {}",
                student_id, self.key.batch_id, self.key.date
            );
        };
        &mut self.entries[i]
    }

    pub(super) fn entries_mut(&mut self) -> impl Iterator<Item = &mut AttendanceEntry> {
        self.entries.iter_mut()
    }

    pub(super) fn mark_touched(&mut self, student_id: &StudentId) {
        self.touched.insert(student_id.clone());
    }

    pub(super) fn finish_reconcile(&mut self) {
        self.touched.clear();
        self.reconciled = true;
    }
}
