use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::error::ValidationError;

/// The closed vocabulary for one attendance mark.
///
/// `Cancelled` means no session took place for this student on this date. It is
/// stored like any other status but never counts as an absence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    #[default]
    Absent,
    Late,
    Excused,
    Cancelled,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 5] = [
        AttendanceStatus::Absent,
        AttendanceStatus::Present,
        AttendanceStatus::Late,
        AttendanceStatus::Excused,
        AttendanceStatus::Cancelled,
    ];

    /// Operator toggle order: absent -> present -> late -> excused -> cancelled -> absent.
    pub fn next_in_cycle(self) -> Self {
        match self {
            Self::Absent => Self::Present,
            Self::Present => Self::Late,
            Self::Late => Self::Excused,
            Self::Excused => Self::Cancelled,
            Self::Cancelled => Self::Absent,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
            Self::Excused => "excused",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == needle)
            .ok_or_else(|| ValidationError::UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

impl StudentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether an entry has a confirmed record behind it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Persistence {
    #[default]
    Virtual,
    Persisted(RecordId),
}

impl Persistence {
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            Self::Virtual => None,
            Self::Persisted(id) => Some(id),
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Self::Virtual)
    }
}

/// One student's mark for the live (batch, date).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceEntry {
    pub student_id: StudentId,
    pub display_name: String,
    pub email: Option<String>,
    pub status: AttendanceStatus,
    pub remarks: String,
    pub persistence: Persistence,
}

impl AttendanceEntry {
    pub fn virtual_default(member: &RosterMember, status: AttendanceStatus) -> Self {
        Self {
            student_id: member.student_id.clone(),
            display_name: member.name.clone(),
            email: member.email.clone(),
            status,
            remarks: String::new(),
            persistence: Persistence::Virtual,
        }
    }
}

/// A record as the backing store reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedRecord {
    pub student_id: StudentId,
    pub status: AttendanceStatus,
    pub remarks: String,
    pub record_id: RecordId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterMember {
    pub student_id: StudentId,
    pub name: String,
    pub email: Option<String>,
}
