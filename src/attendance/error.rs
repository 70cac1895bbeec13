use chrono::NaiveDate;
use thiserror::Error;

use super::controller::LoadStateKind;
use super::status::StudentId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("date {date} is outside the editable window {min}..={max}")]
    OutsideWindow {
        date: NaiveDate,
        min: NaiveDate,
        max: NaiveDate,
    },
    #[error("no roster loaded for the selected batch and date")]
    EmptyDraft,
    #[error("no batch and date selected")]
    NoDraft,
    #[error("unknown attendance status: {0}")]
    UnknownStatus(String),
}

/// A fetch or write to the backing store did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message}")]
pub struct TransportError {
    pub operation: &'static str,
    pub message: String,
}

impl TransportError {
    pub fn new(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self {
            operation,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttendanceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("confirmed records changed elsewhere for {} student(s)", student_ids.len())]
    Conflict { student_ids: Vec<StudentId> },
    #[error("{action} is not allowed while {state}")]
    InvalidState {
        action: &'static str,
        state: LoadStateKind,
    },
}

impl AttendanceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Transport(_) => "transport_failed",
            Self::Conflict { .. } => "conflict",
            Self::InvalidState { .. } => "invalid_state",
        }
    }
}
