//! Draft/confirmed attendance engine for one (batch, date) at a time.

pub mod config;
pub mod controller;
pub mod draft;
pub mod error;
pub mod reconcile;
pub mod session;
pub mod status;
pub mod store;
pub mod submit;
pub mod summary;
pub mod transition;
pub mod window;

pub use config::EngineConfig;
pub use controller::LoadController;
pub use draft::DraftKey;
pub use error::{AttendanceError, ValidationError};
pub use status::{AttendanceStatus, StudentId};
pub use store::SqliteStore;
