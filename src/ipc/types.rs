use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::attendance::{EngineConfig, LoadController};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// The operator's single live attendance session.
    pub attendance: LoadController,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            attendance: LoadController::new(EngineConfig::default()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
