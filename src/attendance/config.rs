use rusqlite::Connection;
use serde_json::{json, Map, Value};

use super::reconcile::EmptySnapshotPolicy;
use super::status::AttendanceStatus;
use super::window::{DateWindow, DEFAULT_EDIT_WINDOW_DAYS};
use crate::db;

pub const SETTINGS_KEY: &str = "setup.attendance";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub edit_window_days: u32,
    pub empty_snapshot_policy: EmptySnapshotPolicy,
    pub refetch_after_update: bool,
    pub default_status: AttendanceStatus,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            edit_window_days: DEFAULT_EDIT_WINDOW_DAYS,
            empty_snapshot_policy: EmptySnapshotPolicy::ResetAll,
            refetch_after_update: true,
            default_status: AttendanceStatus::Absent,
        }
    }
}

impl EngineConfig {
    pub fn window(&self) -> DateWindow {
        DateWindow::new(self.edit_window_days)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "editWindowDays": self.edit_window_days,
            "emptySnapshotPolicy": self.empty_snapshot_policy,
            "refetchAfterUpdate": self.refetch_after_update,
            "defaultStatus": self.default_status.as_str(),
        })
    }

    /// Applies a camelCase patch field-by-field. Unknown fields are rejected and
    /// nothing is applied past the first bad field.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        for (k, v) in patch {
            match k.as_str() {
                "editWindowDays" => {
                    let n = v
                        .as_u64()
                        .ok_or_else(|| format!("{} must be a non-negative integer", k))?;
                    if n > 31 {
                        return Err(format!("{} must be in 0..=31", k));
                    }
                    self.edit_window_days = n as u32;
                }
                "emptySnapshotPolicy" => {
                    let s = v.as_str().ok_or_else(|| format!("{} must be string", k))?;
                    self.empty_snapshot_policy = EmptySnapshotPolicy::parse(s).ok_or_else(|| {
                        "emptySnapshotPolicy must be one of: resetAll, keepTouched".to_string()
                    })?;
                }
                "refetchAfterUpdate" => {
                    self.refetch_after_update =
                        v.as_bool().ok_or_else(|| format!("{} must be boolean", k))?;
                }
                "defaultStatus" => {
                    let s = v.as_str().ok_or_else(|| format!("{} must be string", k))?;
                    self.default_status = s.parse().map_err(|e| format!("{}", e))?;
                }
                _ => return Err(format!("unknown attendance field: {}", k)),
            }
        }
        Ok(())
    }
}

pub fn load_config(conn: &Connection) -> anyhow::Result<EngineConfig> {
    let mut config = EngineConfig::default();
    if let Some(saved) = db::settings_get_json(conn, SETTINGS_KEY)? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort: a malformed stored value must not block the workspace.
            let mut candidate = config;
            if candidate.apply_patch(saved_obj).is_ok() {
                config = candidate;
            }
        }
    }
    Ok(config)
}

pub fn save_config(conn: &Connection, config: &EngineConfig) -> anyhow::Result<()> {
    db::settings_set_json(conn, SETTINGS_KEY, &config.to_json())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_updates_known_fields() {
        let mut c = EngineConfig::default();
        let patch = json!({
            "editWindowDays": 5,
            "emptySnapshotPolicy": "keepTouched",
            "refetchAfterUpdate": false,
            "defaultStatus": "present"
        });
        c.apply_patch(patch.as_object().expect("object")).expect("apply");
        assert_eq!(c.edit_window_days, 5);
        assert_eq!(c.empty_snapshot_policy, EmptySnapshotPolicy::KeepTouched);
        assert!(!c.refetch_after_update);
        assert_eq!(c.default_status, AttendanceStatus::Present);
    }

    #[test]
    fn patch_rejects_unknown_and_out_of_range_fields() {
        let mut c = EngineConfig::default();
        let unknown = json!({ "tardyMinutes": 10 });
        assert!(c.apply_patch(unknown.as_object().expect("object")).is_err());
        let wide = json!({ "editWindowDays": 90 });
        assert!(c.apply_patch(wide.as_object().expect("object")).is_err());
        let status = json!({ "defaultStatus": "tardy" });
        assert!(c.apply_patch(status.as_object().expect("object")).is_err());
        assert_eq!(c, EngineConfig::default());
    }

    #[test]
    fn config_round_trips_through_settings_table() {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        assert_eq!(load_config(&conn).expect("load"), EngineConfig::default());
        let c = EngineConfig {
            edit_window_days: 7,
            empty_snapshot_policy: EmptySnapshotPolicy::KeepTouched,
            ..EngineConfig::default()
        };
        save_config(&conn, &c).expect("save");
        assert_eq!(c.to_json()["emptySnapshotPolicy"], "keepTouched");
        assert_eq!(load_config(&conn).expect("load"), c);
    }
}
