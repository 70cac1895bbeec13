use crate::attendance::controller::LoadController;
use crate::attendance::session;
use crate::attendance::store::DATE_FORMAT;
use crate::attendance::{AttendanceError, AttendanceStatus, DraftKey, SqliteStore, StudentId};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    /// Engine failures carry the session view so the operator sees what survived.
    fn engine(e: AttendanceError, ctrl: &LoadController) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            details: Some(json!({ "session": session_view(ctrl) })),
        }
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

fn parse_date(raw: &str, key: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

/// The operator host may pass its own notion of today; otherwise the local date.
fn parse_today(params: &serde_json::Value) -> Result<NaiveDate, HandlerErr> {
    match params.get("today").and_then(|v| v.as_str()) {
        Some(raw) => parse_date(raw, "today"),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn parse_status(params: &serde_json::Value) -> Result<AttendanceStatus, HandlerErr> {
    let raw = get_required_str(params, "status")?;
    raw.parse::<AttendanceStatus>()
        .map_err(|e| HandlerErr::bad_params(e.to_string()))
}

fn roster_student(ctrl: &LoadController, raw: &str) -> Result<StudentId, HandlerErr> {
    let Some(draft) = ctrl.draft() else {
        return Err(HandlerErr::engine(
            crate::attendance::ValidationError::NoDraft.into(),
            ctrl,
        ));
    };
    let id = StudentId::new(raw);
    if draft.get(&id).is_none() {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("student {} is not on the roster", raw),
            details: None,
        });
    }
    Ok(id)
}

fn session_view(ctrl: &LoadController) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = ctrl
        .draft()
        .map(|d| {
            d.entries()
                .iter()
                .map(|e| {
                    json!({
                        "studentId": e.student_id.as_str(),
                        "displayName": e.display_name,
                        "email": e.email,
                        "status": e.status.as_str(),
                        "remarks": e.remarks,
                        "persistedId": e.persistence.record_id().map(|r| r.as_str()),
                        "virtual": e.persistence.is_virtual(),
                        "touched": d.is_touched(&e.student_id),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    let selection = ctrl.selection();
    json!({
        "state": ctrl.state(),
        "batchId": selection.map(|k| k.batch_id.clone()),
        "date": selection.map(|k| k.date.format(DATE_FORMAT).to_string()),
        "editWindowDays": ctrl.config().edit_window_days,
        "reconciled": ctrl.draft().map(|d| d.is_reconciled()).unwrap_or(false),
        "entries": entries,
        "lastError": ctrl.last_error().map(|e| json!({ "code": e.code(), "message": e.to_string() })),
        "lastReport": ctrl.last_report(),
    })
}

fn finish(ctrl: &LoadController, result: Result<(), AttendanceError>) -> Result<serde_json::Value, HandlerErr> {
    match result {
        Ok(()) => Ok(session_view(ctrl)),
        Err(e) => Err(HandlerErr::engine(e, ctrl)),
    }
}

fn attendance_window(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let today = parse_today(params)?;
    let window = state.attendance.upcoming_config().window();
    Ok(json!({
        "minDate": window.min_date(today).format(DATE_FORMAT).to_string(),
        "maxDate": window.max_date(today).format(DATE_FORMAT).to_string(),
        "editWindowDays": window.back_days(),
    }))
}

fn attendance_select(
    conn: &Connection,
    ctrl: &mut LoadController,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let batch_id = get_required_str(params, "batchId")?;
    let date_raw = get_required_str(params, "date")?;
    let date = parse_date(&date_raw, "date")?;
    let today = parse_today(params)?;
    let store = SqliteStore::new(conn);
    let result = session::load(ctrl, &store, DraftKey::new(batch_id, date), today);
    finish(ctrl, result)
}

fn attendance_toggle(ctrl: &mut LoadController, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let raw = get_required_str(params, "studentId")?;
    let student_id = roster_student(ctrl, &raw)?;
    let result = ctrl.toggle(&student_id).map(|_| ());
    finish(ctrl, result)
}

fn attendance_bulk_assign(
    ctrl: &mut LoadController,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(raw_ids) = params.get("studentIds").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing studentIds"));
    };
    let status = parse_status(params)?;
    let mut student_ids = Vec::with_capacity(raw_ids.len());
    for v in raw_ids {
        let Some(raw) = v.as_str() else {
            return Err(HandlerErr::bad_params("studentIds must be strings"));
        };
        student_ids.push(roster_student(ctrl, raw)?);
    }
    let result = ctrl.bulk_assign(&student_ids, status).map(|_| ());
    finish(ctrl, result)
}

fn attendance_mark_all(ctrl: &mut LoadController, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let status = parse_status(params)?;
    let result = ctrl.mark_all(status).map(|_| ());
    finish(ctrl, result)
}

fn attendance_edit_one(
    conn: &Connection,
    ctrl: &mut LoadController,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let raw = get_required_str(params, "studentId")?;
    let status = parse_status(params)?;
    let remarks = match params.get("remarks") {
        None => String::new(),
        Some(v) if v.is_null() => String::new(),
        Some(v) => v
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| HandlerErr::bad_params("remarks must be string or null"))?,
    };
    let student_id = roster_student(ctrl, &raw)?;
    let mut store = SqliteStore::new(conn);
    let result = session::edit_one(ctrl, &mut store, &student_id, status, &remarks);
    finish(ctrl, result)
}

fn attendance_submit(
    conn: &Connection,
    ctrl: &mut LoadController,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let today = parse_today(params)?;
    let mut store = SqliteStore::new(conn);
    let result = session::submit(ctrl, &mut store, today);
    finish(ctrl, result)
}

fn attendance_student_history(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = StudentId::new(get_required_str(params, "studentId")?);
    let batch_id = get_required_str(params, "batchId")?;
    let store = SqliteStore::new(conn);
    let (rows, summary) =
        session::student_history(&store, &student_id, &batch_id).map_err(|e| HandlerErr {
            code: e.code(),
            message: e.to_string(),
            details: None,
        })?;
    Ok(json!({
        "studentId": student_id.as_str(),
        "batchId": batch_id,
        "rows": rows,
        "summary": summary,
    }))
}

fn handle_attendance_window(state: &mut AppState, req: &Request) -> serde_json::Value {
    match attendance_window(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, session_view(&state.attendance))
}

fn handle_attendance_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_select(conn, &mut state.attendance, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_retry(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let store = SqliteStore::new(conn);
    let result = session::retry(&mut state.attendance, &store);
    match finish(&state.attendance, result) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_refresh(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let store = SqliteStore::new(conn);
    let result = session::refresh(&mut state.attendance, &store);
    match finish(&state.attendance, result) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    match attendance_toggle(&mut state.attendance, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_bulk_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    match attendance_bulk_assign(&mut state.attendance, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_mark_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    match attendance_mark_all(&mut state.attendance, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_edit_one(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_edit_one(conn, &mut state.attendance, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_submit(conn, &mut state.attendance, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_student_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_student_history(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.window" => Some(handle_attendance_window(state, req)),
        "attendance.state" => Some(handle_attendance_state(state, req)),
        "attendance.select" => Some(handle_attendance_select(state, req)),
        "attendance.retry" => Some(handle_attendance_retry(state, req)),
        "attendance.refresh" => Some(handle_attendance_refresh(state, req)),
        "attendance.toggle" => Some(handle_attendance_toggle(state, req)),
        "attendance.bulkAssign" => Some(handle_attendance_bulk_assign(state, req)),
        "attendance.markAll" => Some(handle_attendance_mark_all(state, req)),
        "attendance.editOne" => Some(handle_attendance_edit_one(state, req)),
        "attendance.submit" => Some(handle_attendance_submit(state, req)),
        "attendance.studentHistory" => Some(handle_attendance_student_history(state, req)),
        _ => None,
    }
}
