use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> String {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn seed_roster(workspace: &Path, batch_id: &str, students: &[(&str, &str, &str)]) {
    let conn = rusqlite::Connection::open(workspace.join("attendance.sqlite3")).expect("open db");
    conn.execute(
        "INSERT OR IGNORE INTO batches(id, name) VALUES(?, ?)",
        (batch_id, format!("Batch {}", batch_id)),
    )
    .expect("insert batch");
    for (i, (id, last, first)) in students.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO students(id, last_name, first_name, email) VALUES(?, ?, ?, NULL)",
            (id, last, first),
        )
        .expect("insert student");
        conn.execute(
            "INSERT INTO batch_members(batch_id, student_id, sort_order, active) VALUES(?, ?, ?, 1)",
            (batch_id, id, i as i64),
        )
        .expect("insert member");
    }
}

fn entries(session: &serde_json::Value) -> Vec<serde_json::Value> {
    session
        .get("entries")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

fn statuses(session: &serde_json::Value) -> Vec<String> {
    entries(session)
        .iter()
        .map(|e| e.get("status").and_then(|v| v.as_str()).unwrap_or("").to_string())
        .collect()
}

#[test]
fn dates_outside_the_edit_window_are_rejected() {
    let workspace = temp_dir("attendanced-window");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_roster(&workspace, "b1", &[("s1", "Adams", "Ann"), ("s2", "Baker", "Ben")]);

    let window = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.window",
        json!({ "today": "2026-10-17" }),
    );
    assert_eq!(window["minDate"], "2026-10-14");
    assert_eq!(window["maxDate"], "2026-10-17");
    assert_eq!(window["editWindowDays"], 3);

    let submit_nothing = request(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.submit",
        json!({ "today": "2026-10-17" }),
    );
    assert_eq!(error_code(&submit_nothing), "validation_failed");

    let four_back = request(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.select",
        json!({ "batchId": "b1", "date": "2026-10-13", "today": "2026-10-17" }),
    );
    assert_eq!(error_code(&four_back), "validation_failed");

    let tomorrow = request(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.select",
        json!({ "batchId": "b1", "date": "2026-10-18", "today": "2026-10-17" }),
    );
    assert_eq!(error_code(&tomorrow), "validation_failed");

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.select",
        json!({ "batchId": "b1", "date": "17/10/2026", "today": "2026-10-17" }),
    );
    assert_eq!(error_code(&bad_date), "bad_params");

    let three_back = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.select",
        json!({ "batchId": "b1", "date": "2026-10-14", "today": "2026-10-17" }),
    );
    assert_eq!(three_back["state"], "ready");
    assert_eq!(three_back["date"], "2026-10-14");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "attendance.markAll",
        json!({ "status": "present" }),
    );
    // The day rolled over while the draft was open.
    let late_submit = request(
        &mut stdin,
        &mut reader,
        "9",
        "attendance.submit",
        json!({ "today": "2026-10-18" }),
    );
    assert_eq!(error_code(&late_submit), "validation_failed");
    let session = &late_submit["error"]["details"]["session"];
    assert_eq!(session["state"], "ready");
    assert_eq!(statuses(session), vec!["present", "present"]);

    let conn = rusqlite::Connection::open(workspace.join("attendance.sqlite3")).expect("open db");
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM attendance_records", [], |r| r.get(0))
        .expect("count");
    assert_eq!(count, 0);

    drop(conn);
    let _ = std::fs::remove_dir_all(workspace);
}
