use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
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
    let exe = env!("CARGO_BIN_EXE_rollcalld");
    let mut child = Command::new(exe)
        .env_remove("ROLLCALL_API_BASE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollcalld");
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

fn record<'a>(view: &'a serde_json::Value, student_id: &str) -> &'a serde_json::Value {
    view["records"]
        .as_array()
        .expect("records")
        .iter()
        .find(|r| r["studentId"] == student_id)
        .expect("record for student")
}

struct Fixture {
    _child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    class_id: String,
    students: Vec<String>,
}

impl Fixture {
    fn ok(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        request_ok(&mut self.stdin, &mut self.reader, id, method, params)
    }

    fn call(&mut self, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
        request(&mut self.stdin, &mut self.reader, id, method, params)
    }
}

fn open_class(prefix: &str, names: &[&str]) -> Fixture {
    let workspace = temp_dir(prefix);
    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let class_id = request_ok(
        &mut stdin,
        &mut reader,
        "class",
        "classes.create",
        json!({ "name": "9B", "startTime": "08:00" }),
    )["classId"]
        .as_str()
        .expect("classId")
        .to_string();
    let mut students = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let created = request_ok(
            &mut stdin,
            &mut reader,
            &format!("student-{}", i),
            "students.create",
            json!({ "classId": class_id, "lastName": name, "firstName": "Test" }),
        );
        students.push(created["studentId"].as_str().expect("studentId").to_string());
    }
    Fixture {
        _child: child,
        stdin,
        reader,
        class_id,
        students,
    }
}

#[test]
fn open_lists_every_roster_student_unmarked() {
    let mut f = open_class("rollcall-open", &["Ames", "Bell", "Cruz"]);
    let class_id = f.class_id.clone();
    let view = f.ok(
        "1",
        "attendance.open",
        json!({ "classId": class_id, "date": "2026-10-16" }),
    );
    assert_eq!(view["startTime"], "08:00");
    assert_eq!(view["date"], "2026-10-16");
    assert_eq!(view["dirtyCount"], 0);
    assert_eq!(view["hasUnsavedChanges"], false);
    let records = view["records"].as_array().expect("records");
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r["status"] == "unmarked"));
    assert!(records.iter().all(|r| r["isSelected"] == false));

    let missing = f.call("2", "attendance.open", json!({ "classId": "nope" }));
    assert_eq!(error_code(&missing), "not_found");
}

#[test]
fn select_all_skips_present_and_bulk_marks_the_rest() {
    let mut f = open_class("rollcall-bulk", &["Ames", "Bell", "Cruz", "Diaz"]);
    let class_id = f.class_id.clone();
    let ids = f.students.clone();
    f.ok(
        "1",
        "attendance.open",
        json!({ "classId": class_id, "date": "2026-10-16" }),
    );
    f.ok(
        "2",
        "attendance.setStatus",
        json!({ "studentId": ids[3], "status": "present" }),
    );

    let view = f.ok("3", "attendance.toggleSelectAll", json!({}));
    assert_eq!(view["selectAll"], true);
    for id in &ids[..3] {
        assert_eq!(record(&view, id)["isSelected"], true);
    }
    assert_eq!(record(&view, &ids[3])["isSelected"], false);

    let view = f.ok(
        "4",
        "attendance.applyBulkStatus",
        json!({ "status": "excusedSick", "at": "2026-10-16T08:05:00+07:00" }),
    );
    for id in &ids[..3] {
        assert_eq!(record(&view, id)["status"], "excusedSick");
        assert_eq!(record(&view, id)["isSelected"], false);
    }
    assert_eq!(record(&view, &ids[3])["status"], "present");
    assert_eq!(view["dirtyCount"], 4);
    assert_eq!(view["selectAll"], false);
}

#[test]
fn toggle_selected_round_trips_and_attending_forces_off() {
    let mut f = open_class("rollcall-select", &["Ames"]);
    let class_id = f.class_id.clone();
    let sid = f.students[0].clone();
    f.ok(
        "1",
        "attendance.open",
        json!({ "classId": class_id, "date": "2026-10-16" }),
    );
    let on = f.ok("2", "attendance.toggleSelected", json!({ "studentId": sid }));
    assert_eq!(on["record"]["isSelected"], true);
    assert_eq!(on["dirtyCount"], 0);
    let off = f.ok("3", "attendance.toggleSelected", json!({ "studentId": sid }));
    assert_eq!(off["record"]["isSelected"], false);

    f.ok("4", "attendance.toggleSelected", json!({ "studentId": sid }));
    let late = f.ok(
        "5",
        "attendance.setStatus",
        json!({ "studentId": sid, "status": "late" }),
    );
    assert_eq!(late["record"]["isSelected"], false);
    assert!(late["record"]["timestamp"].is_string());

    let still_off = f.ok("6", "attendance.toggleSelected", json!({ "studentId": sid }));
    assert_eq!(still_off["record"]["isSelected"], false);
}

#[test]
fn flags_notes_and_dirty_tracking() {
    let mut f = open_class("rollcall-flags", &["Ames"]);
    let class_id = f.class_id.clone();
    let sid = f.students[0].clone();
    f.ok(
        "1",
        "attendance.open",
        json!({ "classId": class_id, "date": "2026-10-16" }),
    );

    let blocked = f.call(
        "2",
        "attendance.toggleViolation",
        json!({ "studentId": sid, "kind": "attire" }),
    );
    assert_eq!(error_code(&blocked), "not_attending");

    f.ok(
        "3",
        "attendance.setStatus",
        json!({ "studentId": sid, "status": "present" }),
    );
    let v = f.ok(
        "4",
        "attendance.toggleViolation",
        json!({ "studentId": sid, "kind": "attire" }),
    );
    assert_eq!(v["record"]["violations"], json!(["attire"]));
    let a = f.ok(
        "5",
        "attendance.setAttributes",
        json!({ "studentId": sid, "attributes": { "idCard": false, "uniform": true } }),
    );
    assert_eq!(a["record"]["attributes"]["uniform"], true);

    let bad = f.call(
        "6",
        "attendance.setAttributes",
        json!({ "studentId": sid, "attributes": { "uniform": "yes" } }),
    );
    assert_eq!(error_code(&bad), "bad_params");

    let unknown = f.call(
        "7",
        "attendance.setNote",
        json!({ "studentId": "ghost", "note": "?" }),
    );
    assert_eq!(error_code(&unknown), "not_found");

    // Going back to unmarked clears the flags, so the record matches its baseline again.
    let reverted = f.ok(
        "8",
        "attendance.setStatus",
        json!({ "studentId": sid, "status": "unmarked" }),
    );
    assert_eq!(reverted["dirtyCount"], 0);
    assert_eq!(reverted["record"]["violations"], json!([]));

    let closed = f.ok("9", "attendance.close", json!({}));
    assert_eq!(closed["discardedUnsaved"], 0);
    let gone = f.call("10", "attendance.state", json!({}));
    assert_eq!(error_code(&gone), "no_session");
}

#[test]
fn closing_with_unsaved_changes_reports_them() {
    let mut f = open_class("rollcall-close", &["Ames", "Bell"]);
    let class_id = f.class_id.clone();
    let ids = f.students.clone();
    f.ok(
        "1",
        "attendance.open",
        json!({ "classId": class_id, "date": "2026-10-16" }),
    );
    f.ok(
        "2",
        "attendance.setNote",
        json!({ "studentId": ids[0], "note": "asked to see counselor" }),
    );
    f.ok(
        "3",
        "attendance.setStatus",
        json!({ "studentId": ids[1], "status": "late" }),
    );
    let state = f.ok("4", "attendance.state", json!({}));
    assert_eq!(state["hasUnsavedChanges"], true);
    let mut dirty: Vec<String> = state["dirtyStudentIds"]
        .as_array()
        .expect("dirty ids")
        .iter()
        .map(|v| v.as_str().expect("id").to_string())
        .collect();
    dirty.sort();
    let mut expected = ids.clone();
    expected.sort();
    assert_eq!(dirty, expected);

    let closed = f.ok("5", "attendance.close", json!({}));
    assert_eq!(closed["discardedUnsaved"], 2);
}
