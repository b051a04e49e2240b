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
fn save_is_all_or_nothing_when_a_permission_note_is_missing() {
    let mut f = open_class("rollcall-save-validate", &["Ames", "Bell"]);
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
        json!({ "studentId": ids[0], "status": "present" }),
    );
    f.ok(
        "3",
        "attendance.setStatus",
        json!({ "studentId": ids[1], "status": "excusedPermission" }),
    );
    f.ok(
        "4",
        "attendance.setNote",
        json!({ "studentId": ids[1], "note": "   " }),
    );

    let rejected = f.call("5", "attendance.save", json!({}));
    assert_eq!(error_code(&rejected), "validation_failed");
    assert_eq!(
        rejected["error"]["details"]["studentIds"],
        json!([ids[1].clone()])
    );

    let state = f.ok("6", "attendance.state", json!({}));
    assert_eq!(state["dirtyCount"], 2);

    // Nothing reached the store: a fresh open sees the original baseline.
    f.ok("7", "attendance.close", json!({}));
    let reopened = f.ok(
        "8",
        "attendance.open",
        json!({ "classId": class_id, "date": "2026-10-16" }),
    );
    assert!(reopened["records"]
        .as_array()
        .expect("records")
        .iter()
        .all(|r| r["status"] == "unmarked"));
}

#[test]
fn saved_records_survive_reopen_and_clear_the_dirty_set() {
    let mut f = open_class("rollcall-save-ok", &["Ames", "Bell", "Cruz"]);
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
        json!({ "studentId": ids[0], "status": "late", "at": "2026-10-16T08:20:00+00:00" }),
    );
    f.ok(
        "3",
        "attendance.toggleViolation",
        json!({ "studentId": ids[0], "kind": "conduct" }),
    );
    f.ok(
        "4",
        "attendance.setStatus",
        json!({ "studentId": ids[1], "status": "excusedPermission" }),
    );
    f.ok(
        "5",
        "attendance.setNote",
        json!({ "studentId": ids[1], "note": "dentist appointment" }),
    );

    let saved = f.ok("6", "attendance.save", json!({}));
    assert_eq!(saved["saved"], 2);
    assert_eq!(saved["accepted"], 2);
    assert_eq!(saved["dirtyCount"], 0);

    let again = f.ok("7", "attendance.save", json!({}));
    assert_eq!(again["saved"], 0);

    f.ok("8", "attendance.close", json!({}));
    let reopened = f.ok(
        "9",
        "attendance.open",
        json!({ "classId": class_id, "date": "2026-10-16" }),
    );
    assert_eq!(reopened["dirtyCount"], 0);
    assert_eq!(record(&reopened, &ids[0])["status"], "late");
    assert_eq!(record(&reopened, &ids[0])["violations"], json!(["conduct"]));
    assert_eq!(record(&reopened, &ids[1])["status"], "excusedPermission");
    assert_eq!(record(&reopened, &ids[1])["teachersNote"], "dentist appointment");
    assert_eq!(record(&reopened, &ids[2])["status"], "unmarked");

    // Another day starts from scratch.
    let next_day = f.ok(
        "10",
        "attendance.open",
        json!({ "classId": class_id, "date": "2026-10-17" }),
    );
    assert!(next_day["records"]
        .as_array()
        .expect("records")
        .iter()
        .all(|r| r["status"] == "unmarked"));
}
