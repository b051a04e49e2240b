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
        .env_remove("ROLLCALL_VERSION_URL")
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

#[test]
fn version_changes_request_a_reload() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "update.check",
        json!({ "version": "1.4.0" }),
    );
    assert_eq!(first["result"], "firstSeen");
    assert_eq!(first["reloadRequired"], false);
    let cache = first["cacheName"].as_str().expect("cacheName").to_string();
    assert!(cache.starts_with("rollcall-cache-v1.4.0-"));

    let same = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "update.check",
        json!({ "version": "1.4.0" }),
    );
    assert_eq!(same["result"], "unchanged");
    assert_eq!(same["reloadRequired"], false);

    let bumped = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "update.check",
        json!({ "version": "1.5.0" }),
    );
    assert_eq!(bumped["result"], "changed");
    assert_eq!(bumped["previous"], "1.4.0");
    assert_eq!(bumped["current"], "1.5.0");
    assert_eq!(bumped["reloadRequired"], true);
    assert_ne!(bumped["cacheName"], cache.as_str());
    assert!(bumped["pollIntervalSecs"].as_u64().expect("poll") > 0);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn missing_version_without_endpoint_is_bad_params() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(&mut stdin, &mut reader, "1", "update.check", json!({}));
    assert_eq!(error_code(&resp), "bad_params");
    drop(stdin);
    let _ = child.wait();
}
