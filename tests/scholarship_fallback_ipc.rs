use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

const FALLBACK_JUSTIFICATION: &str =
    "Awarded on attendance records alone; the evaluation service could not be reached.";

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

fn spawn_sidecar(today: &str) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_academyd");
    // Without a credential the external evaluator fails immediately and
    // deterministically, which is exactly the path under test.
    let mut child = Command::new(exe)
        .env("ACADEMY_TODAY", today)
        .env_remove("GEMINI_API_KEY")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn academyd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
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

fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    first: &str,
) -> String {
    let res = request_ok(
        stdin,
        reader,
        id,
        "students.create",
        json!({
            "firstName": first,
            "lastName": "Award",
            "phone": "555-0100",
            "dob": "2008-12-01",
            "monthlyFee": 500
        }),
    );
    res.get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string()
}

fn mark(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    student_id: &str,
    date: &str,
) {
    let _ = request_ok(
        stdin,
        reader,
        id,
        "attendance.mark",
        json!({ "studentId": student_id, "date": date, "status": "present" }),
    );
}

#[test]
fn evaluation_without_credential_takes_the_presence_fallback() {
    let workspace = temp_dir("academyd-scholarship-fallback");
    let (_child, mut stdin, mut reader) = spawn_sidecar("2026-03-12");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let low_id = create_student(&mut stdin, &mut reader, "2", "Low");
    let high_id = create_student(&mut stdin, &mut reader, "3", "High");
    let mid_id = create_student(&mut stdin, &mut reader, "4", "Mid");

    mark(&mut stdin, &mut reader, "5", &low_id, "2026-03-02");
    for (i, date) in ["2026-03-02", "2026-03-03", "2026-03-04"].into_iter().enumerate() {
        mark(&mut stdin, &mut reader, &format!("6-{}", i), &high_id, date);
    }
    for (i, date) in ["2026-03-02", "2026-03-03"].into_iter().enumerate() {
        mark(&mut stdin, &mut reader, &format!("7-{}", i), &mid_id, date);
    }

    let result = request_ok(&mut stdin, &mut reader, "8", "scholarships.evaluate", json!({}));
    assert_eq!(
        result.get("firstPlaceId").and_then(|v| v.as_str()),
        Some(high_id.as_str())
    );
    assert_eq!(
        result.get("secondPlaceId").and_then(|v| v.as_str()),
        Some(mid_id.as_str())
    );
    assert_eq!(
        result.get("justification").and_then(|v| v.as_str()),
        Some(FALLBACK_JUSTIFICATION)
    );
    assert_eq!(result.get("usedFallback").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        result.get("evaluationDate").and_then(|v| v.as_str()),
        Some("2026-03-12")
    );

    // The outcome is kept for the result view.
    let last = request_ok(&mut stdin, &mut reader, "9", "scholarships.last", json!({}));
    assert_eq!(
        last.get("result")
            .and_then(|r| r.get("firstPlaceId"))
            .and_then(|v| v.as_str()),
        Some(high_id.as_str())
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn under_two_students_is_rejected() {
    let workspace = temp_dir("academyd-scholarship-small");
    let (_child, mut stdin, mut reader) = spawn_sidecar("2026-03-12");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let code = request_err_code(&mut stdin, &mut reader, "2", "scholarships.evaluate", json!({}));
    assert_eq!(code, "bad_state");

    let _ = create_student(&mut stdin, &mut reader, "3", "Only");
    let code = request_err_code(&mut stdin, &mut reader, "4", "scholarships.evaluate", json!({}));
    assert_eq!(code, "bad_state");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn results_do_not_survive_a_restart() {
    let workspace = temp_dir("academyd-scholarship-transient");

    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar("2026-03-12");
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "1",
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        let a = create_student(&mut stdin, &mut reader, "2", "A");
        let _ = create_student(&mut stdin, &mut reader, "3", "B");
        mark(&mut stdin, &mut reader, "4", &a, "2026-03-02");
        let _ = request_ok(&mut stdin, &mut reader, "5", "scholarships.evaluate", json!({}));
        drop(stdin);
        let _ = child.wait();
    }

    let (_child, mut stdin, mut reader) = spawn_sidecar("2026-03-12");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let last = request_ok(&mut stdin, &mut reader, "2", "scholarships.last", json!({}));
    assert!(last.get("result").map(|v| v.is_null()).unwrap_or(false));

    let _ = std::fs::remove_dir_all(workspace);
}
