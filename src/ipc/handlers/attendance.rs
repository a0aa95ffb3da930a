use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceRecord, AttendanceStatus};
use chrono::NaiveDate;
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

    fn no_workspace() -> Self {
        Self {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
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

fn parse_date(raw: &str) -> Result<String, HandlerErr> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| HandlerErr::bad_params("date must be YYYY-MM-DD"))
}

/// A null or absent status clears the mark for that day.
fn parse_optional_status(v: Option<&serde_json::Value>) -> Result<Option<AttendanceStatus>, HandlerErr> {
    let Some(v) = v else { return Ok(None) };
    if v.is_null() {
        return Ok(None);
    }
    let Some(s) = v.as_str() else {
        return Err(HandlerErr::bad_params("status must be string or null"));
    };
    AttendanceStatus::parse(s)
        .map(Some)
        .ok_or_else(|| HandlerErr::bad_params("status must be present|late|absent|justified"))
}

fn attendance_day_open(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = parse_date(&get_required_str(params, "date")?)?;
    let Some(store) = state.store.as_ref() else {
        return Err(HandlerErr::no_workspace());
    };
    let data = store.data();

    // The roll-call sheet lists active students only.
    let students: Vec<serde_json::Value> = data
        .students
        .iter()
        .filter(|s| s.active)
        .map(|s| {
            json!({
                "id": s.id,
                "displayName": s.display_name(),
            })
        })
        .collect();
    let marks: Vec<serde_json::Value> = data
        .attendance
        .iter()
        .filter(|r| r.date == date)
        .map(|r| {
            json!({
                "studentId": r.student_id,
                "status": r.status.as_str(),
            })
        })
        .collect();

    Ok(json!({
        "date": date,
        "students": students,
        "marks": marks
    }))
}

fn attendance_mark(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let date = parse_date(&get_required_str(params, "date")?)?;
    let status = parse_optional_status(params.get("status"))?;

    let today = state.today();
    let Some(store) = state.store.as_mut() else {
        return Err(HandlerErr::no_workspace());
    };
    if store.data().student(&student_id).is_none() {
        return Err(HandlerErr {
            code: "not_found",
            message: "student not found".to_string(),
            details: None,
        });
    }

    store
        .update(|data| {
            // Last write wins: drop any prior mark for the pair first.
            data.attendance
                .retain(|r| !(r.student_id == student_id && r.date == date));
            if let Some(status) = status {
                data.attendance.push(AttendanceRecord {
                    student_id: student_id.clone(),
                    date: date.clone(),
                    status,
                });
            }
            calc::deactivation_sweep(data, today);
        })
        .map_err(|e| HandlerErr {
            code: "state_write_failed",
            message: e.to_string(),
            details: None,
        })?;

    Ok(json!({ "ok": true }))
}

fn handle_attendance_day_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    match attendance_day_open(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    match attendance_mark(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.dayOpen" => Some(handle_attendance_day_open(state, req)),
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        _ => None,
    }
}
