use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

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
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

fn get_required_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

fn student_json(s: &Student) -> serde_json::Value {
    json!({
        "id": s.id,
        "firstName": s.first_name,
        "lastName": s.last_name,
        "phone": s.phone,
        "dob": s.dob,
        "monthlyFee": s.monthly_fee,
        "registrationDate": s.registration_date,
        "conditions": s.conditions,
        "active": s.active
    })
}

fn students_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let Some(store) = state.store.as_ref() else {
        return Ok(json!({ "students": [] }));
    };
    let students: Vec<serde_json::Value> =
        store.data().students.iter().map(student_json).collect();
    Ok(json!({ "students": students }))
}

fn students_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let first_name = get_required_str(params, "firstName")?;
    let last_name = get_required_str(params, "lastName")?;
    let phone = get_required_str(params, "phone")?;
    let dob = get_required_str(params, "dob")?;
    let monthly_fee = get_required_f64(params, "monthlyFee")?;
    let conditions = params
        .get("conditions")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    if first_name.trim().is_empty() || last_name.trim().is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    if NaiveDate::parse_from_str(&dob, "%Y-%m-%d").is_err() {
        return Err(HandlerErr::bad_params("dob must be YYYY-MM-DD"));
    }

    let today = state.today();
    let Some(store) = state.store.as_mut() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        });
    };

    let student = Student {
        id: Uuid::new_v4().to_string(),
        first_name: first_name.trim().to_string(),
        last_name: last_name.trim().to_string(),
        phone,
        dob,
        monthly_fee,
        registration_date: today.format("%Y-%m-%d").to_string(),
        conditions,
        active: true,
    };
    let student_id = student.id.clone();

    store
        .update(|data| {
            data.students.push(student);
            calc::deactivation_sweep(data, today);
        })
        .map_err(|e| HandlerErr {
            code: "state_write_failed",
            message: e.to_string(),
            details: None,
        })?;

    Ok(json!({ "studentId": student_id }))
}

fn students_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let Some(patch) = params.get("patch").filter(|v| v.is_object()) else {
        return Err(HandlerErr::bad_params("missing patch"));
    };
    // The active flag is derived from payments and the sweep, never set
    // directly.
    if patch.get("active").is_some() {
        return Err(HandlerErr::bad_params("active is not patchable"));
    }
    if let Some(dob) = patch.get("dob") {
        let Some(dob) = dob.as_str() else {
            return Err(HandlerErr::bad_params("dob must be a string"));
        };
        if NaiveDate::parse_from_str(dob, "%Y-%m-%d").is_err() {
            return Err(HandlerErr::bad_params("dob must be YYYY-MM-DD"));
        }
    }

    let today = state.today();
    let Some(store) = state.store.as_mut() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        });
    };
    if store.data().student(&student_id).is_none() {
        return Err(HandlerErr {
            code: "not_found",
            message: "student not found".to_string(),
            details: None,
        });
    }

    let patch = patch.clone();
    store
        .update(|data| {
            let Some(student) = data.student_mut(&student_id) else {
                return;
            };
            if let Some(v) = patch.get("firstName").and_then(|v| v.as_str()) {
                student.first_name = v.trim().to_string();
            }
            if let Some(v) = patch.get("lastName").and_then(|v| v.as_str()) {
                student.last_name = v.trim().to_string();
            }
            if let Some(v) = patch.get("phone").and_then(|v| v.as_str()) {
                student.phone = v.to_string();
            }
            if let Some(v) = patch.get("dob").and_then(|v| v.as_str()) {
                student.dob = v.to_string();
            }
            if let Some(v) = patch.get("monthlyFee").and_then(|v| v.as_f64()) {
                student.monthly_fee = v;
            }
            if let Some(v) = patch.get("conditions").and_then(|v| v.as_str()) {
                student.conditions = v.to_string();
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

fn students_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;

    let today = state.today();
    let Some(store) = state.store.as_mut() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        });
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
            // Dependent records go with the student; nothing may dangle.
            data.attendance.retain(|r| r.student_id != student_id);
            data.payments.retain(|p| p.student_id != student_id);
            data.students.retain(|s| s.id != student_id);
            calc::deactivation_sweep(data, today);
        })
        .map_err(|e| HandlerErr {
            code: "state_write_failed",
            message: e.to_string(),
            details: None,
        })?;

    Ok(json!({ "ok": true }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    match students_list(state) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    match students_create(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    match students_update(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    match students_delete(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
