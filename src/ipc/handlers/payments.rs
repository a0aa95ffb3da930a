use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{PaymentRecord, PaymentStatus};
use chrono::Datelike;
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
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("missing {}", key),
            details: None,
        })
}

fn payment_json(p: &PaymentRecord) -> serde_json::Value {
    json!({
        "studentId": p.student_id,
        "month": p.month,
        "year": p.year,
        "paymentDate": p.payment_date,
        "baseAmount": p.base_amount,
        "surcharge": p.surcharge,
        "totalPaid": p.total_paid,
        "status": p.status,
    })
}

fn payments_month_open(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let Some(store) = state.store.as_ref() else {
        return Err(HandlerErr::no_workspace());
    };
    let today = state.today();
    let day = today.day();
    let month = today.month();
    let year = today.year();
    let data = store.data();

    let rows: Vec<serde_json::Value> = data
        .students
        .iter()
        .map(|s| {
            match data.payment_for(&s.id, month, year) {
                Some(p) => json!({
                    "studentId": s.id,
                    "displayName": s.display_name(),
                    "active": s.active,
                    "paid": true,
                    "baseAmount": p.base_amount,
                    "surcharge": p.surcharge,
                    "totalPaid": p.total_paid,
                    "paymentDate": p.payment_date,
                }),
                None => json!({
                    "studentId": s.id,
                    "displayName": s.display_name(),
                    "active": s.active,
                    "paid": false,
                    "baseAmount": s.monthly_fee,
                    // What paying today would cost.
                    "surcharge": calc::surcharge_for_day(day),
                    "totalDue": calc::total_due(s.monthly_fee, day),
                }),
            }
        })
        .collect();

    Ok(json!({
        "month": month,
        "year": year,
        "day": day,
        "surchargeToday": calc::surcharge_for_day(day),
        "tierLabel": calc::surcharge_label(day),
        "rows": rows
    }))
}

fn payments_toggle(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;

    let today = state.today();
    let day = today.day();
    let month = today.month();
    let year = today.year();

    let Some(store) = state.store.as_mut() else {
        return Err(HandlerErr::no_workspace());
    };
    let Some(student) = store.data().student(&student_id) else {
        return Err(HandlerErr {
            code: "not_found",
            message: "student not found".to_string(),
            details: None,
        });
    };
    let monthly_fee = student.monthly_fee;
    let already_paid = store.data().payment_for(&student_id, month, year).is_some();

    let record = store
        .update(|data| {
            if already_paid {
                data.payments.retain(|p| {
                    !(p.student_id == student_id && p.month == month && p.year == year)
                });
                calc::deactivation_sweep(data, today);
                None
            } else {
                let surcharge = calc::surcharge_for_day(day);
                let record = PaymentRecord {
                    student_id: student_id.clone(),
                    month,
                    year,
                    payment_date: Some(chrono::Local::now().to_rfc3339()),
                    base_amount: monthly_fee,
                    surcharge,
                    total_paid: monthly_fee + surcharge,
                    status: PaymentStatus::Paid,
                };
                data.payments.push(record.clone());
                // Paying always brings the student back, whatever
                // deactivated them.
                if let Some(s) = data.student_mut(&student_id) {
                    s.active = true;
                }
                calc::deactivation_sweep(data, today);
                Some(record)
            }
        })
        .map_err(|e| HandlerErr {
            code: "state_write_failed",
            message: e.to_string(),
            details: None,
        })?;

    match record {
        Some(record) => Ok(json!({ "paid": true, "record": payment_json(&record) })),
        None => Ok(json!({ "paid": false })),
    }
}

fn handle_payments_month_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    match payments_month_open(state) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_payments_toggle(state: &mut AppState, req: &Request) -> serde_json::Value {
    match payments_toggle(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "payments.monthOpen" => Some(handle_payments_month_open(state, req)),
        "payments.toggle" => Some(handle_payments_toggle(state, req)),
        _ => None,
    }
}
