use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::ScholarshipResult;
use crate::scholarship::{self, EvalError};
use serde_json::json;

fn handle_scholarships_evaluate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let today = state.today();
    let summaries = {
        let Some(store) = state.store.as_ref() else {
            return err(&req.id, "no_workspace", "select a workspace first", None);
        };
        scholarship::build_summaries(store.data(), today)
    };
    let month_name = today.format("%B").to_string();

    match scholarship::evaluate_with_fallback(state.evaluator.as_ref(), &month_name, &summaries) {
        Ok((winners, used_fallback)) => {
            let result = ScholarshipResult {
                first_place_id: winners.first_place_id,
                second_place_id: winners.second_place_id,
                justification: winners.justification,
                evaluation_date: today.format("%Y-%m-%d").to_string(),
                used_fallback,
            };
            state.last_evaluation = Some(result.clone());
            ok(
                &req.id,
                serde_json::to_value(&result).unwrap_or_else(|_| json!({})),
            )
        }
        Err(e @ EvalError::RosterTooSmall) => err(&req.id, "bad_state", e.to_string(), None),
        Err(e) => err(&req.id, "evaluation_failed", e.to_string(), None),
    }
}

fn handle_scholarships_last(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "result": state.last_evaluation }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scholarships.evaluate" => Some(handle_scholarships_evaluate(state, req)),
        "scholarships.last" => Some(handle_scholarships_last(state, req)),
        _ => None,
    }
}
