use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_ranking_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let today = state.today();

    let rankings: Vec<serde_json::Value> = calc::rank_students(store.data(), today)
        .iter()
        .enumerate()
        .map(|(i, r)| {
            json!({
                "position": i + 1,
                "studentId": r.student_id,
                "displayName": r.display_name,
                "totalScore": r.total_score,
                "active": r.active
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "asOf": today.format("%Y-%m-%d").to_string(),
            "rankings": rankings
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "ranking.open" => Some(handle_ranking_open(state, req)),
        _ => None,
    }
}
