use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::{FilePort, Store};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    if let Err(e) = std::fs::create_dir_all(&path) {
        return err(&req.id, "workspace_open_failed", format!("{e:?}"), None);
    }

    let mut store = Store::open(Box::new(FilePort::new(&path)));

    // Catch up on the cutoff rule for anything that went stale while
    // the daemon was down, then settle the document on disk.
    let today = state.today();
    if let Err(e) = store.update(|data| calc::deactivation_sweep(data, today)) {
        return err(&req.id, "state_write_failed", format!("{e:?}"), None);
    }

    state.workspace = Some(path.clone());
    state.store = Some(store);
    ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
