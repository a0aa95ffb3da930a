use crate::backup;
use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::{FilePort, Store};
use serde_json::json;
use std::path::PathBuf;

fn resolve_workspace(state: &AppState, params: &serde_json::Value) -> Option<PathBuf> {
    params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone())
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(out_path) = req.params.get("outPath").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };
    let Some(workspace) = resolve_workspace(state, &req.params) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match backup::export_workspace_bundle(&workspace, &PathBuf::from(out_path)) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "entryCount": summary.entry_count,
                "outPath": out_path
            }),
        ),
        Err(e) => err(&req.id, "export_failed", format!("{e:?}"), None),
    }
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(in_path) = req.params.get("inPath").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };
    let Some(workspace) = resolve_workspace(state, &req.params) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let summary = match backup::import_workspace_bundle(&PathBuf::from(in_path), &workspace) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "import_failed", format!("{e:?}"), None),
    };

    // The restored document replaces whatever the store held for the
    // selected workspace.
    if state.workspace.as_deref() == Some(workspace.as_path()) {
        let mut store = Store::open(Box::new(FilePort::new(&workspace)));
        let today = state.today();
        if let Err(e) = store.update(|data| calc::deactivation_sweep(data, today)) {
            return err(&req.id, "state_write_failed", format!("{e:?}"), None);
        }
        state.store = Some(store);
    }

    ok(
        &req.id,
        json!({ "bundleFormatDetected": summary.bundle_format_detected }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_export_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_import_bundle(state, req)),
        _ => None,
    }
}
