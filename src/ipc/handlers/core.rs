use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
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

    match db::open_db(&path) {
        Ok(conn) => {
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn handle_backup_export(req: &Request) -> serde_json::Value {
    let workspace = req.params.get("workspacePath").and_then(|v| v.as_str());
    let out = req.params.get("outPath").and_then(|v| v.as_str());
    let (Some(workspace), Some(out)) = (workspace, out) else {
        return err(
            &req.id,
            "bad_params",
            "missing workspacePath or outPath",
            None,
        );
    };

    match crate::backup::export_workspace_bundle(
        std::path::Path::new(workspace),
        std::path::Path::new(out),
    ) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "dbSha256": summary.db_sha256,
            }),
        ),
        Err(e) => err(&req.id, "backup_export_failed", format!("{e:#}"), None),
    }
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let workspace = req.params.get("workspacePath").and_then(|v| v.as_str());
    let input = req.params.get("inPath").and_then(|v| v.as_str());
    let (Some(workspace), Some(input)) = (workspace, input) else {
        return err(
            &req.id,
            "bad_params",
            "missing workspacePath or inPath",
            None,
        );
    };
    let workspace = PathBuf::from(workspace);

    // Close any open handle to the database being replaced.
    if state.workspace.as_deref() == Some(workspace.as_path()) {
        state.db = None;
    }

    let imported = match crate::backup::import_workspace_bundle(std::path::Path::new(input), &workspace)
    {
        Ok(summary) => summary,
        Err(e) => return err(&req.id, "backup_import_failed", format!("{e:#}"), None),
    };

    match db::open_db(&workspace) {
        Ok(conn) => {
            state.workspace = Some(workspace);
            state.db = Some(conn);
            ok(
                &req.id,
                json!({ "bundleFormatDetected": imported.bundle_format_detected }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "backup.exportWorkspaceBundle" => Some(handle_backup_export(req)),
        "backup.importWorkspaceBundle" => Some(handle_backup_import(state, req)),
        _ => None,
    }
}
