use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use sha2::{Digest, Sha256};

/// Cache key is the sha256 of the compact JSON of the request payload, so
/// identical generation requests from any client hit the same row.
fn request_hash(request: &serde_json::Value) -> String {
    let canonical = serde_json::to_string(request).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn handle_cache_check(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "hit": false, "response": null }));
    };
    let Some(request) = req.params.get("request") else {
        return err(&req.id, "bad_params", "missing params.request", None);
    };

    let hash = request_hash(request);
    let cached: Option<String> = match conn
        .query_row("SELECT response FROM ai_cache WHERE hash = ?", [&hash], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    match cached {
        Some(text) => {
            let response: serde_json::Value =
                serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
            ok(&req.id, json!({ "hit": true, "hash": hash, "response": response }))
        }
        None => ok(&req.id, json!({ "hit": false, "hash": hash, "response": null })),
    }
}

fn handle_cache_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(request) = req.params.get("request") else {
        return err(&req.id, "bad_params", "missing params.request", None);
    };
    let Some(response) = req.params.get("response") else {
        return err(&req.id, "bad_params", "missing params.response", None);
    };

    let hash = request_hash(request);
    let text = match serde_json::to_string(response) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    // First writer wins when concurrent clients cache the same request.
    if let Err(e) = conn.execute(
        "INSERT OR IGNORE INTO ai_cache(hash, response) VALUES(?, ?)",
        (&hash, &text),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "hash": hash }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "ai.cacheCheck" => Some(handle_cache_check(state, req)),
        "ai.cacheSave" => Some(handle_cache_save(state, req)),
        _ => None,
    }
}
