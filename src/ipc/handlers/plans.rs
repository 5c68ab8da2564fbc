use crate::db;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::plan_io;
use rusqlite::OptionalExtension;
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The host app caps archived plans per account.
const MAX_PLANS_PER_OWNER: i64 = 30;

fn require_str<'a>(req: &'a Request, field: &str) -> Result<&'a str, serde_json::Value> {
    match req.params.get(field).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(err(
            &req.id,
            "bad_params",
            format!("missing {}", field),
            None,
        )),
    }
}

/// Parsed plan row, with `data` substituted by null when the stored text is
/// corrupt. The stored text itself is never touched.
fn plan_row_json(
    id: String,
    name: String,
    data: &str,
    created_at: i64,
    smart_generated: bool,
    generated_by: Option<String>,
    share_id: Option<String>,
) -> serde_json::Value {
    let parsed = match plan_io::deserialize_selection(data) {
        Ok(selection) => serde_json::to_value(selection).unwrap_or(serde_json::Value::Null),
        Err(_) => serde_json::Value::Null,
    };
    json!({
        "id": id,
        "name": name,
        "data": parsed,
        "createdAt": created_at,
        "smartGenerated": smart_generated,
        "generatedBy": generated_by,
        "shareId": share_id,
    })
}

fn handle_plans_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let owner_id = match require_str(req, "ownerId") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };
    let name = match require_str(req, "name") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    let data = match require_str(req, "data") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };

    // Reject unreadable plans up front; a saved plan must always decode.
    if let Err(e) = plan_io::deserialize_selection(&data) {
        return engine_err(&req.id, e);
    }

    let count: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM plans WHERE owner_id = ?",
        [&owner_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if count >= MAX_PLANS_PER_OWNER {
        return err(
            &req.id,
            "plan_limit_reached",
            format!(
                "maximum limit of {} plans reached; delete some plans to save a new one",
                MAX_PLANS_PER_OWNER
            ),
            None,
        );
    }

    let smart_generated = req
        .params
        .get("smartGenerated")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let generated_by = req
        .params
        .get("generatedBy")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let plan_id = Uuid::new_v4().to_string();
    let created_at = db::now_millis();
    if let Err(e) = conn.execute(
        "INSERT INTO plans(id, owner_id, name, data, created_at, smart_generated, generated_by)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &plan_id,
            &owner_id,
            &name,
            &data,
            created_at,
            smart_generated as i64,
            &generated_by,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "plans" })),
        );
    }
    let _ = db::log_audit(conn, &owner_id, "plans.save", Some(&name));

    ok(
        &req.id,
        json!({ "planId": plan_id, "name": name, "createdAt": created_at }),
    )
}

fn handle_plans_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "plans": [] }));
    };
    let owner_id = match require_str(req, "ownerId") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };

    let mut stmt = match conn.prepare(
        "SELECT id, name, data, created_at, smart_generated, generated_by, share_id
         FROM plans
         WHERE owner_id = ?
         ORDER BY created_at DESC, id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&owner_id], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let data: String = row.get(2)?;
            let created_at: i64 = row.get(3)?;
            let smart_generated: i64 = row.get(4)?;
            let generated_by: Option<String> = row.get(5)?;
            let share_id: Option<String> = row.get(6)?;
            Ok(plan_row_json(
                id,
                name,
                &data,
                created_at,
                smart_generated != 0,
                generated_by,
                share_id,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(plans) => ok(&req.id, json!({ "plans": plans })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

/// Ownership gate shared by rename/delete/share.
fn owned_plan_exists(
    conn: &rusqlite::Connection,
    owner_id: &str,
    plan_id: &str,
) -> Result<bool, rusqlite::Error> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM plans WHERE id = ? AND owner_id = ?",
            (plan_id, owner_id),
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn handle_plans_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let owner_id = match require_str(req, "ownerId") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };
    let plan_id = match require_str(req, "planId") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };
    let new_name = match require_str(req, "newName") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };

    match owned_plan_exists(conn, &owner_id, &plan_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "plan not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    if let Err(e) = conn.execute(
        "UPDATE plans SET name = ? WHERE id = ?",
        (&new_name, &plan_id),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    let _ = db::log_audit(conn, &owner_id, "plans.rename", Some(&new_name));

    ok(&req.id, json!({ "planId": plan_id, "name": new_name }))
}

fn handle_plans_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let owner_id = match require_str(req, "ownerId") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };
    let plan_id = match require_str(req, "planId") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };

    match owned_plan_exists(conn, &owner_id, &plan_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "plan not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    if let Err(e) = conn.execute("DELETE FROM plans WHERE id = ?", [&plan_id]) {
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }
    let _ = db::log_audit(conn, &owner_id, "plans.delete", Some(&plan_id));

    ok(&req.id, json!({ "ok": true }))
}

fn handle_plans_share(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let owner_id = match require_str(req, "ownerId") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };
    let plan_id = match require_str(req, "planId") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };

    let existing: Option<Option<String>> = match conn
        .query_row(
            "SELECT share_id FROM plans WHERE id = ? AND owner_id = ?",
            (&plan_id, &owner_id),
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(existing) = existing else {
        return err(&req.id, "not_found", "plan not found", None);
    };

    // A token, once generated, stays stable for the plan's lifetime.
    if let Some(share_id) = existing {
        return ok(&req.id, json!({ "shareId": share_id }));
    }

    let mut hasher = Sha256::new();
    hasher.update(plan_id.as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    let share_id = format!("{:x}", hasher.finalize())[..10].to_string();

    if let Err(e) = conn.execute(
        "UPDATE plans SET share_id = ? WHERE id = ?",
        (&share_id, &plan_id),
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    let _ = db::log_audit(conn, &owner_id, "plans.share", Some(&plan_id));

    ok(&req.id, json!({ "shareId": share_id }))
}

fn handle_plans_shared_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let share_id = match require_str(req, "shareId") {
        Ok(v) => v.to_string(),
        Err(resp) => return resp,
    };

    // Read-only lookup by token; no ownership check by design.
    let row: Option<(String, String, String, i64, i64, Option<String>)> = match conn
        .query_row(
            "SELECT id, name, data, created_at, smart_generated, generated_by
             FROM plans WHERE share_id = ?",
            [&share_id],
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                ))
            },
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let Some((id, name, data, created_at, smart_generated, generated_by)) = row else {
        return ok(&req.id, json!({ "plan": null }));
    };

    // Unknown token and corrupt payload look the same to the viewer.
    let plan = match plan_io::deserialize_selection(&data) {
        Ok(selection) => json!({
            "id": id,
            "name": name,
            "data": serde_json::to_value(selection).unwrap_or(serde_json::Value::Null),
            "createdAt": created_at,
            "smartGenerated": smart_generated != 0,
            "generatedBy": generated_by,
        }),
        Err(_) => serde_json::Value::Null,
    };

    ok(&req.id, json!({ "plan": plan }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "plans.save" => Some(handle_plans_save(state, req)),
        "plans.list" => Some(handle_plans_list(state, req)),
        "plans.rename" => Some(handle_plans_rename(state, req)),
        "plans.delete" => Some(handle_plans_delete(state, req)),
        "plans.share" => Some(handle_plans_share(state, req)),
        "plans.sharedGet" => Some(handle_plans_shared_get(state, req)),
        _ => None,
    }
}
