use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::schedule::Offering;
use rusqlite::OptionalExtension;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// Master catalog row as supplied by the admin import. The offering fields
/// reuse the wire shape of plan data; `prodi` and `semester` scope the row.
#[derive(Debug, Clone, Deserialize)]
struct CatalogRow {
    #[serde(flatten)]
    offering: Offering,
    prodi: String,
    semester: i64,
}

fn handle_curriculum_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "courses": [] }));
    };

    let prodi = req.params.get("prodi").and_then(|v| v.as_str());
    let semester = req.params.get("semester").and_then(|v| v.as_i64());
    let search = req
        .params
        .get("search")
        .and_then(|v| v.as_str())
        .map(|s| s.to_lowercase());

    let mut stmt = match conn.prepare(
        "SELECT id, code, name, sks, prodi, semester, section, lecturer, room, schedule
         FROM curriculum
         ORDER BY code, section",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let code: String = row.get(1)?;
            let name: String = row.get(2)?;
            let sks: i64 = row.get(3)?;
            let row_prodi: String = row.get(4)?;
            let row_semester: i64 = row.get(5)?;
            let section: String = row.get(6)?;
            let lecturer: String = row.get(7)?;
            let room: String = row.get(8)?;
            let schedule: String = row.get(9)?;
            Ok((
                id,
                code,
                name,
                sks,
                row_prodi,
                row_semester,
                section,
                lecturer,
                room,
                schedule,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    let rows = match rows {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut courses = Vec::new();
    for (id, code, name, sks, row_prodi, row_semester, section, lecturer, room, schedule) in rows {
        if prodi.map(|p| p != row_prodi).unwrap_or(false) {
            continue;
        }
        if semester.map(|s| s != row_semester).unwrap_or(false) {
            continue;
        }
        if let Some(q) = &search {
            if !code.to_lowercase().contains(q) && !name.to_lowercase().contains(q) {
                continue;
            }
        }
        let schedule: serde_json::Value =
            serde_json::from_str(&schedule).unwrap_or(serde_json::Value::Null);
        courses.push(json!({
            "id": id,
            "code": code,
            "name": name,
            "sks": sks,
            "prodi": row_prodi,
            "semester": row_semester,
            "class": section,
            "lecturer": lecturer,
            "room": room,
            "schedule": schedule,
        }));
    }

    ok(&req.id, json!({ "courses": courses }))
}

fn handle_curriculum_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(raw) = req.params.get("courses") else {
        return err(&req.id, "bad_params", "missing params.courses", None);
    };

    let rows: Vec<CatalogRow> = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid catalog batch: {}", e),
                None,
            )
        }
    };
    for row in &rows {
        if let Err(e) = row.offering.validate() {
            return engine_err(&req.id, e);
        }
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    let mut inserted = 0usize;
    let mut updated = 0usize;
    for row in &rows {
        let o = &row.offering;
        let schedule_text =
            serde_json::to_string(&o.schedule).unwrap_or_else(|_| "[]".to_string());

        let existing: Result<Option<String>, _> = tx
            .query_row(
                "SELECT id FROM curriculum WHERE code = ? AND section = ?",
                (&o.code, &o.section),
                |r| r.get(0),
            )
            .optional();
        let existing = match existing {
            Ok(v) => v,
            Err(e) => {
                let _ = tx.rollback();
                return err(&req.id, "db_query_failed", e.to_string(), None);
            }
        };

        let result = match existing {
            Some(id) => {
                updated += 1;
                tx.execute(
                    "UPDATE curriculum
                     SET name = ?, sks = ?, prodi = ?, semester = ?, lecturer = ?, room = ?, schedule = ?
                     WHERE id = ?",
                    (
                        &o.name,
                        o.sks as i64,
                        &row.prodi,
                        row.semester,
                        &o.lecturer,
                        &o.room,
                        &schedule_text,
                        &id,
                    ),
                )
            }
            None => {
                inserted += 1;
                tx.execute(
                    "INSERT INTO curriculum(id, code, name, sks, prodi, semester, section, lecturer, room, schedule)
                     VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    (
                        Uuid::new_v4().to_string(),
                        &o.code,
                        &o.name,
                        o.sks as i64,
                        &row.prodi,
                        row.semester,
                        &o.section,
                        &o.lecturer,
                        &o.room,
                        &schedule_text,
                    ),
                )
            }
        };
        if let Err(e) = result {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "curriculum" })),
            );
        }
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "inserted": inserted, "updated": updated }))
}

fn handle_curriculum_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let curriculum_id = match req.params.get("curriculumId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing curriculumId", None),
    };

    let affected = match conn.execute("DELETE FROM curriculum WHERE id = ?", [&curriculum_id]) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_delete_failed", e.to_string(), None),
    };
    if affected == 0 {
        return err(&req.id, "not_found", "curriculum entry not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "curriculum.list" => Some(handle_curriculum_list(state, req)),
        "curriculum.import" => Some(handle_curriculum_import(state, req)),
        "curriculum.delete" => Some(handle_curriculum_delete(state, req)),
        _ => None,
    }
}
