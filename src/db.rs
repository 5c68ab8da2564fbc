use chrono::Utc;
use rusqlite::Connection;
use std::path::Path;
use uuid::Uuid;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("krs.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS plans(
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            smart_generated INTEGER NOT NULL DEFAULT 0,
            generated_by TEXT,
            share_id TEXT UNIQUE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_plans_owner ON plans(owner_id)",
        [],
    )?;

    // Workspaces created before share links existed lack the column.
    ensure_plans_share_id(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_plans_share ON plans(share_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS curriculum(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            sks INTEGER NOT NULL,
            prodi TEXT NOT NULL,
            semester INTEGER NOT NULL,
            section TEXT NOT NULL,
            lecturer TEXT NOT NULL,
            room TEXT NOT NULL,
            schedule TEXT NOT NULL,
            UNIQUE(code, section)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_curriculum_prodi_semester ON curriculum(prodi, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_log(
            id TEXT PRIMARY KEY,
            user TEXT NOT NULL,
            action TEXT NOT NULL,
            details TEXT,
            timestamp INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_audit_log_user ON audit_log(user)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ai_cache(
            hash TEXT PRIMARY KEY,
            response TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_plans_share_id(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "plans", "share_id")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE plans ADD COLUMN share_id TEXT", [])?;
    Ok(())
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Append-only activity trail. A failed audit insert must never fail the
/// mutation being logged, so callers ignore the result.
pub fn log_audit(
    conn: &Connection,
    user: &str,
    action: &str,
    details: Option<&str>,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO audit_log(id, user, action, details, timestamp) VALUES(?, ?, ?, ?, ?)",
        (
            Uuid::new_v4().to_string(),
            user,
            action,
            details,
            now_millis(),
        ),
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
