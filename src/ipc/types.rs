use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One planner request line. `params` defaults to null so methods that take
/// no arguments (like `health`) can omit it.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Daemon state threaded through the router. Both fields stay `None` until
/// `workspace.select` succeeds; the pure selection methods never need them.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
