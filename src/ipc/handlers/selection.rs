use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::merge;
use crate::schedule::{self, GridConfig, Offering, ScheduleError};
use serde_json::json;
use std::collections::HashMap;

/// Pure pipeline methods: merge -> conflicts -> layout. Each call works on
/// the offering sets supplied in params, so no workspace is required.
fn parse_offerings(
    params: &serde_json::Value,
    field: &str,
) -> Result<Vec<Offering>, ScheduleError> {
    let Some(raw) = params.get(field) else {
        return Err(ScheduleError::new(
            "bad_params",
            format!("missing params.{}", field),
        ));
    };
    let selection: Vec<Offering> = serde_json::from_value(raw.clone()).map_err(|e| {
        ScheduleError::new(
            "corrupt_plan_data",
            format!("params.{} is not a valid offering list: {}", field, e),
        )
    })?;
    for offering in &selection {
        offering.validate()?;
    }
    Ok(selection)
}

fn handle_merge(req: &Request) -> serde_json::Value {
    let current = match parse_offerings(&req.params, "current") {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    let incoming = match parse_offerings(&req.params, "incoming") {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };

    let outcome = merge::merge_selection(&current, &incoming);
    match serde_json::to_value(&outcome) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
    }
}

fn handle_resolve_sections(req: &Request) -> serde_json::Value {
    let catalog = match parse_offerings(&req.params, "catalog") {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    let choices: HashMap<String, String> = match req.params.get("choices") {
        None => HashMap::new(),
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("choices must map code to section: {}", e),
                    None,
                )
            }
        },
    };

    let picked = merge::resolve_sections(&catalog, &choices);
    match serde_json::to_value(&picked) {
        Ok(v) => ok(&req.id, json!({ "selection": v })),
        Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
    }
}

fn handle_conflicts(req: &Request) -> serde_json::Value {
    let selection = match parse_offerings(&req.params, "selection") {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };

    let report = schedule::detect_conflicts(&selection);
    match serde_json::to_value(&report) {
        Ok(v) => ok(
            &req.id,
            json!({ "conflicts": v, "hasConflicts": !report.is_empty() }),
        ),
        Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
    }
}

fn handle_layout(req: &Request) -> serde_json::Value {
    let selection = match parse_offerings(&req.params, "selection") {
        Ok(v) => v,
        Err(e) => return engine_err(&req.id, e),
    };
    let cfg: GridConfig = match req.params.get("grid") {
        None => GridConfig::default(),
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("invalid grid config: {}", e),
                    None,
                )
            }
        },
    };

    match schedule::layout(&selection, &cfg) {
        Ok(model) => match serde_json::to_value(&model) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
        },
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "selection.merge" => Some(handle_merge(req)),
        "selection.resolveSections" => Some(handle_resolve_sections(req)),
        "selection.conflicts" => Some(handle_conflicts(req)),
        "selection.layout" => Some(handle_layout(req)),
        _ => None,
    }
}
