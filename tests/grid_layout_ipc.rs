
use serde_json::json;
use test_support::{offering_json, request, request_ok, spawn_sidecar};

#[test]
fn default_window_places_a_morning_lecture_at_the_top() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let selection = json!([offering_json("CS101", "A", 3, &[("Mon", "07:00", "09:00")])]);
    let model = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "selection.layout",
        json!({ "selection": selection }),
    );

    assert_eq!(model.get("rowCount").and_then(|v| v.as_u64()), Some(22));
    let placements = model
        .get("placements")
        .and_then(|v| v.as_array())
        .expect("placements");
    assert_eq!(placements.len(), 1);
    let p = &placements[0];
    assert_eq!(p.get("day").and_then(|v| v.as_str()), Some("Mon"));
    assert_eq!(p.get("rowStart").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(p.get("rowSpan").and_then(|v| v.as_i64()), Some(4));
    assert_eq!(p.get("lane").and_then(|v| v.as_u64()), Some(0));
}

#[test]
fn overlapping_offerings_render_in_separate_lanes() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let selection = json!([
        offering_json("CS101", "A", 3, &[("Mon", "07:00", "08:00")]),
        offering_json("MA201", "B", 2, &[("Mon", "07:00", "08:00")]),
    ]);
    let model = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "selection.layout",
        json!({ "selection": selection }),
    );
    let placements = model
        .get("placements")
        .and_then(|v| v.as_array())
        .expect("placements");
    assert_eq!(placements.len(), 2);
    let lanes: Vec<u64> = placements
        .iter()
        .map(|p| p.get("lane").and_then(|v| v.as_u64()).expect("lane"))
        .collect();
    assert_eq!(lanes, vec![0, 1]);
}

#[test]
fn caller_supplied_grid_window_overrides_the_defaults() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let selection = json!([offering_json("EV900", "A", 2, &[("Mon", "19:00", "21:00")])]);

    // Outside the default 07:00-18:00 window: skipped with a warning.
    let model = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "selection.layout",
        json!({ "selection": selection }),
    );
    assert_eq!(
        model
            .get("placements")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );
    assert_eq!(
        model
            .get("outOfRange")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    // An evening window picks it back up.
    let model = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "selection.layout",
        json!({
            "selection": selection,
            "grid": { "startHour": 18, "endHour": 22, "granularityMin": 60 }
        }),
    );
    assert_eq!(model.get("rowCount").and_then(|v| v.as_u64()), Some(4));
    let placements = model
        .get("placements")
        .and_then(|v| v.as_array())
        .expect("placements");
    assert_eq!(placements.len(), 1);
    assert_eq!(placements[0].get("rowStart").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(placements[0].get("rowSpan").and_then(|v| v.as_i64()), Some(2));

    // Nonsense windows are rejected.
    let bad = request(
        &mut stdin,
        &mut reader,
        "3",
        "selection.layout",
        json!({
            "selection": selection,
            "grid": { "startHour": 20, "endHour": 8 }
        }),
    );
    assert_eq!(bad.get("ok").and_then(|v| v.as_bool()), Some(false));
}
