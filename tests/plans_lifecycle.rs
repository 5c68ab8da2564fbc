
use serde_json::json;
use test_support::{offering_json, request, request_ok, spawn_sidecar, temp_dir};

fn plan_data() -> String {
    let selection = json!([
        offering_json("CS101", "A", 3, &[("Mon", "07:00", "09:00")]),
        offering_json("MA201", "B", 2, &[("Tue", "09:30", "11:00")]),
    ]);
    serde_json::to_string(&selection).expect("encode selection")
}

#[test]
fn plans_save_list_rename_delete_roundtrip() {
    let workspace = temp_dir("krs-plans-lifecycle");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "plans.save",
        json!({
            "ownerId": "user-1",
            "name": "Semester 3 Draft",
            "data": plan_data(),
            "smartGenerated": true,
            "generatedBy": "planner-v2",
        }),
    );
    let plan_id = saved
        .get("planId")
        .and_then(|v| v.as_str())
        .expect("planId")
        .to_string();

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "plans.list",
        json!({ "ownerId": "user-1" }),
    );
    let plans = listed
        .get("plans")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(plans.len(), 1);
    assert_eq!(
        plans[0].get("name").and_then(|v| v.as_str()),
        Some("Semester 3 Draft")
    );
    assert_eq!(
        plans[0].get("smartGenerated").and_then(|v| v.as_bool()),
        Some(true)
    );
    let data = plans[0].get("data").and_then(|v| v.as_array()).expect("parsed data");
    assert_eq!(data.len(), 2);
    assert_eq!(data[0].get("code").and_then(|v| v.as_str()), Some("CS101"));
    assert_eq!(data[0].get("class").and_then(|v| v.as_str()), Some("A"));

    // Another owner sees nothing.
    let other = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "plans.list",
        json!({ "ownerId": "user-2" }),
    );
    assert_eq!(
        other.get("plans").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    let renamed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "plans.rename",
        json!({ "ownerId": "user-1", "planId": plan_id, "newName": "Final KRS" }),
    );
    assert_eq!(renamed.get("name").and_then(|v| v.as_str()), Some("Final KRS"));

    // Mutations against someone else's plan fail as not_found.
    let denied = request(
        &mut stdin,
        &mut reader,
        "6",
        "plans.delete",
        json!({ "ownerId": "user-2", "planId": plan_id }),
    );
    assert_eq!(
        denied
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_found")
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "plans.delete",
        json!({ "ownerId": "user-1", "planId": plan_id }),
    );
    let after = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "plans.list",
        json!({ "ownerId": "user-1" }),
    );
    assert_eq!(
        after.get("plans").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn plans_save_rejects_unreadable_data_and_enforces_the_cap() {
    let workspace = temp_dir("krs-plans-cap");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Corrupt payloads never reach the archive.
    let rejected = request(
        &mut stdin,
        &mut reader,
        "2",
        "plans.save",
        json!({ "ownerId": "user-1", "name": "Bad", "data": "[{\"id\":\"x\",\"code\":\"A\"}]" }),
    );
    assert_eq!(
        rejected
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("corrupt_plan_data")
    );

    for i in 0..30 {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("save-{}", i),
            "plans.save",
            json!({
                "ownerId": "user-1",
                "name": format!("Plan {}", i),
                "data": plan_data(),
            }),
        );
    }

    let over = request(
        &mut stdin,
        &mut reader,
        "31",
        "plans.save",
        json!({ "ownerId": "user-1", "name": "One Too Many", "data": plan_data() }),
    );
    assert_eq!(
        over.get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("plan_limit_reached")
    );

    // The cap is per owner, not global.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "32",
        "plans.save",
        json!({ "ownerId": "user-2", "name": "Fresh Account", "data": plan_data() }),
    );

    let _ = std::fs::remove_dir_all(workspace);
}
