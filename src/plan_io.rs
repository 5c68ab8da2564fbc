use crate::schedule::{Offering, ScheduleError};

/// Deterministic JSON encoding of a working selection. Field order follows
/// the struct declaration, so equal selections always produce equal text.
pub fn serialize_selection(selection: &[Offering]) -> String {
    serde_json::to_string(selection).unwrap_or_else(|_| "[]".to_string())
}

/// Decode and validate persisted plan data. All-or-nothing: one malformed
/// element fails the whole call with `corrupt_plan_data`; callers substitute
/// a null plan and leave the stored text untouched.
pub fn deserialize_selection(text: &str) -> Result<Vec<Offering>, ScheduleError> {
    let selection: Vec<Offering> = serde_json::from_str(text).map_err(|e| {
        ScheduleError::new("corrupt_plan_data", format!("plan data is not valid: {}", e))
    })?;
    for offering in &selection {
        offering.validate()?;
    }
    Ok(selection)
}
