use crate::schedule::Offering;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Result of folding an incoming batch into a working selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub selection: Vec<Offering>,
    pub added: Vec<Offering>,
    pub skipped_duplicates: Vec<Offering>,
    pub total_sks: u32,
}

/// Merge an incoming batch (manual pick, batch import, shared plan, AI plan)
/// into the current selection. An incoming offering is a duplicate iff its
/// `(code, section)` pair is already present, regardless of differing ids.
/// Merging never resolves conflicts; callers re-run detection afterwards.
pub fn merge_selection(current: &[Offering], incoming: &[Offering]) -> MergeOutcome {
    let mut seen: HashSet<(String, String)> = current.iter().map(|o| o.dedup_key()).collect();

    let mut selection = current.to_vec();
    let mut added = Vec::new();
    let mut skipped_duplicates = Vec::new();

    for offering in incoming {
        if seen.insert(offering.dedup_key()) {
            selection.push(offering.clone());
            added.push(offering.clone());
        } else {
            skipped_duplicates.push(offering.clone());
        }
    }

    let total_sks = total_sks(&selection);
    MergeOutcome {
        selection,
        added,
        skipped_duplicates,
        total_sks,
    }
}

/// Always recomputed from the underlying set; never cached alongside it.
pub fn total_sks(selection: &[Offering]) -> u32 {
    selection.iter().map(|o| o.sks).sum()
}

/// Flatten a catalog grouped by course code into one offering per code.
/// `choices` maps code -> picked section; codes without a recorded choice
/// fall back to their first listed section. Catalog order is preserved by
/// first appearance of each code.
pub fn resolve_sections(
    catalog: &[Offering],
    choices: &HashMap<String, String>,
) -> Vec<Offering> {
    let mut code_order: Vec<&str> = Vec::new();
    let mut by_code: HashMap<&str, Vec<&Offering>> = HashMap::new();
    for offering in catalog {
        let entry = by_code.entry(offering.code.as_str()).or_default();
        if entry.is_empty() {
            code_order.push(offering.code.as_str());
        }
        entry.push(offering);
    }

    let mut picked = Vec::with_capacity(code_order.len());
    for code in code_order {
        let sections = &by_code[code];
        let chosen = choices
            .get(code)
            .and_then(|want| sections.iter().find(|o| o.section == *want))
            .or_else(|| sections.first());
        if let Some(o) = chosen {
            picked.push((*o).clone());
        }
    }
    picked
}
