//! `using` preset expansion (spec.md §4.5, §9).
//!
//! Expansion happens once, before the rest of the instruction bag is
//! parsed, by deep-merging each named preset's stored instructions under
//! the caller's own — the caller's keys always win on conflict.

use serde_json::Value as Json;

use crate::error::{CompileError, CompileResult};
use crate::model::Model;

fn extract_using_slugs(raw: &Json) -> Option<Vec<String>> {
    raw.as_object()?
        .get("using")?
        .as_array()
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
}

fn deep_merge(base: &mut Json, overlay: &Json) {
    match (base, overlay) {
        (Json::Object(base_map), Json::Object(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        base_map.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        // Any other shape: the caller's value (`base`) wins outright.
        _ => {}
    }
}

/// Resolve and deep-merge the presets named by `using` (or all presets, for
/// `using: ['all']`) into `raw` instructions, returning the merged body
/// ready for [`crate::query::CombinedInstructions`] parsing.
pub fn apply(model: &Model, raw: &Json) -> CompileResult<Json> {
    let Some(requested) = extract_using_slugs(raw) else {
        return Ok(raw.clone());
    };

    let slugs: Vec<String> = if requested.iter().any(|s| s == "all") {
        model.presets.iter().map(|p| p.slug.clone()).collect()
    } else {
        requested
    };

    let mut merged = raw.clone();
    for slug in &slugs {
        let preset = model
            .find_preset(slug)
            .ok_or_else(|| CompileError::PresetNotFound(slug.clone()))?;
        deep_merge(&mut merged, &preset.instructions);
    }

    if let Some(map) = merged.as_object_mut() {
        map.remove("using");
    }

    Ok(merged)
}
