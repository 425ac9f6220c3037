//! Conversion between per-category script maps and the flat archive layout.
//!
//! Archive entries are named `<category>/<script name>`. Legacy archives
//! written before categories existed hold bare script names; those collapse
//! under the `"."` category. One reserved entry, [`CATEGORY_DEFAULT_ENTRY`],
//! carries the default-script map as JSON.

use std::collections::{BTreeMap, HashMap};

use plsync_core::{DefaultScripts, ScriptsByCategory};

use crate::error::SyncError;

/// Reserved archive entry holding `{"<category>": "<script name>"}`.
pub const CATEGORY_DEFAULT_ENTRY: &str = "category_default.json";

/// Category assigned to legacy entries that carry no `<category>/` prefix.
pub const LEGACY_CATEGORY: &str = ".";

/// Split flat `<category>/<name>` keys into a per-category map.
pub fn convert_content_map_to_three_map(content: &HashMap<String, String>) -> ScriptsByCategory {
    let mut out = ScriptsByCategory::new();
    for (key, text) in content {
        let (category, name) = match key.split_once('/') {
            Some((category, name)) => (category, name),
            None => (LEGACY_CATEGORY, key.as_str()),
        };
        out.entry(category.to_string())
            .or_default()
            .insert(name.to_string(), text.clone());
    }
    out
}

/// Flatten a per-category map into archive entries.
///
/// `defaults` of `None` omits [`CATEGORY_DEFAULT_ENTRY`]; an empty map still
/// emits it as `{}`. Keys are sorted so the JSON is stable.
pub fn convert_three_map_to_content_map(
    scripts: &ScriptsByCategory,
    defaults: Option<&DefaultScripts>,
) -> Result<HashMap<String, String>, SyncError> {
    let mut out = HashMap::new();
    for (category, set) in scripts {
        for (name, text) in set {
            out.insert(format!("{category}/{name}"), text.clone());
        }
    }
    if let Some(defaults) = defaults {
        let sorted: BTreeMap<&String, &String> = defaults.iter().collect();
        out.insert(
            CATEGORY_DEFAULT_ENTRY.to_string(),
            serde_json::to_string(&sorted)?,
        );
    }
    Ok(out)
}

/// Inverse of [`convert_three_map_to_content_map`]: pull the default entry
/// out, then split the rest by category.
pub fn split_content_map(
    mut content: HashMap<String, String>,
) -> Result<(ScriptsByCategory, Option<DefaultScripts>), SyncError> {
    let defaults = match content.remove(CATEGORY_DEFAULT_ENTRY) {
        Some(raw) => Some(serde_json::from_str::<DefaultScripts>(&raw)?),
        None => None,
    };
    Ok((convert_content_map_to_three_map(&content), defaults))
}

/// Overlay local default-script overrides on the remote defaults.
///
/// Local entries win on conflicting categories. Returns `None` when neither
/// side assigns anything, which clears the active mapping.
pub fn merge_defaults(
    remote: Option<&DefaultScripts>,
    local: &DefaultScripts,
) -> Option<DefaultScripts> {
    let mut merged = remote.cloned().unwrap_or_default();
    for (category, name) in local {
        merged.insert(category.clone(), name.clone());
    }
    if merged.is_empty() {
        None
    } else {
        Some(merged)
    }
}
