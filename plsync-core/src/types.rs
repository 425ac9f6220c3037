//! Domain types for remote pipeline synchronisation.
//!
//! Script bundles travel as plain string maps keyed by category name; the
//! [`Category`] enum only comes into play when scripts are routed into the
//! in-process store. Timestamps received from the control point are opaque
//! and only ever compared, never interpreted as wall-clock time.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Snapshot maps
// ---------------------------------------------------------------------------

/// Script name → script source text.
pub type ScriptSet = HashMap<String, String>;

/// Category → (script name → script source text).
pub type ScriptsByCategory = HashMap<String, ScriptSet>;

/// Category → (entity id → script name).
pub type RelationByCategory = HashMap<String, HashMap<String, String>>;

/// Category → fallback script name.
pub type DefaultScripts = HashMap<String, String>;

// ---------------------------------------------------------------------------
// Timestamp sentinels
// ---------------------------------------------------------------------------

/// `scripts_updated_at` value meaning "delete everything synced so far".
pub const DELETE_ALL_SENTINEL: i64 = 1;

/// `relation_updated_at` value meaning "nothing newer available".
pub const NO_RELATION_UPDATE: i64 = -1;

/// What a pulled `scripts_updated_at` asks the reconciler to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptsUpdate {
    /// Same as the last applied snapshot, or `<= 0`: leave local state alone.
    Unchanged,
    /// The delete-all sentinel.
    DeleteAll,
    /// A new snapshot to apply in full.
    Apply(i64),
}

impl ScriptsUpdate {
    /// Classify a pulled timestamp against the last locally applied one.
    pub fn classify(updated_at: i64, last_applied: i64) -> Self {
        if updated_at == last_applied || updated_at <= 0 {
            ScriptsUpdate::Unchanged
        } else if updated_at == DELETE_ALL_SENTINEL {
            ScriptsUpdate::DeleteAll
        } else {
            ScriptsUpdate::Apply(updated_at)
        }
    }
}

/// What a pulled `relation_updated_at` asks the reconciler to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationUpdate {
    Unchanged,
    Replace(i64),
}

impl From<i64> for RelationUpdate {
    fn from(updated_at: i64) -> Self {
        if updated_at == NO_RELATION_UPDATE {
            RelationUpdate::Unchanged
        } else {
            RelationUpdate::Replace(updated_at)
        }
    }
}

/// One bundle fetched from the control point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub scripts_by_category: ScriptsByCategory,
    pub relation_by_category: RelationByCategory,
    /// `None` when the control point sent no default map at all, which is
    /// distinct from an empty one.
    pub default_script_by_category: Option<DefaultScripts>,
    pub scripts_updated_at: i64,
    pub relation_updated_at: i64,
}

impl RemoteSnapshot {
    pub fn scripts_update(&self, last_applied: i64) -> ScriptsUpdate {
        ScriptsUpdate::classify(self.scripts_updated_at, last_applied)
    }

    pub fn relation_update(&self) -> RelationUpdate {
        RelationUpdate::from(self.relation_updated_at)
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A data-class partition under which scripts, relations and defaults live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Metric,
    Network,
    #[serde(rename = "keyevent")]
    KeyEvent,
    Object,
    CustomObject,
    Logging,
    Tracing,
    Rum,
    Security,
    Profiling,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Metric,
        Category::Network,
        Category::KeyEvent,
        Category::Object,
        Category::CustomObject,
        Category::Logging,
        Category::Tracing,
        Category::Rum,
        Category::Security,
        Category::Profiling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Metric => "metric",
            Category::Network => "network",
            Category::KeyEvent => "keyevent",
            Category::Object => "object",
            Category::CustomObject => "custom_object",
            Category::Logging => "logging",
            Category::Tracing => "tracing",
            Category::Rum => "rum",
            Category::Security => "security",
            Category::Profiling => "profiling",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metric" | "metrics" => Ok(Category::Metric),
            "network" => Ok(Category::Network),
            "keyevent" => Ok(Category::KeyEvent),
            "object" => Ok(Category::Object),
            "custom_object" => Ok(Category::CustomObject),
            "logging" => Ok(Category::Logging),
            "tracing" => Ok(Category::Tracing),
            "rum" => Ok(Category::Rum),
            "security" => Ok(Category::Security),
            "profiling" => Ok(Category::Profiling),
            other => Err(format!("unsupported category '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Namespace
// ---------------------------------------------------------------------------

/// Origin tag for loaded scripts. Higher priority shadows lower on lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Scripts shipped with the agent.
    Default,
    /// Scripts managed through a git repository.
    GitRepo,
    /// Scripts pulled from the control point.
    Remote,
}

impl Namespace {
    /// Lookup order, highest priority first.
    pub const SEARCH_ORDER: [Namespace; 3] =
        [Namespace::Remote, Namespace::GitRepo, Namespace::Default];

    pub fn priority(&self) -> u8 {
        match self {
            Namespace::Default => 0,
            Namespace::GitRepo => 1,
            Namespace::Remote => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Default => "default",
            Namespace::GitRepo => "gitrepo",
            Namespace::Remote => "remote",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, ScriptsUpdate::Unchanged)]
    #[case(-5, 100, ScriptsUpdate::Unchanged)]
    #[case(100, 100, ScriptsUpdate::Unchanged)]
    #[case(1, 100, ScriptsUpdate::DeleteAll)]
    #[case(1, 0, ScriptsUpdate::DeleteAll)]
    #[case(200, 100, ScriptsUpdate::Apply(200))]
    #[case(50, 100, ScriptsUpdate::Apply(50))]
    fn scripts_update_classification(
        #[case] updated_at: i64,
        #[case] last_applied: i64,
        #[case] expected: ScriptsUpdate,
    ) {
        assert_eq!(ScriptsUpdate::classify(updated_at, last_applied), expected);
    }

    #[test]
    fn delete_sentinel_already_applied_is_unchanged() {
        assert_eq!(ScriptsUpdate::classify(1, 1), ScriptsUpdate::Unchanged);
    }

    #[test]
    fn relation_sentinel_means_unchanged() {
        assert_eq!(RelationUpdate::from(-1), RelationUpdate::Unchanged);
        assert_eq!(RelationUpdate::from(0), RelationUpdate::Replace(0));
        assert_eq!(RelationUpdate::from(42), RelationUpdate::Replace(42));
    }

    #[test]
    fn deprecated_metrics_alias_parses_to_metric() {
        assert_eq!("metrics".parse::<Category>(), Ok(Category::Metric));
        assert!("bogus".parse::<Category>().is_err());
    }

    #[test]
    fn category_names_roundtrip_through_from_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
    }

    #[test]
    fn namespace_search_order_is_descending_priority() {
        let priorities: Vec<u8> = Namespace::SEARCH_ORDER.iter().map(|ns| ns.priority()).collect();
        assert_eq!(priorities, vec![2, 1, 0]);
    }
}
