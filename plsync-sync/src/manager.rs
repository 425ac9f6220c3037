//! Script manager bridge and the in-process script store behind it.
//!
//! The reconciler only ever talks to [`ScriptManager`]. [`ScriptStore`] is
//! the implementation the agent runs with: per category it keeps one script
//! set per [`Namespace`] plus a name index that resolves each name to the
//! highest-priority namespace currently holding it.
//!
//! Every piece of state sits behind an `RwLock<Arc<_>>`. Writers build a new
//! snapshot and swap the `Arc`; readers clone the `Arc` and drop the lock, so
//! a script that is executing keeps its snapshot alive across a swap.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use plsync_core::{Category, DefaultScripts, Namespace, RelationByCategory, ScriptsByCategory};

/// Options applied to every script in one load call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Directory the scripts were read from, if any. Recorded on each script.
    pub origin_dir: Option<PathBuf>,
}

/// `"<category>/<name>"` → reason, for scripts that failed to load.
pub type LoadFailures = HashMap<String, String>;

/// Contract the reconciler relies on.
pub trait ScriptManager: Send + Sync {
    /// Replace every script under `namespace`. Categories missing from
    /// `scripts` end up empty in that namespace.
    fn load_scripts(
        &self,
        namespace: Namespace,
        scripts: &ScriptsByCategory,
        options: &LoadOptions,
    ) -> LoadFailures;

    /// Replace the default-script mapping; `None` clears it.
    fn update_default_script(&self, defaults: Option<DefaultScripts>);

    /// Replace the relation table and remember its timestamp.
    fn update_relation(&self, updated_at: i64, relation: RelationByCategory);

    /// Timestamp of the active relation table, sent as `relation_since`.
    fn relation_updated_at(&self) -> i64;
}

/// A loaded script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub name: String,
    pub category: Category,
    pub namespace: Namespace,
    pub content: String,
    pub origin: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct CategorySnapshot {
    namespaces: HashMap<Namespace, HashMap<String, Arc<Script>>>,
    index: HashMap<String, Arc<Script>>,
}

impl CategorySnapshot {
    fn with_namespace(&self, namespace: Namespace, scripts: HashMap<String, Arc<Script>>) -> Self {
        let mut namespaces = self.namespaces.clone();
        namespaces.insert(namespace, scripts);

        let mut index: HashMap<String, Arc<Script>> = HashMap::new();
        for ns in Namespace::SEARCH_ORDER.iter().rev() {
            if let Some(set) = namespaces.get(ns) {
                for (name, script) in set {
                    index.insert(name.clone(), Arc::clone(script));
                }
            }
        }
        Self { namespaces, index }
    }
}

#[derive(Debug, Default)]
struct RelationState {
    updated_at: i64,
    relation: RelationByCategory,
}

/// In-process, thread-safe script store.
#[derive(Debug)]
pub struct ScriptStore {
    categories: HashMap<Category, RwLock<Arc<CategorySnapshot>>>,
    defaults: RwLock<Arc<DefaultScripts>>,
    relation: RwLock<Arc<RelationState>>,
}

impl Default for ScriptStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptStore {
    pub fn new() -> Self {
        let categories = Category::ALL
            .iter()
            .map(|c| (*c, RwLock::new(Arc::new(CategorySnapshot::default()))))
            .collect();
        Self {
            categories,
            defaults: RwLock::new(Arc::new(DefaultScripts::new())),
            relation: RwLock::new(Arc::new(RelationState::default())),
        }
    }

    fn snapshot(&self, category: Category) -> Arc<CategorySnapshot> {
        match self.categories.get(&category) {
            Some(lock) => Arc::clone(&lock.read().unwrap_or_else(PoisonError::into_inner)),
            None => Arc::new(CategorySnapshot::default()),
        }
    }

    /// Highest-priority script named `name` in `category`.
    pub fn query(&self, category: Category, name: &str) -> Option<Arc<Script>> {
        self.snapshot(category).index.get(name).cloned()
    }

    /// Script named `name` in exactly `namespace`.
    pub fn query_in(&self, category: Category, namespace: Namespace, name: &str) -> Option<Arc<Script>> {
        self.snapshot(category)
            .namespaces
            .get(&namespace)
            .and_then(|set| set.get(name))
            .cloned()
    }

    /// Sorted script names held under `namespace` in `category`.
    pub fn names_in(&self, category: Category, namespace: Namespace) -> Vec<String> {
        let snapshot = self.snapshot(category);
        let mut names: Vec<String> = snapshot
            .namespaces
            .get(&namespace)
            .map(|set| set.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Number of scripts under `namespace` across all categories.
    pub fn count_in(&self, namespace: Namespace) -> usize {
        Category::ALL
            .iter()
            .map(|c| {
                self.snapshot(*c)
                    .namespaces
                    .get(&namespace)
                    .map_or(0, HashMap::len)
            })
            .sum()
    }

    pub fn default_script(&self, category: Category) -> Option<String> {
        let defaults = Arc::clone(&self.defaults.read().unwrap_or_else(PoisonError::into_inner));
        defaults.get(category.as_str()).cloned()
    }

    pub fn defaults(&self) -> DefaultScripts {
        let defaults = Arc::clone(&self.defaults.read().unwrap_or_else(PoisonError::into_inner));
        (*defaults).clone()
    }

    pub fn relation(&self) -> RelationByCategory {
        let state = Arc::clone(&self.relation.read().unwrap_or_else(PoisonError::into_inner));
        state.relation.clone()
    }

    /// Script that should process data tagged `entity_id` in `category`:
    /// the related script if one is assigned, otherwise the category default.
    pub fn resolve(&self, category: Category, entity_id: &str) -> Option<Arc<Script>> {
        let state = Arc::clone(&self.relation.read().unwrap_or_else(PoisonError::into_inner));
        let related = state
            .relation
            .get(category.as_str())
            .and_then(|entities| entities.get(entity_id))
            .and_then(|name| self.query(category, name));
        related.or_else(|| {
            self.default_script(category)
                .and_then(|name| self.query(category, &name))
        })
    }
}

fn route_category(raw: &str) -> Category {
    match raw.parse::<Category>() {
        Ok(category) => category,
        Err(err) => {
            tracing::warn!("{err}, routing scripts to {}", Category::Logging);
            Category::Logging
        }
    }
}

impl ScriptManager for ScriptStore {
    fn load_scripts(
        &self,
        namespace: Namespace,
        scripts: &ScriptsByCategory,
        options: &LoadOptions,
    ) -> LoadFailures {
        let mut failures = LoadFailures::new();
        let mut grouped: HashMap<Category, HashMap<String, Arc<Script>>> = HashMap::new();

        for (raw_category, set) in scripts {
            let category = route_category(raw_category);
            for (name, content) in set {
                if content.trim().is_empty() {
                    failures.insert(format!("{raw_category}/{name}"), "empty script".to_string());
                    continue;
                }
                let script = Script {
                    name: name.clone(),
                    category,
                    namespace,
                    content: content.clone(),
                    origin: options.origin_dir.as_ref().map(|dir| dir.join(name)),
                };
                grouped
                    .entry(category)
                    .or_default()
                    .insert(name.clone(), Arc::new(script));
            }
        }

        for (category, lock) in &self.categories {
            let scripts = grouped.remove(category).unwrap_or_default();
            let mut guard = lock.write().unwrap_or_else(PoisonError::into_inner);
            let next = guard.with_namespace(namespace, scripts);
            *guard = Arc::new(next);
        }

        for (key, reason) in &failures {
            tracing::warn!("failed to load {namespace} script {key}: {reason}");
        }
        failures
    }

    fn update_default_script(&self, defaults: Option<DefaultScripts>) {
        let next = Arc::new(defaults.unwrap_or_default());
        *self.defaults.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn update_relation(&self, updated_at: i64, relation: RelationByCategory) {
        let next = Arc::new(RelationState {
            updated_at,
            relation,
        });
        *self.relation.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn relation_updated_at(&self) -> i64 {
        self.relation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .updated_at
    }
}
