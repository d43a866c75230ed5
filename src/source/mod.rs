//! Dynamically sourced option lists.
//!
//! A source definition declares which paths its option list depends on and a
//! resolver that produces the items. Resolvers may answer synchronously or
//! defer; a deferred resolution is handed back to the host as a
//! [`FetchRequest`] carrying a generation number, and only the most recently
//! issued generation for a path is ever applied (last-issued-wins). A
//! fulfillment arriving after `clear()` is likewise dropped.

use crate::path::Path;
use crate::registry::DependencyRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// One selectable item in an option list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SourceItem {
    pub fn new(value: impl Into<Value>) -> SourceItem {
        SourceItem {
            value: value.into(),
            label: None,
        }
    }

    pub fn labeled(value: impl Into<Value>, label: impl Into<String>) -> SourceItem {
        SourceItem {
            value: value.into(),
            label: Some(label.into()),
        }
    }
}

/// Current state of one declared dependency at refresh time.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyState {
    /// The dependency path, resolved against the source's own path.
    pub path: Path,
    /// Set when this dependency is the one whose change triggered the refresh.
    pub changed_path: Option<Path>,
    /// The value read from the live model.
    pub value: Value,
}

/// Everything a resolver gets to look at.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceContext {
    /// The path of the field this source feeds.
    pub path: Path,
    /// Whether this source has resolved at least once before.
    pub initialized: bool,
    pub dependencies: Vec<DependencyState>,
}

impl SourceContext {
    /// Looks up a dependency's current value by its resolved path.
    pub fn value_of(&self, path: impl Into<Path>) -> Option<&Value> {
        let path = path.into();
        self.dependencies
            .iter()
            .find(|dep| dep.path == path)
            .map(|dep| &dep.value)
    }
}

/// A resolver's answer.
pub enum Resolution {
    /// The option list, computed synchronously.
    Items(Vec<SourceItem>),
    /// The lookup failed; the previous option list stays in place.
    Failed(String),
    /// The host will complete the lookup later via `fulfill`.
    Deferred,
}

pub type Resolver = Box<dyn Fn(&SourceContext) -> Resolution + Send + Sync>;

/// A declarative recipe for a dynamic option list.
pub struct SourceDefinition {
    /// Paths whose changes re-trigger resolution. May contain wildcards,
    /// resolved positionally against the owning field's path.
    pub dependencies: Vec<Path>,
    pub resolver: Resolver,
}

impl SourceDefinition {
    pub fn new<F>(dependencies: Vec<Path>, resolver: F) -> SourceDefinition
    where
        F: Fn(&SourceContext) -> Resolution + Send + Sync + 'static,
    {
        SourceDefinition {
            dependencies,
            resolver: Box::new(resolver),
        }
    }
}

/// A deferred resolution handed to the host. The context is a snapshot taken
/// when the refresh was issued.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub path: Path,
    pub context: SourceContext,
    generation: u64,
}

/// What the caller should do after a refresh.
pub enum RefreshOutcome {
    /// Apply this option list now.
    Apply(Vec<SourceItem>),
    /// A fetch is in flight; hand the request to the host.
    Pending(FetchRequest),
    /// Nothing to apply (unknown path, or a logged sync failure).
    Retain,
}

struct SourceEntry {
    path: Path,
    definition: SourceDefinition,
    initialized: bool,
    generation: u64,
}

/// Registry of dynamic sources, owned by the inspector instance.
#[derive(Default)]
pub struct SourceService {
    entries: Vec<SourceEntry>,
}

impl SourceService {
    pub fn new() -> SourceService {
        SourceService::default()
    }

    /// Registers a source and subscribes its resolved dependency paths with
    /// the given dependent tag.
    pub fn add<T: Clone>(
        &mut self,
        path: Path,
        definition: SourceDefinition,
        registry: &mut DependencyRegistry<T>,
        tag: T,
    ) {
        let resolved: Vec<Path> = definition
            .dependencies
            .iter()
            .map(|dep| dep.resolve_against(&path))
            .collect();
        if !resolved.is_empty() {
            registry.subscribe(&resolved, tag);
        }
        self.entries.push(SourceEntry {
            path,
            definition,
            initialized: false,
            generation: 0,
        });
    }

    /// Re-resolves one source. `changed` names the dependency path that
    /// triggered the refresh, when there is one.
    pub fn refresh(
        &mut self,
        path: &Path,
        changed: Option<&Path>,
        get_value: &dyn Fn(&Path) -> Value,
    ) -> RefreshOutcome {
        let Some(entry) = self.entries.iter_mut().find(|e| &e.path == path) else {
            debug!(path = %path, "refresh requested for unknown source");
            return RefreshOutcome::Retain;
        };
        Self::refresh_entry(entry, changed, get_value)
    }

    /// First-paint resolution: refreshes each source that has not yet been
    /// initialized. Calling this twice resolves each source only once.
    pub fn init_sources(
        &mut self,
        get_value: &dyn Fn(&Path) -> Value,
    ) -> Vec<(Path, RefreshOutcome)> {
        self.entries
            .iter_mut()
            .filter(|entry| !entry.initialized)
            .map(|entry| {
                let path = entry.path.clone();
                (path, Self::refresh_entry(entry, None, get_value))
            })
            .collect()
    }

    /// Unconditionally refreshes every registered source.
    pub fn refresh_all(
        &mut self,
        get_value: &dyn Fn(&Path) -> Value,
    ) -> Vec<(Path, RefreshOutcome)> {
        self.entries
            .iter_mut()
            .map(|entry| {
                let path = entry.path.clone();
                (path, Self::refresh_entry(entry, None, get_value))
            })
            .collect()
    }

    fn refresh_entry(
        entry: &mut SourceEntry,
        changed: Option<&Path>,
        get_value: &dyn Fn(&Path) -> Value,
    ) -> RefreshOutcome {
        let context = SourceContext {
            path: entry.path.clone(),
            initialized: entry.initialized,
            dependencies: entry
                .definition
                .dependencies
                .iter()
                .map(|dep| {
                    let resolved = dep.resolve_against(&entry.path);
                    DependencyState {
                        changed_path: changed
                            .filter(|c| resolved.is_related(c))
                            .map(|c| (*c).clone()),
                        value: get_value(&resolved),
                        path: resolved,
                    }
                })
                .collect(),
        };

        entry.initialized = true;
        entry.generation += 1;

        match (entry.definition.resolver)(&context) {
            Resolution::Items(items) => RefreshOutcome::Apply(items),
            Resolution::Failed(message) => {
                warn!(path = %entry.path, %message, "source resolution failed; keeping previous options");
                RefreshOutcome::Retain
            }
            Resolution::Deferred => RefreshOutcome::Pending(FetchRequest {
                path: entry.path.clone(),
                generation: entry.generation,
                context,
            }),
        }
    }

    /// Checks whether a deferred fulfillment is still current. A stale
    /// generation (a newer refresh was issued meanwhile) or a cleared service
    /// drops the result.
    pub fn is_current(&self, request: &FetchRequest) -> bool {
        match self.entries.iter().find(|e| e.path == request.path) {
            Some(entry) if entry.generation == request.generation => true,
            Some(entry) => {
                debug!(
                    path = %request.path,
                    issued = request.generation,
                    current = entry.generation,
                    "dropping stale source fulfillment"
                );
                false
            }
            None => {
                debug!(path = %request.path, "dropping source fulfillment after teardown");
                false
            }
        }
    }

    /// Drops all sources. In-flight fetches are not aborted; their eventual
    /// fulfillment fails the [`SourceService::is_current`] check instead.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
