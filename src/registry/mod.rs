//! The dependency registry: watched paths mapped to dependent records.
//!
//! Registration order is contractual (callbacks fire in the order they were
//! subscribed) and so is multiplicity: subscribing the same pair twice yields
//! two notifications. Consumers are notified once per dependent definition,
//! not once per unique path.

use crate::path::Path;

/// One delivery produced by [`DependencyRegistry::notify_changed`].
#[derive(Debug, Clone, PartialEq)]
pub struct Notification<T> {
    /// The registered watched path that matched.
    pub watched: Path,
    /// The path whose value changed.
    pub changed: Path,
    /// The dependent record subscribed under the watched path.
    pub tag: T,
}

/// An ordered, duplicate-preserving registry of `(watched path, dependent)`
/// entries, owned by the form instance and discarded at teardown.
#[derive(Debug, Default)]
pub struct DependencyRegistry<T> {
    entries: Vec<(Path, T)>,
}

impl<T: Clone> DependencyRegistry<T> {
    pub fn new() -> DependencyRegistry<T> {
        DependencyRegistry {
            entries: Vec::new(),
        }
    }

    /// Appends one entry per watched path. No deduplication.
    pub fn subscribe(&mut self, paths: &[Path], tag: T) {
        for path in paths {
            self.entries.push((path.clone(), tag.clone()));
        }
    }

    /// Collects, in registration order, every entry whose watched path is a
    /// sub-path or super-path of the changed path.
    pub fn notify_changed(&self, changed: &Path) -> Vec<Notification<T>> {
        self.entries
            .iter()
            .filter(|(watched, _)| watched.is_related(changed))
            .map(|(watched, tag)| Notification {
                watched: watched.clone(),
                changed: changed.clone(),
                tag: tag.clone(),
            })
            .collect()
    }

    /// Drops all registrations. Called on form re-render so stale entries
    /// cannot double-fire.
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
