//! Window collection with stable ids and insertion-order precedence.

/// Stable identifier for a shell window. Ids are allocated by the registry
/// before the window itself exists, so callers can wire parent/child
/// relationships ahead of realization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl WindowId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// Result of one close sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullOutcome {
    /// The primary window asked to close. The registry is left intact; the
    /// application tears everything down wholesale.
    PrimaryClosed,
    /// Number of non-primary windows removed.
    Removed(usize),
}

/// Dense, insertion-ordered window arena. The first inserted window is the
/// primary; its close ends the application. Generic over the window type so
/// the loop logic is testable without a windowing system.
#[derive(Debug)]
pub struct WindowRegistry<W> {
    entries: Vec<(WindowId, W)>,
    next_id: u64,
}

impl<W> WindowRegistry<W> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Reserve an id for a window that will be inserted later.
    pub fn allocate_id(&mut self) -> WindowId {
        let id = WindowId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, id: WindowId, window: W) {
        debug_assert!(
            self.entries.iter().all(|(existing, _)| *existing != id),
            "duplicate {id}"
        );
        self.entries.push((id, window));
    }

    pub fn remove(&mut self, id: WindowId) -> Option<W> {
        let index = self.entries.iter().position(|(existing, _)| *existing == id)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, id: WindowId) -> Option<&W> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, w)| w)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut W> {
        self.entries
            .iter_mut()
            .find(|(existing, _)| *existing == id)
            .map(|(_, w)| w)
    }

    pub fn primary_id(&self) -> Option<WindowId> {
        self.entries.first().map(|(id, _)| *id)
    }

    /// Snapshot of all ids in registry order. Iterating the snapshot stays
    /// valid while windows are inserted or removed mid-tick.
    pub fn ids(&self) -> Vec<WindowId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WindowId, &W)> {
        self.entries.iter().map(|(id, w)| (*id, w))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (WindowId, &mut W)> {
        self.entries.iter_mut().map(|(id, w)| (*id, w))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Sweep close requests. A closing primary short-circuits: nothing is
    /// removed and the caller transitions to teardown. Otherwise every
    /// closing non-primary entry is dropped.
    pub fn cull_closed(&mut self, mut is_closed: impl FnMut(&W) -> bool) -> CullOutcome {
        if let Some((_, primary)) = self.entries.first() {
            if is_closed(primary) {
                return CullOutcome::PrimaryClosed;
            }
        }
        let before = self.entries.len();
        let mut primary = true;
        self.entries.retain(|(_, w)| {
            if primary {
                primary = false;
                return true;
            }
            !is_closed(w)
        });
        CullOutcome::Removed(before - self.entries.len())
    }
}

impl<W> Default for WindowRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_of(names: &[&'static str]) -> (WindowRegistry<&'static str>, Vec<WindowId>) {
        let mut registry = WindowRegistry::new();
        let mut ids = Vec::new();
        for name in names {
            let id = registry.allocate_id();
            registry.insert(id, *name);
            ids.push(id);
        }
        (registry, ids)
    }

    #[test]
    fn ids_are_distinct_and_ordered() {
        let (registry, ids) = registry_of(&["a", "b", "c"]);
        assert_eq!(registry.ids(), ids);
        assert_eq!(registry.primary_id(), Some(ids[0]));
        assert_eq!(registry.get(ids[1]), Some(&"b"));
    }

    #[test]
    fn remove_keeps_relative_order() {
        let (mut registry, ids) = registry_of(&["a", "b", "c"]);
        assert_eq!(registry.remove(ids[1]), Some("b"));
        assert_eq!(registry.ids(), vec![ids[0], ids[2]]);
        assert_eq!(registry.remove(ids[1]), None);
    }

    #[test]
    fn cull_removes_exactly_the_closed_non_primary_entries() {
        let (mut registry, ids) = registry_of(&["a", "b", "c", "d"]);
        let closing = [ids[1], ids[3]];
        let outcome = registry.cull_closed(|w| *w == "b" || *w == "d");
        assert_eq!(outcome, CullOutcome::Removed(2));
        assert_eq!(registry.ids(), vec![ids[0], ids[2]]);
        for id in closing {
            assert!(registry.get(id).is_none());
        }
    }

    #[test]
    fn primary_close_leaves_registry_intact() {
        let (mut registry, ids) = registry_of(&["a", "b", "c"]);
        let outcome = registry.cull_closed(|w| *w == "a" || *w == "c");
        assert_eq!(outcome, CullOutcome::PrimaryClosed);
        assert_eq!(registry.len(), 3, "teardown owns the removals");
        assert_eq!(registry.primary_id(), Some(ids[0]));
    }

    #[test]
    fn cull_on_empty_registry_removes_nothing() {
        let mut registry: WindowRegistry<&'static str> = WindowRegistry::new();
        assert_eq!(registry.cull_closed(|_| true), CullOutcome::Removed(0));
    }

    #[test]
    fn successor_becomes_primary_after_removal() {
        let (mut registry, ids) = registry_of(&["a", "b"]);
        registry.remove(ids[0]);
        assert_eq!(registry.primary_id(), Some(ids[1]));
        let outcome = registry.cull_closed(|w| *w == "b");
        assert_eq!(outcome, CullOutcome::PrimaryClosed);
    }
}
