//! Per-asset readiness cache consulted by the synchronous drag path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use crate::record::AssetId;

/// What the gate currently knows about one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Never resolved, or invalidated by a state change since.
    Unknown,
    /// An async resolve is running.
    Checking,
    /// Owned, completed, and the file existed when last checked.
    Ready(PathBuf),
    NotReady,
}

#[derive(Debug)]
struct Entry {
    readiness: Readiness,
    generation: u64,
}

/// Every invalidation bumps the asset's generation; a resolve started under an
/// older generation cannot store its result.
#[derive(Debug, Default)]
pub(crate) struct ReadinessCache {
    entries: RwLock<HashMap<AssetId, Entry>>,
}

impl ReadinessCache {
    pub(crate) fn get(&self, asset_id: &str) -> Readiness {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(asset_id)
            .map(|e| e.readiness.clone())
            .unwrap_or(Readiness::Unknown)
    }

    pub(crate) fn ready_path(&self, asset_id: &str) -> Option<PathBuf> {
        match self.get(asset_id) {
            Readiness::Ready(path) => Some(path),
            _ => None,
        }
    }

    /// Mark `asset_id` as `Checking`; returns the generation the check runs under.
    pub(crate) fn begin_check(&self, asset_id: &str) -> u64 {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(asset_id.to_string()).or_insert(Entry {
            readiness: Readiness::Unknown,
            generation: 0,
        });
        entry.generation += 1;
        entry.readiness = Readiness::Checking;
        entry.generation
    }

    /// Store a resolve result. Returns false if the entry was invalidated (or
    /// re-checked) since `begin_check`.
    pub(crate) fn finish(&self, asset_id: &str, generation: u64, readiness: Readiness) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(asset_id) {
            Some(entry) if entry.generation == generation => {
                entry.readiness = readiness;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn invalidate(&self, asset_id: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get_mut(asset_id) {
            entry.generation += 1;
            entry.readiness = Readiness::Unknown;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_until_resolved() {
        let cache = ReadinessCache::default();
        assert_eq!(cache.get("a1"), Readiness::Unknown);
        let generation = cache.begin_check("a1");
        assert_eq!(cache.get("a1"), Readiness::Checking);
        assert!(cache.finish("a1", generation, Readiness::Ready(PathBuf::from("/x.wav"))));
        assert_eq!(cache.ready_path("a1"), Some(PathBuf::from("/x.wav")));
    }

    #[test]
    fn invalidation_discards_in_flight_result() {
        let cache = ReadinessCache::default();
        let generation = cache.begin_check("a1");
        cache.invalidate("a1");
        assert!(!cache.finish("a1", generation, Readiness::Ready(PathBuf::from("/x.wav"))));
        assert_eq!(cache.get("a1"), Readiness::Unknown);
    }

    #[test]
    fn newer_check_wins_over_older() {
        let cache = ReadinessCache::default();
        let old = cache.begin_check("a1");
        let new = cache.begin_check("a1");
        assert!(!cache.finish("a1", old, Readiness::NotReady));
        assert!(cache.finish("a1", new, Readiness::Ready(PathBuf::from("/x.wav"))));
        assert!(cache.ready_path("a1").is_some());
    }

    #[test]
    fn invalidating_unknown_asset_is_noop() {
        let cache = ReadinessCache::default();
        cache.invalidate("nope");
        assert_eq!(cache.get("nope"), Readiness::Unknown);
    }
}
