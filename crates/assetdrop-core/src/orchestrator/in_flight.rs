//! Set of assets with a materialization underway (queued or transferring).

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::record::AssetId;

#[derive(Debug, Default, Clone)]
pub(super) struct InFlight {
    assets: Arc<Mutex<HashSet<AssetId>>>,
}

impl InFlight {
    /// Claim `asset_id`. Returns `None` if another call already holds it.
    pub(super) fn try_claim(&self, asset_id: &str) -> Option<InFlightGuard> {
        let mut assets = self.assets.lock().unwrap_or_else(PoisonError::into_inner);
        if !assets.insert(asset_id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            assets: Arc::clone(&self.assets),
            asset_id: asset_id.to_string(),
        })
    }

    pub(super) fn contains(&self, asset_id: &str) -> bool {
        self.assets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(asset_id)
    }
}

/// Releases the claim when dropped, whatever way the materialization ends.
pub(super) struct InFlightGuard {
    assets: Arc<Mutex<HashSet<AssetId>>>,
    asset_id: AssetId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.assets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.asset_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive_until_dropped() {
        let in_flight = InFlight::default();
        let guard = in_flight.try_claim("a1").unwrap();
        assert!(in_flight.try_claim("a1").is_none());
        assert!(in_flight.try_claim("a2").is_some());
        assert!(in_flight.contains("a1"));
        drop(guard);
        assert!(!in_flight.contains("a1"));
        assert!(in_flight.try_claim("a1").is_some());
    }
}
