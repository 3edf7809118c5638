//! Transient "download first" signals raised when a drag is suppressed.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::record::AssetId;

/// Per-asset signals and the batch signal are tracked separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SignalScope {
    Asset(AssetId),
    Batch,
}

/// A raised signal; it stops being reported once `expires_at` passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotReadySignal {
    pub scope: SignalScope,
    pub raised_at: Instant,
    pub expires_at: Instant,
}

impl NotReadySignal {
    pub fn is_active_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
pub(crate) struct SignalBoard {
    ttl: Duration,
    signals: Mutex<HashMap<SignalScope, NotReadySignal>>,
}

impl SignalBoard {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            signals: Mutex::new(HashMap::new()),
        }
    }

    /// Raise (or re-raise, extending) the signal for `scope`.
    pub(crate) fn raise(&self, scope: SignalScope) -> NotReadySignal {
        let now = Instant::now();
        let signal = NotReadySignal {
            scope: scope.clone(),
            raised_at: now,
            expires_at: now + self.ttl,
        };
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        signals.retain(|_, s| s.is_active_at(now));
        signals.insert(scope, signal.clone());
        signal
    }

    pub(crate) fn active(&self, scope: &SignalScope) -> Option<NotReadySignal> {
        let now = Instant::now();
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope)
            .filter(|s| s.is_active_at(now))
            .cloned()
    }

    pub(crate) fn all_active(&self) -> Vec<NotReadySignal> {
        let now = Instant::now();
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        signals.retain(|_, s| s.is_active_at(now));
        signals.values().cloned().collect()
    }
}
