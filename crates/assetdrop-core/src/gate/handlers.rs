//! Per-element drag handlers bound to one asset.

use crate::record::AssetId;

use super::{DragDecision, ExportGate};

/// The three callbacks a drag-capable element wires to its pointer/drag events.
#[derive(Clone)]
pub struct DragHandlers {
    gate: ExportGate,
    asset_id: AssetId,
    owned: bool,
}

impl DragHandlers {
    pub(super) fn new(gate: ExportGate, asset_id: AssetId, owned: bool) -> Self {
        Self {
            gate,
            asset_id,
            owned,
        }
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn on_pointer_down(&self) {
        self.gate.pointer_down(&self.asset_id, self.owned);
    }

    pub fn on_drag_start(&self) -> DragDecision {
        self.gate.drag_start(&self.asset_id, self.owned)
    }

    pub fn on_drag_end(&self) {
        self.gate.drag_end();
    }
}

impl std::fmt::Debug for DragHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DragHandlers")
            .field("asset_id", &self.asset_id)
            .field("owned", &self.owned)
            .finish()
    }
}
