//! Operation requests.
//!
//! A request is built by the caller, checked by the validation gate and
//! discarded once the operation commits or aborts.

use serde::{Deserialize, Serialize};

use crate::storage::{LotId, LotMetadata};

/// Receive `quantity` of `item` into a lot at `location`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRequest {
    pub item: String,
    pub quantity: i64,
    pub location: String,

    /// Existing lot to add to; a fresh lot is created when absent
    pub lot_id: Option<LotId>,

    /// Applied only when a new lot is created
    pub metadata: LotMetadata,

    pub actor: String,
    pub work_order: Option<String>,
}

impl StockRequest {
    pub fn new(
        item: impl Into<String>,
        quantity: i64,
        location: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            item: item.into(),
            quantity,
            location: location.into(),
            lot_id: None,
            metadata: LotMetadata::default(),
            actor: actor.into(),
            work_order: None,
        }
    }

    pub fn with_lot(mut self, lot_id: LotId) -> Self {
        self.lot_id = Some(lot_id);
        self
    }

    pub fn with_metadata(mut self, metadata: LotMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_work_order(mut self, work_order: impl Into<String>) -> Self {
        self.work_order = Some(work_order.into());
        self
    }
}

/// Move `quantity` of `item` from on-hand to staged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickRequest {
    pub item: String,
    pub quantity: i64,

    /// Pin a single lot; FIFO across all lots of the item when absent
    pub lot_id: Option<LotId>,

    /// Where the staged stock is going (production line, kit cart)
    pub destination: Option<String>,

    pub actor: String,
    pub work_order: Option<String>,
}

impl PickRequest {
    pub fn new(item: impl Into<String>, quantity: i64, actor: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            quantity,
            lot_id: None,
            destination: None,
            actor: actor.into(),
            work_order: None,
        }
    }

    pub fn with_lot(mut self, lot_id: LotId) -> Self {
        self.lot_id = Some(lot_id);
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_work_order(mut self, work_order: impl Into<String>) -> Self {
        self.work_order = Some(work_order.into());
        self
    }
}

/// What a restock returns stock to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestockTarget {
    Lot(LotId),
    Item(String),
}

/// Move `quantity` from staged back to on-hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestockRequest {
    pub target: RestockTarget,
    pub quantity: i64,

    /// New storage location for the lot, if it moves
    pub location: Option<String>,

    pub actor: String,
    pub work_order: Option<String>,
}

impl RestockRequest {
    pub fn for_lot(lot_id: LotId, quantity: i64, actor: impl Into<String>) -> Self {
        Self::new(RestockTarget::Lot(lot_id), quantity, actor)
    }

    pub fn for_item(item: impl Into<String>, quantity: i64, actor: impl Into<String>) -> Self {
        Self::new(RestockTarget::Item(item.into()), quantity, actor)
    }

    fn new(target: RestockTarget, quantity: i64, actor: impl Into<String>) -> Self {
        Self {
            target,
            quantity,
            location: None,
            actor: actor.into(),
            work_order: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_work_order(mut self, work_order: impl Into<String>) -> Self {
        self.work_order = Some(work_order.into());
        self
    }
}

/// Correct a lot's on-hand quantity by a signed amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustRequest {
    pub lot_id: LotId,
    pub delta: i64,
    pub actor: String,
    pub work_order: Option<String>,
}

impl AdjustRequest {
    pub fn new(lot_id: LotId, delta: i64, actor: impl Into<String>) -> Self {
        Self {
            lot_id,
            delta,
            actor: actor.into(),
            work_order: None,
        }
    }

    pub fn with_work_order(mut self, work_order: impl Into<String>) -> Self {
        self.work_order = Some(work_order.into());
        self
    }
}
