//! FIFO inventory lots.
//!
//! A batch is one receipt of a product at a location. Consumption always
//! draws from the oldest lot first (`received_at`, then insertion
//! `sequence`). Emptied lots are kept for the audit trail.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// Where a batch is stored.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "branch_id", rename_all = "snake_case")]
pub enum StockLocation {
    Central,
    Branch(String),
}

impl StockLocation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Central => "central",
            Self::Branch(_) => "branch",
        }
    }

    pub fn branch_id(&self) -> Option<&str> {
        match self {
            Self::Central => None,
            Self::Branch(id) => Some(id),
        }
    }

    fn from_parts(kind: &str, branch_id: Option<String>) -> ResultEngine<Self> {
        match (kind, branch_id) {
            ("central", _) => Ok(Self::Central),
            ("branch", Some(id)) => Ok(Self::Branch(id)),
            (other, _) => Err(EngineError::Validation(format!(
                "invalid stock location: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InventoryBatch {
    pub id: Uuid,
    /// `BATCH-YYYY-NNNNN`
    pub batch_number: String,
    /// Catalog product id for central lots, branch product id otherwise.
    pub product_id: Uuid,
    pub location: StockLocation,
    pub quantity_remaining: i64,
    pub initial_quantity: i64,
    pub unit_cost: i64,
    pub received_at: DateTime<Utc>,
    pub sequence: i64,
    pub expiry_date: Option<DateTime<Utc>>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
}

/// Planned draw from one batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchDraw {
    pub batch_id: Uuid,
    pub batch_number: String,
    pub quantity: i64,
    pub remaining_after: i64,
}

/// Plans the consumption of `quantity` units oldest lot first.
///
/// The input order does not matter. Nothing is mutated; the caller applies
/// the returned draws. Fails with `InsufficientStock` when the lots cannot
/// cover the whole quantity.
pub fn allocate_fifo(batches: &[InventoryBatch], quantity: i64) -> ResultEngine<Vec<BatchDraw>> {
    if quantity <= 0 {
        return Err(EngineError::Validation("quantity must be > 0".to_string()));
    }

    let mut ordered: Vec<&InventoryBatch> = batches
        .iter()
        .filter(|batch| batch.quantity_remaining > 0)
        .collect();
    ordered.sort_by_key(|batch| (batch.received_at, batch.sequence));

    let mut remaining = quantity;
    let mut draws = Vec::new();
    for batch in ordered {
        if remaining == 0 {
            break;
        }
        let take = batch.quantity_remaining.min(remaining);
        draws.push(BatchDraw {
            batch_id: batch.id,
            batch_number: batch.batch_number.clone(),
            quantity: take,
            remaining_after: batch.quantity_remaining - take,
        });
        remaining -= take;
    }

    if remaining > 0 {
        return Err(EngineError::InsufficientStock(format!(
            "batches cover {} of {quantity} units",
            quantity - remaining
        )));
    }
    Ok(draws)
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "inventory_batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub batch_number: String,
    pub product_id: String,
    pub location_kind: String,
    pub branch_id: Option<String>,
    pub quantity_remaining: i64,
    pub initial_quantity: i64,
    pub unit_cost: i64,
    pub received_at: DateTimeUtc,
    pub sequence: i64,
    pub expiry_date: Option<DateTimeUtc>,
    pub supplier: Option<String>,
    pub notes: Option<String>,
    pub created_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&InventoryBatch> for ActiveModel {
    fn from(value: &InventoryBatch) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            batch_number: ActiveValue::Set(value.batch_number.clone()),
            product_id: ActiveValue::Set(value.product_id.to_string()),
            location_kind: ActiveValue::Set(value.location.kind().to_string()),
            branch_id: ActiveValue::Set(value.location.branch_id().map(ToString::to_string)),
            quantity_remaining: ActiveValue::Set(value.quantity_remaining),
            initial_quantity: ActiveValue::Set(value.initial_quantity),
            unit_cost: ActiveValue::Set(value.unit_cost),
            received_at: ActiveValue::Set(value.received_at),
            sequence: ActiveValue::Set(value.sequence),
            expiry_date: ActiveValue::Set(value.expiry_date),
            supplier: ActiveValue::Set(value.supplier.clone()),
            notes: ActiveValue::Set(value.notes.clone()),
            created_by: ActiveValue::Set(value.created_by.clone()),
        }
    }
}

impl TryFrom<Model> for InventoryBatch {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "batch")?,
            batch_number: model.batch_number,
            product_id: parse_uuid(&model.product_id, "product")?,
            location: StockLocation::from_parts(&model.location_kind, model.branch_id)?,
            quantity_remaining: model.quantity_remaining,
            initial_quantity: model.initial_quantity,
            unit_cost: model.unit_cost,
            received_at: model.received_at,
            sequence: model.sequence,
            expiry_date: model.expiry_date,
            supplier: model.supplier,
            notes: model.notes,
            created_by: model.created_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn batch(number: &str, quantity: i64, received_at: DateTime<Utc>, sequence: i64) -> InventoryBatch {
        InventoryBatch {
            id: Uuid::new_v4(),
            batch_number: number.to_string(),
            product_id: Uuid::nil(),
            location: StockLocation::Central,
            quantity_remaining: quantity,
            initial_quantity: quantity,
            unit_cost: 100,
            received_at,
            sequence,
            expiry_date: None,
            supplier: None,
            notes: None,
            created_by: "hq".to_string(),
        }
    }

    #[test]
    fn oldest_batch_is_emptied_first() {
        let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let t2 = t1 + Duration::days(3);
        // Deliberately out of order.
        let batches = vec![batch("B2", 5, t2, 2), batch("B1", 5, t1, 1)];

        let draws = allocate_fifo(&batches, 7).unwrap();

        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].batch_number, "B1");
        assert_eq!(draws[0].quantity, 5);
        assert_eq!(draws[0].remaining_after, 0);
        assert_eq!(draws[1].batch_number, "B2");
        assert_eq!(draws[1].quantity, 2);
        assert_eq!(draws[1].remaining_after, 3);
    }

    #[test]
    fn same_timestamp_falls_back_to_sequence() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let batches = vec![batch("late", 4, t, 9), batch("early", 4, t, 3)];

        let draws = allocate_fifo(&batches, 2).unwrap();

        assert_eq!(draws[0].batch_number, "early");
    }

    #[test]
    fn empty_batches_are_skipped_and_shortfall_fails() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let batches = vec![batch("B0", 0, t, 1), batch("B1", 3, t, 2)];

        let err = allocate_fifo(&batches, 4).unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::InsufficientStock);
        assert_eq!(allocate_fifo(&batches, 3).unwrap().len(), 1);
    }
}
