//! Central warehouse products.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogProduct {
    pub id: Uuid,
    pub name: String,
    /// Price charged to branches, in minor units.
    pub price: i64,
    pub cost: i64,
    pub stock: i64,
    /// Quantity earmarked for approved, not yet shipped orders.
    pub reserved_stock: i64,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogProduct {
    pub fn new(name: String, price: i64, cost: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            price,
            cost,
            stock: 0,
            reserved_stock: 0,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stock that is neither shipped nor reserved.
    pub fn available(&self) -> i64 {
        (self.stock - self.reserved_stock).max(0)
    }

    pub fn reserve(&mut self, quantity: i64) -> ResultEngine<()> {
        if quantity > self.available() {
            return Err(EngineError::InsufficientStock(format!(
                "{}: {} available, {quantity} requested",
                self.name,
                self.available()
            )));
        }
        self.reserved_stock += quantity;
        Ok(())
    }

    pub fn unreserve(&mut self, quantity: i64) {
        self.reserved_stock = (self.reserved_stock - quantity).max(0);
    }

    /// Removes shipped units from both the stock and the reservation.
    pub fn ship(&mut self, quantity: i64) -> ResultEngine<()> {
        if self.stock < quantity {
            return Err(EngineError::InsufficientStock(format!(
                "{}: {} in stock, {quantity} to ship",
                self.name, self.stock
            )));
        }
        self.stock -= quantity;
        self.reserved_stock = (self.reserved_stock - quantity).max(0);
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "catalog_products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub price: i64,
    pub cost: i64,
    pub stock: i64,
    pub reserved_stock: i64,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CatalogProduct> for ActiveModel {
    fn from(value: &CatalogProduct) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            price: ActiveValue::Set(value.price),
            cost: ActiveValue::Set(value.cost),
            stock: ActiveValue::Set(value.stock),
            reserved_stock: ActiveValue::Set(value.reserved_stock),
            is_active: ActiveValue::Set(value.is_active),
            version: ActiveValue::Set(value.version),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl TryFrom<Model> for CatalogProduct {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "catalog product")?,
            name: model.name,
            price: model.price,
            cost: model.cost,
            stock: model.stock,
            reserved_stock: model.reserved_stock,
            is_active: model.is_active,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
