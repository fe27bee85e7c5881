use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// One line of a purchase order, priced when the order was created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub catalog_product_id: Uuid,
    pub product_name: String,
    pub quantity_requested: i64,
    pub quantity_approved: Option<i64>,
    pub unit_price: i64,
}

impl OrderItem {
    /// Approved quantity once the order is approved, requested otherwise.
    pub fn effective_quantity(&self) -> i64 {
        self.quantity_approved.unwrap_or(self.quantity_requested)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "product_order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub order_id: String,
    pub position: i32,
    pub catalog_product_id: String,
    pub product_name: String,
    pub quantity_requested: i64,
    pub quantity_approved: Option<i64>,
    pub unit_price: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product_orders::Entity",
        from = "Column::OrderId",
        to = "super::product_orders::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Orders,
}

impl Related<super::product_orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn from_item(order_id: Uuid, position: i32, item: &OrderItem) -> Self {
        Self {
            id: ActiveValue::Set(item.id.to_string()),
            order_id: ActiveValue::Set(order_id.to_string()),
            position: ActiveValue::Set(position),
            catalog_product_id: ActiveValue::Set(item.catalog_product_id.to_string()),
            product_name: ActiveValue::Set(item.product_name.clone()),
            quantity_requested: ActiveValue::Set(item.quantity_requested),
            quantity_approved: ActiveValue::Set(item.quantity_approved),
            unit_price: ActiveValue::Set(item.unit_price),
        }
    }
}

impl TryFrom<Model> for OrderItem {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "order item")?,
            catalog_product_id: parse_uuid(&model.catalog_product_id, "catalog product")?,
            product_name: model.product_name,
            quantity_requested: model.quantity_requested,
            quantity_approved: model.quantity_approved,
            unit_price: model.unit_price,
        })
    }
}
