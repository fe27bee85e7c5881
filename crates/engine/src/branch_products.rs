//! Products stocked at a branch.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    util::{normalize_key, parse_optional_uuid, parse_uuid},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BranchProduct {
    pub id: Uuid,
    pub branch_id: String,
    pub catalog_product_id: Option<Uuid>,
    pub name: String,
    pub stock: i64,
    pub cost: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BranchProduct {
    pub fn new(
        branch_id: String,
        catalog_product_id: Option<Uuid>,
        name: String,
        cost: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            branch_id,
            catalog_product_id,
            name,
            stock: 0,
            cost,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "branch_products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub branch_id: String,
    pub catalog_product_id: Option<String>,
    pub name: String,
    /// Lookup key for matching by name, see `util::normalize_key`.
    pub name_norm: String,
    pub stock: i64,
    pub cost: i64,
    pub version: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&BranchProduct> for ActiveModel {
    fn from(value: &BranchProduct) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            branch_id: ActiveValue::Set(value.branch_id.clone()),
            catalog_product_id: ActiveValue::Set(value.catalog_product_id.map(|id| id.to_string())),
            name: ActiveValue::Set(value.name.clone()),
            name_norm: ActiveValue::Set(normalize_key(&value.name)),
            stock: ActiveValue::Set(value.stock),
            cost: ActiveValue::Set(value.cost),
            version: ActiveValue::Set(value.version),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
        }
    }
}

impl TryFrom<Model> for BranchProduct {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "branch product")?,
            branch_id: model.branch_id,
            catalog_product_id: parse_optional_uuid(
                model.catalog_product_id.as_deref(),
                "catalog product",
            )?,
            name: model.name,
            stock: model.stock,
            cost: model.cost,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
