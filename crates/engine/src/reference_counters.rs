//! Per-prefix, per-year counters behind human facing numbers such as
//! `PO-2026-00042` and `BATCH-2026-01100`.
//!
//! The counter row is bumped inside the caller's transaction, so numbers are
//! gap-free per committed write and never collide.

use chrono::{DateTime, Datelike, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, entity::prelude::*, sea_query::Expr,
};

use crate::{EngineError, ResultEngine, util::reference_number};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "reference_counters")]
pub struct Model {
    /// `<prefix>-<year>`
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub last_value: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Next number for `prefix` in the year of `now`.
pub(crate) async fn next_reference(
    db_tx: &DatabaseTransaction,
    prefix: &str,
    now: DateTime<Utc>,
) -> ResultEngine<String> {
    let year = now.year();
    let key = format!("{prefix}-{year}");
    let value = match Entity::find_by_id(key.clone()).one(db_tx).await? {
        Some(counter) => {
            let next = counter
                .last_value
                .checked_add(1)
                .ok_or_else(|| EngineError::Validation(format!("{key} numbers exhausted")))?;
            let result = Entity::update_many()
                .col_expr(Column::LastValue, Expr::value(next))
                .filter(Column::Key.eq(key.as_str()))
                .filter(Column::LastValue.eq(counter.last_value))
                .exec(db_tx)
                .await?;
            if result.rows_affected != 1 {
                return Err(EngineError::Conflict(format!(
                    "{key} counter was modified concurrently"
                )));
            }
            next
        }
        None => {
            ActiveModel {
                key: ActiveValue::Set(key),
                last_value: ActiveValue::Set(1),
            }
            .insert(db_tx)
            .await?;
            1
        }
    };
    Ok(reference_number(prefix, year, value))
}
