//! Warehouse catalog, branch products and FIFO lots.

use chrono::Utc;
use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    BatchDraw, BranchProduct, CatalogProduct, CatalogProductCmd, EngineError, EngineEvent,
    InventoryBatch, ReceiveStockCmd, ResultEngine, StockLocation, allocate_fifo, branch_products,
    catalog_products, inventory_batches,
    reference_counters::next_reference,
    util::{
        normalize_key, normalize_optional_text, normalize_required_text, require_positive,
    },
};

use super::{Engine, stale, with_tx};

/// A new lot to record, see [`Engine::insert_batch`].
pub(crate) struct NewBatch<'a> {
    pub product_id: Uuid,
    pub location: StockLocation,
    pub quantity: i64,
    pub unit_cost: i64,
    pub supplier: Option<String>,
    pub expiry_date: Option<chrono::DateTime<Utc>>,
    pub notes: Option<String>,
    pub actor: &'a str,
}

impl Engine {
    pub async fn create_catalog_product(
        &self,
        cmd: CatalogProductCmd,
    ) -> ResultEngine<CatalogProduct> {
        let name = normalize_required_text(&cmd.name, "product name")?;
        require_positive(cmd.price, "price")?;
        if cmd.cost < 0 {
            return Err(EngineError::Validation("cost must not be negative".to_string()));
        }
        with_tx!(self, |db_tx| {
            let product = CatalogProduct::new(name, cmd.price, cmd.cost, Utc::now());
            catalog_products::ActiveModel::from(&product)
                .insert(&db_tx)
                .await?;
            tracing::info!(product_id = %product.id, name = %product.name, "catalog product created");
            Ok(product)
        })
    }

    pub async fn catalog_product(&self, product_id: Uuid) -> ResultEngine<CatalogProduct> {
        with_tx!(self, |db_tx| self.load_catalog_product(&db_tx, product_id).await)
    }

    /// Catalog products by name; inactive ones only when asked for.
    pub async fn catalog_products(&self, include_inactive: bool) -> ResultEngine<Vec<CatalogProduct>> {
        with_tx!(self, |db_tx| {
            let mut query = catalog_products::Entity::find();
            if !include_inactive {
                query = query.filter(catalog_products::Column::IsActive.eq(true));
            }
            query
                .order_by_asc(catalog_products::Column::Name)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(CatalogProduct::try_from)
                .collect()
        })
    }

    /// Inactive products cannot be ordered; existing orders are unaffected.
    pub async fn set_catalog_product_active(
        &self,
        product_id: Uuid,
        is_active: bool,
    ) -> ResultEngine<CatalogProduct> {
        with_tx!(self, |db_tx| {
            let mut product = self.load_catalog_product(&db_tx, product_id).await?;
            product.is_active = is_active;
            self.save_catalog_product(&db_tx, &mut product).await?;
            Ok(product)
        })
    }

    /// Record a delivery at the central warehouse as a new FIFO lot.
    pub async fn receive_central_stock(&self, cmd: ReceiveStockCmd) -> ResultEngine<InventoryBatch> {
        require_positive(cmd.quantity, "quantity")?;
        if cmd.unit_cost.is_some_and(|cost| cost < 0) {
            return Err(EngineError::Validation("unit cost must not be negative".to_string()));
        }
        let (batch, product, previous_stock) = with_tx!(self, |db_tx| {
            let mut product = self.load_catalog_product(&db_tx, cmd.product_id).await?;
            let previous_stock = product.stock;
            let batch = self
                .insert_batch(
                    &db_tx,
                    NewBatch {
                        product_id: product.id,
                        location: StockLocation::Central,
                        quantity: cmd.quantity,
                        unit_cost: cmd.unit_cost.unwrap_or(product.cost),
                        supplier: normalize_optional_text(cmd.supplier.as_deref()),
                        expiry_date: cmd.expiry_date,
                        notes: normalize_optional_text(cmd.notes.as_deref()),
                        actor: &cmd.actor,
                    },
                )
                .await?;
            product.stock += cmd.quantity;
            self.save_catalog_product(&db_tx, &mut product).await?;
            Ok((batch, product, previous_stock))
        })?;

        tracing::info!(
            product_id = %product.id,
            batch = %batch.batch_number,
            quantity = cmd.quantity,
            stock = product.stock,
            "central stock received"
        );
        if previous_stock == 0 {
            self.emit(EngineEvent::CatalogRestocked {
                product_id: product.id,
                product_name: product.name,
                quantity: cmd.quantity,
            });
        }
        Ok(batch)
    }

    pub async fn branch_product(&self, branch_product_id: Uuid) -> ResultEngine<BranchProduct> {
        with_tx!(self, |db_tx| self.load_branch_product(&db_tx, branch_product_id).await)
    }

    pub async fn branch_products(&self, branch_id: &str) -> ResultEngine<Vec<BranchProduct>> {
        with_tx!(self, |db_tx| {
            branch_products::Entity::find()
                .filter(branch_products::Column::BranchId.eq(branch_id))
                .order_by_asc(branch_products::Column::Name)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(BranchProduct::try_from)
                .collect()
        })
    }

    /// Use stock at a branch, oldest lot first.
    pub async fn consume_branch_stock(
        &self,
        branch_product_id: Uuid,
        quantity: i64,
        reason: Option<&str>,
    ) -> ResultEngine<Vec<BatchDraw>> {
        require_positive(quantity, "quantity")?;
        let reason = normalize_optional_text(reason);
        with_tx!(self, |db_tx| {
            let mut product = self.load_branch_product(&db_tx, branch_product_id).await?;
            if product.stock < quantity {
                return Err(EngineError::InsufficientStock(format!(
                    "{}: {} in stock, {quantity} requested",
                    product.name, product.stock
                )));
            }
            let location = StockLocation::Branch(product.branch_id.clone());
            let draws = self
                .draw_batches(&db_tx, product.id, &location, quantity)
                .await?;
            product.stock -= quantity;
            self.save_branch_product(&db_tx, &mut product).await?;
            tracing::info!(
                branch_product_id = %product.id,
                quantity,
                reason = reason.as_deref().unwrap_or("-"),
                "branch stock consumed"
            );
            Ok(draws)
        })
    }

    /// Lots of a product at a location in FIFO order, emptied ones included.
    pub async fn batches(
        &self,
        location: &StockLocation,
        product_id: Uuid,
    ) -> ResultEngine<Vec<InventoryBatch>> {
        with_tx!(self, |db_tx| {
            load_batches(&db_tx, product_id, location, false).await
        })
    }

    pub(crate) async fn load_catalog_product(
        &self,
        db_tx: &DatabaseTransaction,
        product_id: Uuid,
    ) -> ResultEngine<CatalogProduct> {
        let model = catalog_products::Entity::find_by_id(product_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("catalog product {product_id}")))?;
        CatalogProduct::try_from(model)
    }

    pub(crate) async fn save_catalog_product(
        &self,
        db_tx: &DatabaseTransaction,
        product: &mut CatalogProduct,
    ) -> ResultEngine<()> {
        let expected_version = product.version;
        product.version += 1;
        product.updated_at = Utc::now();
        catalog_products::Entity::update(catalog_products::ActiveModel::from(&*product))
            .filter(catalog_products::Column::Version.eq(expected_version))
            .exec(db_tx)
            .await
            .map_err(|err| stale("catalog product", err))?;
        Ok(())
    }

    async fn load_branch_product(
        &self,
        db_tx: &DatabaseTransaction,
        branch_product_id: Uuid,
    ) -> ResultEngine<BranchProduct> {
        let model = branch_products::Entity::find_by_id(branch_product_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("branch product {branch_product_id}")))?;
        BranchProduct::try_from(model)
    }

    async fn save_branch_product(
        &self,
        db_tx: &DatabaseTransaction,
        product: &mut BranchProduct,
    ) -> ResultEngine<()> {
        let expected_version = product.version;
        product.version += 1;
        product.updated_at = Utc::now();
        branch_products::Entity::update(branch_products::ActiveModel::from(&*product))
            .filter(branch_products::Column::Version.eq(expected_version))
            .exec(db_tx)
            .await
            .map_err(|err| stale("branch product", err))?;
        Ok(())
    }

    /// Add received units to a branch.
    ///
    /// The branch product is matched by catalog id, then by normalized
    /// name, and created when neither matches. Its cost becomes
    /// `unit_cost` and the units are recorded as a new branch lot.
    pub(crate) async fn receive_at_branch(
        &self,
        db_tx: &DatabaseTransaction,
        branch_id: &str,
        catalog_product_id: Uuid,
        name: &str,
        quantity: i64,
        unit_cost: i64,
        actor: &str,
    ) -> ResultEngine<BranchProduct> {
        let by_catalog = branch_products::Entity::find()
            .filter(branch_products::Column::BranchId.eq(branch_id))
            .filter(branch_products::Column::CatalogProductId.eq(catalog_product_id.to_string()))
            .one(db_tx)
            .await?;
        let found = match by_catalog {
            Some(model) => Some(model),
            None => {
                branch_products::Entity::find()
                    .filter(branch_products::Column::BranchId.eq(branch_id))
                    .filter(branch_products::Column::NameNorm.eq(normalize_key(name)))
                    .one(db_tx)
                    .await?
            }
        };

        let mut product = match found {
            Some(model) => {
                let mut product = BranchProduct::try_from(model)?;
                product.catalog_product_id.get_or_insert(catalog_product_id);
                product
            }
            None => {
                let product = BranchProduct::new(
                    branch_id.to_string(),
                    Some(catalog_product_id),
                    name.to_string(),
                    unit_cost,
                    Utc::now(),
                );
                branch_products::ActiveModel::from(&product)
                    .insert(db_tx)
                    .await?;
                tracing::debug!(branch_id, branch_product_id = %product.id, "branch product created");
                product
            }
        };

        product.stock += quantity;
        product.cost = unit_cost;
        self.save_branch_product(db_tx, &mut product).await?;

        self.insert_batch(
            db_tx,
            NewBatch {
                product_id: product.id,
                location: StockLocation::Branch(branch_id.to_string()),
                quantity,
                unit_cost,
                supplier: None,
                expiry_date: None,
                notes: None,
                actor,
            },
        )
        .await?;
        Ok(product)
    }

    pub(crate) async fn insert_batch(
        &self,
        db_tx: &DatabaseTransaction,
        new: NewBatch<'_>,
    ) -> ResultEngine<InventoryBatch> {
        let now = Utc::now();
        let last = load_batches(db_tx, new.product_id, &new.location, false)
            .await?
            .iter()
            .map(|batch| batch.sequence)
            .max()
            .unwrap_or(0);
        let batch = InventoryBatch {
            id: Uuid::new_v4(),
            batch_number: next_reference(db_tx, "BATCH", now).await?,
            product_id: new.product_id,
            location: new.location,
            quantity_remaining: new.quantity,
            initial_quantity: new.quantity,
            unit_cost: new.unit_cost,
            received_at: now,
            sequence: last + 1,
            expiry_date: new.expiry_date,
            supplier: new.supplier,
            notes: new.notes,
            created_by: new.actor.to_string(),
        };
        inventory_batches::ActiveModel::from(&batch)
            .insert(db_tx)
            .await?;
        Ok(batch)
    }

    /// Take `quantity` units from the lots of a product, oldest first.
    pub(crate) async fn draw_batches(
        &self,
        db_tx: &DatabaseTransaction,
        product_id: Uuid,
        location: &StockLocation,
        quantity: i64,
    ) -> ResultEngine<Vec<BatchDraw>> {
        let batches = load_batches(db_tx, product_id, location, true).await?;
        let draws = allocate_fifo(&batches, quantity)?;
        for draw in &draws {
            let result = inventory_batches::Entity::update_many()
                .col_expr(
                    inventory_batches::Column::QuantityRemaining,
                    Expr::value(draw.remaining_after),
                )
                .filter(inventory_batches::Column::Id.eq(draw.batch_id.to_string()))
                .filter(
                    inventory_batches::Column::QuantityRemaining
                        .eq(draw.remaining_after + draw.quantity),
                )
                .exec(db_tx)
                .await?;
            if result.rows_affected == 0 {
                return Err(EngineError::Conflict(format!(
                    "batch {} was modified concurrently",
                    draw.batch_number
                )));
            }
        }
        tracing::debug!(%product_id, location = location.kind(), quantity, ?draws, "fifo allocation");
        Ok(draws)
    }
}

async fn load_batches(
    db_tx: &DatabaseTransaction,
    product_id: Uuid,
    location: &StockLocation,
    only_remaining: bool,
) -> ResultEngine<Vec<InventoryBatch>> {
    let mut query = inventory_batches::Entity::find()
        .filter(inventory_batches::Column::ProductId.eq(product_id.to_string()))
        .filter(inventory_batches::Column::LocationKind.eq(location.kind()));
    query = match location.branch_id() {
        Some(branch_id) => query.filter(inventory_batches::Column::BranchId.eq(branch_id)),
        None => query.filter(inventory_batches::Column::BranchId.is_null()),
    };
    if only_remaining {
        query = query.filter(inventory_batches::Column::QuantityRemaining.gt(0));
    }
    query
        .order_by_asc(inventory_batches::Column::ReceivedAt)
        .order_by_asc(inventory_batches::Column::Sequence)
        .all(db_tx)
        .await?
        .into_iter()
        .map(InventoryBatch::try_from)
        .collect()
}
