#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sea_orm::{Database, DatabaseConnection};

use engine::{
    CatalogProduct, CatalogProductCmd, Engine, EngineConfig, EngineEvent, Notifier, NotifyError,
    ReceiveStockCmd, TopUpCmd, WalletOwner,
};
use migration::MigratorTrait;

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub async fn engine_with(
    config: EngineConfig,
    notifier: Arc<dyn Notifier>,
) -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .config(config)
        .notifier(notifier)
        .build()
        .await
        .unwrap();
    (engine, db)
}

/// Catalog product with one central lot of `quantity`.
pub async fn stocked_product(
    engine: &Engine,
    name: &str,
    price: i64,
    quantity: i64,
) -> CatalogProduct {
    let product = engine
        .create_catalog_product(CatalogProductCmd::new(name, price).cost(price / 2))
        .await
        .unwrap();
    engine
        .receive_central_stock(ReceiveStockCmd::new(product.id, quantity, "warehouse"))
        .await
        .unwrap();
    engine.catalog_product(product.id).await.unwrap()
}

pub async fn funded(engine: &Engine, owner: &WalletOwner, amount: i64) {
    engine
        .top_up(TopUpCmd::new(owner.clone(), amount, "hq"))
        .await
        .unwrap();
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<EngineEvent>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &EngineEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _event: &EngineEvent) -> Result<(), NotifyError> {
        Err(NotifyError("mail relay unreachable".to_string()))
    }
}
