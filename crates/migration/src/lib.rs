pub use sea_orm_migration::prelude::*;

mod m20261001_000001_ledger;
mod m20261001_000002_inventory;
mod m20261001_000003_orders;
mod m20261001_000004_settlements;
mod m20261001_000005_points;
mod m20261001_000006_reference_counters;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_ledger::Migration),
            Box::new(m20261001_000002_inventory::Migration),
            Box::new(m20261001_000003_orders::Migration),
            Box::new(m20261001_000004_settlements::Migration),
            Box::new(m20261001_000005_points::Migration),
            Box::new(m20261001_000006_reference_counters::Migration),
        ]
    }
}
