use std::{fmt, sync::Arc};

use sea_orm::{DatabaseConnection, DbErr};

use crate::{EngineConfig, EngineError, EngineEvent, LogNotifier, Notifier, ResultEngine};

mod catalog;
mod ledger;
mod orders;
mod points;
mod settlements;

pub use points::{ExpiredPoints, PointsExpiry, PointsOutcome};
pub use settlements::{EarningsSummary, WalletPayment};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

pub struct Engine {
    database: DatabaseConnection,
    config: EngineConfig,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Hand a committed event to the notifier. Failures are only logged.
    fn emit(&self, event: EngineEvent) {
        if let Err(err) = self.notifier.notify(&event) {
            tracing::warn!(error = %err, ?event, "notifier failed");
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Map a failed compare-and-swap update to `Conflict`.
fn stale(label: &str, err: DbErr) -> EngineError {
    match err {
        DbErr::RecordNotUpdated => {
            EngineError::Conflict(format!("{label} was modified concurrently"))
        }
        other => EngineError::Database(other),
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    config: EngineConfig,
    notifier: Option<Arc<dyn Notifier>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> EngineBuilder {
        self.config = config;
        self
    }

    /// Replace the default [`LogNotifier`].
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> EngineBuilder {
        self.notifier = Some(notifier);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let config = self.config;
        if !(0..=100).contains(&config.default_commission_percent) {
            return Err(EngineError::Validation(
                "default commission percent must be between 0 and 100".to_string(),
            ));
        }
        if config.min_settlement_amount < 0 {
            return Err(EngineError::Validation(
                "minimum settlement amount must not be negative".to_string(),
            ));
        }
        if config.points_expiry_months < 0 {
            return Err(EngineError::Validation(
                "points expiry months must not be negative".to_string(),
            ));
        }
        Ok(Engine {
            database: self.database,
            config,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
        })
    }
}
