use serde::Deserialize;

/// Tunables for the engine.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest net amount (minor units) a branch may request as a payout.
    pub min_settlement_amount: i64,
    /// Commission percent applied when a branch has no override.
    pub default_commission_percent: i64,
    /// Months of inactivity after which a points balance expires. `0`
    /// disables expiry.
    pub points_expiry_months: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_settlement_amount: 50_000,
            default_commission_percent: 5,
            points_expiry_months: 0,
        }
    }
}
