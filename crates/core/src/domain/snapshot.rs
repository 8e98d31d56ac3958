use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metric keys of a stored snapshot, in document order. `ticker` and `timestamp` are always
/// present in addition to these.
pub const SNAPSHOT_FIELDS: [&str; 16] = [
    "last_price",
    "market_cap",
    "year_high",
    "year_low",
    "volume",
    "sector",
    "industry",
    "eps",
    "pe_ratio",
    "roe",
    "debt_to_equity",
    "profit_margin",
    "total_revenue",
    "current_ratio",
    "volatility",
    "liquidity",
];

/// Flat per-ticker record. Every field is serialized, unavailable values as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub ticker: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub quote: QuoteFacet,
    #[serde(flatten)]
    pub profile: ProfileFacet,
    pub total_revenue: Option<f64>,
    pub current_ratio: Option<f64>,
    #[serde(flatten)]
    pub price_risk: PriceRiskFacet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteFacet {
    pub last_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub year_high: Option<f64>,
    pub year_low: Option<f64>,
    pub volume: Option<f64>,
}

/// Descriptive and fundamental fields. Filled from a single lookup, so either all come from
/// the provider or all are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileFacet {
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub eps: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub roe: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub profit_margin: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRiskFacet {
    pub volatility: Option<f64>,
    pub liquidity: Option<f64>,
}

impl FinancialSnapshot {
    /// A record with every metric null.
    pub fn empty(ticker: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            ticker: ticker.into(),
            timestamp,
            quote: QuoteFacet::default(),
            profile: ProfileFacet::default(),
            total_revenue: None,
            current_ratio: None,
            price_risk: PriceRiskFacet::default(),
        }
    }

    pub fn to_document(&self) -> anyhow::Result<serde_json::Value> {
        serde_json::to_value(self).context("failed to serialize financial snapshot")
    }
}
