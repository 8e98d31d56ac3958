use crate::ingest::types::{CompanyInfo, DailyBar, Quote, StatementFrequency, StatementTable};
use anyhow::Result;
use chrono::NaiveDate;

/// Query-by-ticker market data source.
///
/// Every call may be slow, rate limited, or fail outright; callers are expected to treat an
/// error as "data unavailable" rather than abort.
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_quote(&self, ticker: &str) -> Result<Quote>;

    async fn fetch_company_info(&self, ticker: &str) -> Result<CompanyInfo>;

    /// Annual income statement.
    async fn fetch_income_statement(&self, ticker: &str) -> Result<StatementTable>;

    async fn fetch_balance_sheet(
        &self,
        ticker: &str,
        frequency: StatementFrequency,
    ) -> Result<StatementTable>;

    /// Daily bars with `start <= date <= end`.
    async fn fetch_price_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>>;
}
