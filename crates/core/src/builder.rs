use crate::domain::snapshot::{FinancialSnapshot, PriceRiskFacet, ProfileFacet, QuoteFacet};
use crate::ingest::types::{CompanyInfo, Quote, StatementFrequency};
use crate::ingest::MarketDataProvider;
use crate::metrics::{price, statements};
use crate::time::window;
use chrono::{DateTime, Utc};

/// Assembles a [`FinancialSnapshot`] from independently fetched facets.
///
/// Facets are fetched one after another. A failing facet only nulls its own fields; building
/// itself never fails.
pub struct SnapshotBuilder<'a> {
    provider: &'a dyn MarketDataProvider,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(provider: &'a dyn MarketDataProvider) -> Self {
        Self { provider }
    }

    pub async fn build(&self, ticker: &str) -> FinancialSnapshot {
        self.build_at(ticker, window::capture_time()).await
    }

    pub async fn build_at(&self, ticker: &str, now: DateTime<Utc>) -> FinancialSnapshot {
        let ticker = ticker.trim().to_uppercase();

        let quote = self.quote_facet(&ticker).await;
        let profile = self.profile_facet(&ticker).await;
        let total_revenue = self.total_revenue(&ticker).await;
        let current_ratio = self.current_ratio(&ticker).await;
        let price_risk = self.price_risk_facet(&ticker, now).await;

        tracing::info!(
            %ticker,
            provider = self.provider.provider_name(),
            "financial snapshot built"
        );

        FinancialSnapshot {
            ticker,
            timestamp: now,
            quote,
            profile,
            total_revenue,
            current_ratio,
            price_risk,
        }
    }

    async fn quote_facet(&self, ticker: &str) -> QuoteFacet {
        match self.provider.fetch_quote(ticker).await {
            Ok(quote) => quote.into(),
            Err(err) => {
                facet_unavailable(ticker, "quote", &err);
                QuoteFacet::default()
            }
        }
    }

    async fn profile_facet(&self, ticker: &str) -> ProfileFacet {
        match self.provider.fetch_company_info(ticker).await {
            Ok(info) => info.into(),
            Err(err) => {
                facet_unavailable(ticker, "company_info", &err);
                ProfileFacet::default()
            }
        }
    }

    async fn total_revenue(&self, ticker: &str) -> Option<f64> {
        match self.provider.fetch_income_statement(ticker).await {
            Ok(table) => statements::total_revenue(&table),
            Err(err) => {
                facet_unavailable(ticker, "income_statement", &err);
                None
            }
        }
    }

    // Annual first; the quarterly sheet is only consulted when the annual one yields nothing.
    async fn current_ratio(&self, ticker: &str) -> Option<f64> {
        for frequency in [StatementFrequency::Annual, StatementFrequency::Quarterly] {
            match self.provider.fetch_balance_sheet(ticker, frequency).await {
                Ok(table) => {
                    if let Some(ratio) = statements::current_ratio(&table) {
                        return Some(ratio);
                    }
                    tracing::debug!(
                        %ticker,
                        frequency = frequency.as_str(),
                        "current ratio not derivable from balance sheet"
                    );
                }
                Err(err) => facet_unavailable(ticker, "balance_sheet", &err),
            }
        }
        None
    }

    async fn price_risk_facet(&self, ticker: &str, now: DateTime<Utc>) -> PriceRiskFacet {
        let (start, end) = match window::trailing_year(now) {
            Ok(range) => range,
            Err(err) => {
                facet_unavailable(ticker, "price_history", &err);
                return PriceRiskFacet::default();
            }
        };

        let bars = match self.provider.fetch_price_history(ticker, start, end).await {
            Ok(bars) => bars,
            Err(err) => {
                facet_unavailable(ticker, "price_history", &err);
                return PriceRiskFacet::default();
            }
        };

        let risk = price::price_risk(&bars);
        if risk.volatility.is_none() || risk.liquidity.is_none() {
            tracing::warn!(
                %ticker,
                bars = bars.len(),
                volatility = risk.volatility.is_some(),
                liquidity = risk.liquidity.is_some(),
                "price history insufficient for volatility/liquidity"
            );
        }
        PriceRiskFacet {
            volatility: risk.volatility,
            liquidity: risk.liquidity,
        }
    }
}

fn facet_unavailable(ticker: &str, facet: &'static str, err: &anyhow::Error) {
    let error = format!("{err:#}");
    tracing::warn!(%ticker, facet, %error, "facet fetch failed; fields set to null");
}

impl From<Quote> for QuoteFacet {
    fn from(q: Quote) -> Self {
        Self {
            last_price: q.last_price,
            market_cap: q.market_cap,
            year_high: q.year_high,
            year_low: q.year_low,
            volume: q.volume,
        }
    }
}

impl From<CompanyInfo> for ProfileFacet {
    fn from(info: CompanyInfo) -> Self {
        Self {
            sector: info.sector,
            industry: info.industry,
            eps: info.trailing_eps,
            pe_ratio: info.trailing_pe,
            roe: info.return_on_equity,
            debt_to_equity: info.debt_to_equity,
            profit_margin: info.profit_margins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::SNAPSHOT_FIELDS;
    use crate::ingest::types::{DailyBar, StatementCell, StatementTable};
    use anyhow::Result;
    use chrono::{NaiveDate, TimeZone};
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// Provider returning canned facets; `None` means the call fails.
    #[derive(Default)]
    struct ScriptedProvider {
        quote: Option<Quote>,
        info: Option<CompanyInfo>,
        income: Option<StatementTable>,
        annual: Option<StatementTable>,
        quarterly: Option<StatementTable>,
        history: Option<Vec<DailyBar>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn canned<T: Clone>(v: &Option<T>, what: &str) -> Result<T> {
        v.clone().ok_or_else(|| anyhow::anyhow!("{what} unavailable"))
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for ScriptedProvider {
        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_quote(&self, _ticker: &str) -> Result<Quote> {
            self.record("quote");
            canned(&self.quote, "quote")
        }

        async fn fetch_company_info(&self, _ticker: &str) -> Result<CompanyInfo> {
            self.record("info");
            canned(&self.info, "info")
        }

        async fn fetch_income_statement(&self, _ticker: &str) -> Result<StatementTable> {
            self.record("income");
            canned(&self.income, "income")
        }

        async fn fetch_balance_sheet(
            &self,
            _ticker: &str,
            frequency: StatementFrequency,
        ) -> Result<StatementTable> {
            self.record(frequency.as_str());
            match frequency {
                StatementFrequency::Annual => canned(&self.annual, "annual"),
                StatementFrequency::Quarterly => canned(&self.quarterly, "quarterly"),
            }
        }

        async fn fetch_price_history(
            &self,
            _ticker: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<DailyBar>> {
            self.record(&format!("history {start}..{end}"));
            canned(&self.history, "history")
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 27, 10, 0, 0).unwrap()
    }

    fn table(rows: &[(&str, f64)]) -> StatementTable {
        let period_end = NaiveDate::from_ymd_opt(2025, 9, 30).unwrap();
        let mut t = StatementTable::new();
        for (label, value) in rows {
            t.insert_row(
                *label,
                vec![StatementCell {
                    period_end,
                    value: Some(*value),
                }],
            );
        }
        t
    }

    fn history(closes: &[f64]) -> Vec<DailyBar> {
        let start = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| DailyBar {
                date: start + chrono::Duration::days(i as i64),
                close: Some(*c),
                volume: Some(1_000.0),
            })
            .collect()
    }

    fn full_provider() -> ScriptedProvider {
        ScriptedProvider {
            quote: Some(Quote {
                last_price: Some(227.5),
                market_cap: Some(3.4e12),
                year_high: Some(260.1),
                year_low: Some(164.1),
                volume: Some(4.1e7),
            }),
            info: Some(CompanyInfo {
                sector: Some("Technology".to_string()),
                industry: Some("Consumer Electronics".to_string()),
                trailing_eps: Some(6.08),
                trailing_pe: Some(37.4),
                return_on_equity: Some(1.36),
                debt_to_equity: Some(209.06),
                profit_margins: Some(0.24),
            }),
            income: Some(table(&[("TotalRevenue", 1000.0)])),
            annual: Some(table(&[("CurrentAssets", 200.0), ("CurrentLiabilities", 100.0)])),
            quarterly: Some(table(&[("CurrentAssets", 50.0), ("CurrentLiabilities", 10.0)])),
            history: Some(history(&[100.0, 101.0, 99.5, 102.0])),
            ..Default::default()
        }
    }

    fn expected_keys() -> BTreeSet<String> {
        SNAPSHOT_FIELDS
            .iter()
            .chain(["ticker", "timestamp"].iter())
            .map(|s| s.to_string())
            .collect()
    }

    fn keys(snapshot: &FinancialSnapshot) -> BTreeSet<String> {
        let doc = snapshot.to_document().unwrap();
        doc.as_object().unwrap().keys().cloned().collect()
    }

    #[tokio::test]
    async fn builds_every_facet_from_a_healthy_provider() {
        let provider = full_provider();
        let snapshot = SnapshotBuilder::new(&provider).build_at(" aapl ", now()).await;

        assert_eq!(snapshot.ticker, "AAPL");
        assert_eq!(snapshot.timestamp, now());
        assert_eq!(snapshot.quote.last_price, Some(227.5));
        assert_eq!(snapshot.profile.sector.as_deref(), Some("Technology"));
        assert_eq!(snapshot.profile.eps, Some(6.08));
        assert_eq!(snapshot.profile.profit_margin, Some(0.24));
        assert_eq!(snapshot.total_revenue, Some(1000.0));
        assert_eq!(snapshot.current_ratio, Some(2.0));

        let vol = snapshot.price_risk.volatility.unwrap();
        assert!(vol.is_finite() && vol > 0.0);
        let expected_liquidity = (100.0 + 101.0 + 99.5 + 102.0) * 1_000.0 / 4.0;
        assert!((snapshot.price_risk.liquidity.unwrap() - expected_liquidity).abs() < 1e-6);

        assert_eq!(keys(&snapshot), expected_keys());
    }

    #[tokio::test]
    async fn facets_run_in_order_and_skip_quarterly_when_annual_suffices() {
        let provider = full_provider();
        SnapshotBuilder::new(&provider).build_at("AAPL", now()).await;

        assert_eq!(
            provider.calls(),
            vec![
                "quote",
                "info",
                "income",
                "annual",
                "history 2025-01-27..2026-01-27",
            ]
        );
    }

    #[tokio::test]
    async fn everything_failing_still_yields_full_key_set() {
        let provider = ScriptedProvider::default();
        let snapshot = SnapshotBuilder::new(&provider).build_at("NOPE", now()).await;

        assert_eq!(snapshot, FinancialSnapshot::empty("NOPE", now()));
        assert_eq!(keys(&snapshot), expected_keys());
        let doc = snapshot.to_document().unwrap();
        for field in SNAPSHOT_FIELDS {
            assert!(doc[field].is_null(), "{field} should be null");
        }
    }

    #[tokio::test]
    async fn company_info_failure_nulls_the_whole_profile_only() {
        let provider = ScriptedProvider {
            info: None,
            ..full_provider()
        };
        let snapshot = SnapshotBuilder::new(&provider).build_at("AAPL", now()).await;

        assert_eq!(snapshot.profile, ProfileFacet::default());
        assert_eq!(snapshot.quote.last_price, Some(227.5));
        assert_eq!(snapshot.total_revenue, Some(1000.0));
        assert_eq!(snapshot.current_ratio, Some(2.0));
        assert!(snapshot.price_risk.volatility.is_some());
    }

    #[tokio::test]
    async fn revenue_without_known_alias_is_null() {
        let provider = ScriptedProvider {
            income: Some(table(&[("NetIncome", 10.0)])),
            ..full_provider()
        };
        let snapshot = SnapshotBuilder::new(&provider).build_at("AAPL", now()).await;
        assert_eq!(snapshot.total_revenue, None);
    }

    #[tokio::test]
    async fn current_ratio_falls_back_to_quarterly_sheet() {
        let provider = ScriptedProvider {
            annual: Some(table(&[("TotalAssets", 900.0)])),
            quarterly: Some(table(&[("Current Assets", 50.0), ("Current Liabilities", 25.0)])),
            ..full_provider()
        };
        let snapshot = SnapshotBuilder::new(&provider).build_at("AAPL", now()).await;

        assert_eq!(snapshot.current_ratio, Some(2.0));
        let calls = provider.calls();
        assert!(calls.contains(&"annual".to_string()));
        assert!(calls.contains(&"quarterly".to_string()));
    }

    #[tokio::test]
    async fn current_ratio_falls_back_when_annual_fetch_fails() {
        let provider = ScriptedProvider {
            annual: None,
            quarterly: Some(table(&[("CurrentAssets", 30.0), ("CurrentLiabilities", 20.0)])),
            ..full_provider()
        };
        let snapshot = SnapshotBuilder::new(&provider).build_at("AAPL", now()).await;
        assert_eq!(snapshot.current_ratio, Some(1.5));
    }

    #[tokio::test]
    async fn zero_liabilities_in_both_sheets_is_null() {
        let provider = ScriptedProvider {
            annual: Some(table(&[("CurrentAssets", 200.0), ("CurrentLiabilities", 0.0)])),
            quarterly: Some(table(&[("CurrentAssets", 50.0), ("CurrentLiabilities", 0.0)])),
            ..full_provider()
        };
        let snapshot = SnapshotBuilder::new(&provider).build_at("AAPL", now()).await;
        assert_eq!(snapshot.current_ratio, None);
    }

    #[tokio::test]
    async fn short_history_nulls_volatility_and_liquidity_together() {
        let provider = ScriptedProvider {
            history: Some(history(&[100.0])),
            ..full_provider()
        };
        let snapshot = SnapshotBuilder::new(&provider).build_at("AAPL", now()).await;
        assert_eq!(snapshot.price_risk, PriceRiskFacet::default());

        let provider = ScriptedProvider {
            history: None,
            ..full_provider()
        };
        let snapshot = SnapshotBuilder::new(&provider).build_at("AAPL", now()).await;
        assert_eq!(snapshot.price_risk, PriceRiskFacet::default());
        assert_eq!(snapshot.current_ratio, Some(2.0));
    }

    #[tokio::test]
    async fn history_without_volume_keeps_volatility() {
        let bars = history(&[100.0, 110.0, 99.0])
            .into_iter()
            .map(|bar| DailyBar {
                volume: None,
                ..bar
            })
            .collect();
        let provider = ScriptedProvider {
            history: Some(bars),
            ..full_provider()
        };
        let snapshot = SnapshotBuilder::new(&provider).build_at("AAPL", now()).await;

        let vol = snapshot.price_risk.volatility.unwrap();
        assert!((vol - 2.2449944320643658).abs() < 1e-9);
        assert_eq!(snapshot.price_risk.liquidity, None);
    }
}
