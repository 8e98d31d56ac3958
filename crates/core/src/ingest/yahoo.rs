use crate::config::Settings;
use crate::ingest::provider::MarketDataProvider;
use crate::ingest::types::{
    CompanyInfo, DailyBar, Quote, StatementCell, StatementFrequency, StatementTable,
};
use anyhow::{Context, Result};
use chrono::{Months, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Any response from this host sets the session cookie the crumb endpoint expects.
const COOKIE_URL: &str = "https://fc.yahoo.com";
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const SUMMARY_MODULES: &str = "assetProfile,summaryDetail,defaultKeyStatistics,financialData";
const STATEMENT_LOOKBACK_MONTHS: u32 = 12 * 6;

const INCOME_STATEMENT_TYPES: &[&str] = &[
    "TotalRevenue",
    "OperatingRevenue",
    "CostOfRevenue",
    "GrossProfit",
    "OperatingIncome",
    "NetIncome",
    "BasicEPS",
    "DilutedEPS",
];

const BALANCE_SHEET_TYPES: &[&str] = &[
    "CurrentAssets",
    "CurrentLiabilities",
    "TotalAssets",
    "TotalLiabilitiesNetMinorityInterest",
    "StockholdersEquity",
    "CashAndCashEquivalents",
    "Inventory",
    "AccountsReceivable",
];

#[derive(Debug)]
pub struct YahooClient {
    http: reqwest::Client,
    base_url: String,

    // Crumb is tied to the session cookie held by `http`; fetch it once per process run.
    crumb_cache: tokio::sync::Mutex<Option<String>>,
}

impl YahooClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .yahoo_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = settings.yahoo_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()
            .context("failed to build yahoo http client")?;

        Ok(Self {
            http,
            base_url,
            crumb_cache: tokio::sync::Mutex::new(None),
        })
    }

    /// Appends `segments` to the base URL, percent-encoding each one as a single path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let base = &self.base_url;
        let mut url =
            reqwest::Url::parse(base).with_context(|| format!("invalid yahoo base url: {base}"))?;
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("yahoo base url cannot carry a path: {base}"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn crumb(&self) -> Result<String> {
        let mut guard = self.crumb_cache.lock().await;
        if let Some(crumb) = guard.as_ref() {
            return Ok(crumb.clone());
        }

        // The cookie host answers 404 but still sets the cookie; only transport errors matter.
        if let Err(err) = self.http.get(COOKIE_URL).send().await {
            tracing::debug!(error = %err, "yahoo session cookie request failed");
        }

        let res = self
            .http
            .get(self.endpoint(&["v1", "test", "getcrumb"])?)
            .send()
            .await
            .context("yahoo crumb request failed")?;
        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read yahoo crumb response")?;
        if !status.is_success() {
            anyhow::bail!("yahoo crumb HTTP {status}: {text}");
        }

        let crumb = text.trim().to_string();
        anyhow::ensure!(
            !crumb.is_empty() && !crumb.contains('<'),
            "yahoo crumb response is not a crumb: {crumb}"
        );

        *guard = Some(crumb.clone());
        Ok(crumb)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        what: &str,
        url: reqwest::Url,
        query: &[(&str, String)],
    ) -> Result<T> {
        let res = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("yahoo {what} request failed"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read yahoo {what} response"))?;
        if !status.is_success() {
            anyhow::bail!("yahoo {what} HTTP {status}: {text}");
        }

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("failed to parse yahoo {what} response: {text}"))
    }

    async fn fetch_statement(
        &self,
        ticker: &str,
        frequency: StatementFrequency,
        types: &[&str],
    ) -> Result<StatementTable> {
        let prefix = frequency.as_str();
        let type_param = types
            .iter()
            .map(|t| format!("{prefix}{t}"))
            .collect::<Vec<_>>()
            .join(",");

        let now = Utc::now();
        let start = now
            .checked_sub_months(Months::new(STATEMENT_LOOKBACK_MONTHS))
            .context("statement lookback out of range")?;

        let url = self.endpoint(&[
            "ws",
            "fundamentals-timeseries",
            "v1",
            "finance",
            "timeseries",
            ticker,
        ])?;
        let body: TimeseriesEnvelope = self
            .get_json(
                "timeseries",
                url,
                &[
                    ("symbol", ticker.to_string()),
                    ("type", type_param),
                    ("period1", start.timestamp().to_string()),
                    ("period2", now.timestamp().to_string()),
                ],
            )
            .await?;

        parse_timeseries(body, frequency)
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooClient {
    fn provider_name(&self) -> &'static str {
        "yahoo_finance"
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<Quote> {
        let crumb = self.crumb().await?;
        let body: QuoteEnvelope = self
            .get_json(
                "quote",
                self.endpoint(&["v7", "finance", "quote"])?,
                &[("symbols", ticker.to_string()), ("crumb", crumb)],
            )
            .await?;
        parse_quote(body)
    }

    async fn fetch_company_info(&self, ticker: &str) -> Result<CompanyInfo> {
        let crumb = self.crumb().await?;
        let body: SummaryEnvelope = self
            .get_json(
                "quoteSummary",
                self.endpoint(&["v10", "finance", "quoteSummary", ticker])?,
                &[("modules", SUMMARY_MODULES.to_string()), ("crumb", crumb)],
            )
            .await?;
        parse_summary(body)
    }

    async fn fetch_income_statement(&self, ticker: &str) -> Result<StatementTable> {
        self.fetch_statement(ticker, StatementFrequency::Annual, INCOME_STATEMENT_TYPES)
            .await
    }

    async fn fetch_balance_sheet(
        &self,
        ticker: &str,
        frequency: StatementFrequency,
    ) -> Result<StatementTable> {
        self.fetch_statement(ticker, frequency, BALANCE_SHEET_TYPES).await
    }

    async fn fetch_price_history(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        let period1 = start
            .and_hms_opt(0, 0, 0)
            .context("invalid history start")?
            .and_utc()
            .timestamp();
        let period2 = end
            .and_hms_opt(23, 59, 59)
            .context("invalid history end")?
            .and_utc()
            .timestamp();

        let body: ChartEnvelope = self
            .get_json(
                "chart",
                self.endpoint(&["v8", "finance", "chart", ticker])?,
                &[
                    ("period1", period1.to_string()),
                    ("period2", period2.to_string()),
                    ("interval", "1d".to_string()),
                ],
            )
            .await?;
        parse_chart(body)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
}

fn raw(v: &Option<RawValue>) -> Option<f64> {
    v.as_ref().and_then(|r| r.raw)
}

#[derive(Debug, Clone, Deserialize)]
struct YahooError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponse,
}

#[derive(Debug, Clone, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<QuoteRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRow {
    regular_market_price: Option<f64>,
    market_cap: Option<f64>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
    regular_market_volume: Option<f64>,
}

fn parse_quote(body: QuoteEnvelope) -> Result<Quote> {
    let row = body
        .quote_response
        .result
        .into_iter()
        .next()
        .context("yahoo quote result is empty")?;

    Ok(Quote {
        last_price: row.regular_market_price,
        market_cap: row.market_cap,
        year_high: row.fifty_two_week_high,
        year_low: row.fifty_two_week_low,
        volume: row.regular_market_volume,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryEnvelope {
    quote_summary: SummaryResponse,
}

#[derive(Debug, Clone, Deserialize)]
struct SummaryResponse {
    result: Option<Vec<SummaryModules>>,
    error: Option<YahooError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryModules {
    #[serde(default)]
    asset_profile: AssetProfile,
    #[serde(default)]
    summary_detail: SummaryDetail,
    #[serde(default)]
    default_key_statistics: KeyStatistics,
    #[serde(default)]
    financial_data: FinancialData,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SummaryDetail {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    trailing_eps: Option<RawValue>,
    profit_margins: Option<RawValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    return_on_equity: Option<RawValue>,
    debt_to_equity: Option<RawValue>,
    profit_margins: Option<RawValue>,
}

fn parse_summary(body: SummaryEnvelope) -> Result<CompanyInfo> {
    if let Some(err) = body.quote_summary.error {
        anyhow::bail!("yahoo quoteSummary error {}: {}", err.code, err.description);
    }

    let modules = body
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
        .context("yahoo quoteSummary result is empty")?;

    Ok(CompanyInfo {
        sector: modules.asset_profile.sector,
        industry: modules.asset_profile.industry,
        trailing_eps: raw(&modules.default_key_statistics.trailing_eps),
        trailing_pe: raw(&modules.summary_detail.trailing_pe),
        return_on_equity: raw(&modules.financial_data.return_on_equity),
        debt_to_equity: raw(&modules.financial_data.debt_to_equity),
        profit_margins: raw(&modules.financial_data.profit_margins)
            .or_else(|| raw(&modules.default_key_statistics.profit_margins)),
    })
}

#[derive(Debug, Clone, Deserialize)]
struct TimeseriesEnvelope {
    timeseries: TimeseriesResponse,
}

#[derive(Debug, Clone, Deserialize)]
struct TimeseriesResponse {
    result: Option<Vec<TimeseriesSeries>>,
    error: Option<YahooError>,
}

// Each series carries its values under a key equal to its own type name.
#[derive(Debug, Clone, Deserialize)]
struct TimeseriesSeries {
    meta: TimeseriesMeta,
    #[serde(flatten)]
    values: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct TimeseriesMeta {
    #[serde(rename = "type", default)]
    types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeseriesPoint {
    as_of_date: NaiveDate,
    reported_value: Option<RawValue>,
}

fn parse_timeseries(
    body: TimeseriesEnvelope,
    frequency: StatementFrequency,
) -> Result<StatementTable> {
    if let Some(err) = body.timeseries.error {
        anyhow::bail!("yahoo timeseries error {}: {}", err.code, err.description);
    }

    let prefix = frequency.as_str();
    let mut table = StatementTable::new();
    for mut series in body.timeseries.result.unwrap_or_default() {
        let Some(type_name) = series.meta.types.first().cloned() else {
            continue;
        };
        let Some(raw_points) = series.values.remove(&type_name) else {
            continue;
        };

        let points: Vec<Option<TimeseriesPoint>> = serde_json::from_value(raw_points)
            .with_context(|| format!("failed to parse yahoo timeseries points for {type_name}"))?;

        let cells: Vec<StatementCell> = points
            .into_iter()
            .flatten()
            .map(|p| StatementCell {
                period_end: p.as_of_date,
                value: raw(&p.reported_value),
            })
            .collect();
        if cells.is_empty() {
            continue;
        }

        let label = type_name.strip_prefix(prefix).unwrap_or(&type_name);
        table.insert_row(label, cells);
    }

    Ok(table)
}

#[derive(Debug, Clone, Deserialize)]
struct ChartEnvelope {
    chart: ChartResponse,
}

#[derive(Debug, Clone, Deserialize)]
struct ChartResponse {
    result: Option<Vec<ChartData>>,
    error: Option<YahooError>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChartData {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn parse_chart(body: ChartEnvelope) -> Result<Vec<DailyBar>> {
    if let Some(err) = body.chart.error {
        anyhow::bail!("yahoo chart error {}: {}", err.code, err.description);
    }

    let data = body
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .context("yahoo chart result is empty")?;
    let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars = Vec::with_capacity(data.timestamp.len());
    for (i, ts) in data.timestamp.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(*ts, 0)
            .map(|dt| dt.date_naive())
            .with_context(|| format!("invalid chart timestamp: {ts}"))?;
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();

        // Non-trading rows come back with every field null.
        if close.is_none() && volume.is_none() {
            continue;
        }

        bars.push(DailyBar { date, close, volume });
    }

    Ok(bars)
}
