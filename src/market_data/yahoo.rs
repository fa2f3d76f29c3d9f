//! Yahoo Finance implementation of [`MarketData`].
//!
//! Uses three public endpoints:
//! - `v8/finance/chart` for quotes, price history and dividends
//! - `v10/finance/quoteSummary` for statements and the company profile
//! - `v1/finance/search` for news
//!
//! `quoteSummary` only answers requests that carry a session cookie and the
//! matching `crumb`. The crumb is fetched on first use, cached, and fetched
//! again once if Yahoo rejects it.

use super::{Dividend, MarketData, NewsItem, PriceBar, Quote, Statement};
use crate::error::ToolError;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use time::{Date, OffsetDateTime, macros::format_description};
use tokio::sync::Mutex;
use yahoo_api::{ChartEnvelope, ChartResult, SearchEnvelope};

/// Public Yahoo Finance API host.
pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
/// Sets the session cookie that crumbs are bound to.
const DEFAULT_COOKIE_URL: &str = "https://fc.yahoo.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);
const USER_AGENT: &str = "Mozilla/5.0 (compatible; ticker-agent/0.1)";
const NEWS_COUNT: &str = "10";
const SECONDS_PER_DAY: i64 = 86_400;

/// Yahoo Finance market data client.
///
/// # Example
///
/// ```ignore
/// let yahoo = YahooFinance::new()?;
/// let quote = yahoo.quote("AAPL").await?;
/// ```
#[derive(Clone)]
pub struct YahooFinance {
    client: reqwest::Client,
    base_url: String,
    cookie_url: String,
    timeout: Duration,
    crumb: Arc<Mutex<Option<String>>>,
}

impl YahooFinance {
    /// Client for the public Yahoo Finance endpoints.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Client for a custom base URL (proxies, fixtures).
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> anyhow::Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Client with a custom per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()
            .context("failed to build market data HTTP client")?;
        let base_url: String = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            cookie_url: DEFAULT_COOKIE_URL.to_owned(),
            timeout,
            crumb: Arc::new(Mutex::new(None)),
        })
    }

    /// Fetch the session cookie from `url` instead of Yahoo's consent host.
    #[must_use]
    pub fn with_cookie_url(mut self, url: impl Into<String>) -> Self {
        self.cookie_url = url.into();
        self
    }

    async fn fetch(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ToolError> {
        let url = format!("{}{path}", self.base_url);
        log::debug!("Market data request url={url}");

        self.client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ToolError> {
        let response = self.fetch(path, query).await?;
        self.decode(response).await
    }

    async fn decode<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, ToolError> {
        let status = response.status();
        let path = response.url().path().to_owned();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ToolError::upstream("rate limited by market data source"));
        }
        if !status.is_success() {
            // Unknown symbols come back as 404 with a JSON fault body.
            let body = response.text().await.unwrap_or_default();
            let detail = fault_description(&body).unwrap_or_else(|| body.chars().take(200).collect());
            log::warn!("Market data error status={status} path={path} detail={detail}");
            return Err(ToolError::upstream(format!("HTTP {status}: {detail}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&e))?;
        serde_json::from_slice(&bytes).map_err(|e| malformed(&e))
    }

    fn transport_error(&self, e: &reqwest::Error) -> ToolError {
        if e.is_timeout() {
            ToolError::UpstreamTimeout(self.timeout)
        } else {
            ToolError::upstream(format!("request failed: {e}"))
        }
    }

    async fn chart(&self, symbol: &str, query: &[(&str, String)]) -> Result<ChartResult, ToolError> {
        let envelope: ChartEnvelope = self
            .get_json(&format!("/v8/finance/chart/{symbol}"), query)
            .await?;
        envelope.into_result()
    }

    async fn quote_summary(&self, symbol: &str, modules: &str) -> Result<Value, ToolError> {
        let path = format!("/v10/finance/quoteSummary/{symbol}");
        let mut refreshed = false;

        loop {
            let crumb = self.crumb().await?;
            let query = [("modules", modules.to_owned()), ("crumb", crumb.clone())];
            let response = self.fetch(&path, &query).await?;

            if response.status() == StatusCode::UNAUTHORIZED && !refreshed {
                log::warn!("Market data crumb rejected, refreshing symbol={symbol}");
                self.invalidate_crumb(&crumb).await;
                refreshed = true;
                continue;
            }

            let envelope: Value = self.decode(response).await?;
            return summary_result(envelope);
        }
    }

    /// The cached crumb, performing the cookie handshake on first use.
    async fn crumb(&self) -> Result<String, ToolError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }
        let crumb = self.fetch_crumb().await?;
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    async fn fetch_crumb(&self) -> Result<String, ToolError> {
        // Answers 404, but the cookie it sets is what the crumb is bound to.
        self.client
            .get(&self.cookie_url)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let response = self.fetch("/v1/test/getcrumb", &[]).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;
        let crumb = body.trim();

        if !status.is_success() || crumb.is_empty() || crumb.starts_with(['{', '<']) {
            log::warn!("Market data crumb handshake failed status={status}");
            return Err(ToolError::upstream(format!(
                "crumb handshake failed: HTTP {status}"
            )));
        }
        log::debug!("Obtained market data crumb");
        Ok(crumb.to_owned())
    }

    /// Forget `stale` unless another call already replaced it.
    async fn invalidate_crumb(&self, stale: &str) {
        let mut cached = self.crumb.lock().await;
        if cached.as_deref() == Some(stale) {
            *cached = None;
        }
    }
}

#[async_trait]
impl MarketData for YahooFinance {
    async fn quote(&self, symbol: &str) -> Result<Quote, ToolError> {
        let chart = self
            .chart(
                symbol,
                &[("range", "5d".to_owned()), ("interval", "1d".to_owned())],
            )
            .await?;
        parse_quote(symbol, &chart)
    }

    async fn history(
        &self,
        symbol: &str,
        start: Date,
        end: Date,
    ) -> Result<Vec<PriceBar>, ToolError> {
        let period1 = start.midnight().assume_utc().unix_timestamp();
        // Inclusive end: run to the midnight after `end`.
        let period2 = end.midnight().assume_utc().unix_timestamp() + SECONDS_PER_DAY;
        let chart = self
            .chart(
                symbol,
                &[
                    ("period1", period1.to_string()),
                    ("period2", period2.to_string()),
                    ("interval", "1d".to_owned()),
                ],
            )
            .await?;
        Ok(parse_history(&chart))
    }

    async fn balance_sheet(&self, symbol: &str) -> Result<Vec<Statement>, ToolError> {
        let summary = self.quote_summary(symbol, "balanceSheetHistory").await?;
        parse_statements(&summary, "balanceSheetHistory", "balanceSheetStatements")
    }

    async fn news(&self, symbol: &str) -> Result<Vec<NewsItem>, ToolError> {
        let search: SearchEnvelope = self
            .get_json(
                "/v1/finance/search",
                &[
                    ("q", symbol.to_owned()),
                    ("quotesCount", "0".to_owned()),
                    ("newsCount", NEWS_COUNT.to_owned()),
                ],
            )
            .await?;
        Ok(parse_news(search))
    }

    async fn company_info(&self, symbol: &str) -> Result<Map<String, Value>, ToolError> {
        let summary = self
            .quote_summary(symbol, "assetProfile,price,summaryDetail")
            .await?;
        Ok(parse_company_info(&summary))
    }

    async fn dividends(&self, symbol: &str) -> Result<Vec<Dividend>, ToolError> {
        let chart = self
            .chart(
                symbol,
                &[
                    ("range", "max".to_owned()),
                    ("interval", "1mo".to_owned()),
                    ("events", "div".to_owned()),
                ],
            )
            .await?;
        Ok(parse_dividends(&chart))
    }

    async fn financials(&self, symbol: &str) -> Result<Vec<Statement>, ToolError> {
        let summary = self.quote_summary(symbol, "incomeStatementHistory").await?;
        parse_statements(&summary, "incomeStatementHistory", "incomeStatementHistory")
    }

    fn source_name(&self) -> &'static str {
        "yahoo"
    }
}

/// Yahoo Finance API response structures
mod yahoo_api {
    use crate::error::ToolError;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Deserialize)]
    pub struct ChartEnvelope {
        pub chart: ChartBody,
    }

    #[derive(Debug, Deserialize)]
    pub struct ChartBody {
        pub result: Option<Vec<ChartResult>>,
        pub error: Option<Fault>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Fault {
        pub description: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ChartResult {
        pub meta: ChartMeta,
        #[serde(default)]
        pub timestamp: Vec<i64>,
        #[serde(default)]
        pub indicators: Indicators,
        pub events: Option<ChartEvents>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ChartMeta {
        pub currency: Option<String>,
        pub regular_market_price: Option<f64>,
        pub regular_market_time: Option<i64>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct Indicators {
        #[serde(default)]
        pub quote: Vec<QuoteSeries>,
    }

    #[derive(Debug, Default, Deserialize)]
    pub struct QuoteSeries {
        #[serde(default)]
        pub open: Vec<Option<f64>>,
        #[serde(default)]
        pub high: Vec<Option<f64>>,
        #[serde(default)]
        pub low: Vec<Option<f64>>,
        #[serde(default)]
        pub close: Vec<Option<f64>>,
        #[serde(default)]
        pub volume: Vec<Option<u64>>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ChartEvents {
        #[serde(default)]
        pub dividends: HashMap<String, DividendEvent>,
    }

    #[derive(Debug, Deserialize)]
    pub struct DividendEvent {
        pub amount: f64,
        pub date: i64,
    }

    #[derive(Debug, Deserialize)]
    pub struct SearchEnvelope {
        #[serde(default)]
        pub news: Vec<SearchNews>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SearchNews {
        pub title: String,
        pub publisher: Option<String>,
        pub link: Option<String>,
        pub provider_publish_time: Option<i64>,
    }

    impl ChartEnvelope {
        pub fn into_result(self) -> Result<ChartResult, ToolError> {
            if let Some(fault) = self.chart.error {
                return Err(ToolError::upstream(
                    fault
                        .description
                        .unwrap_or_else(|| "chart request failed".to_owned()),
                ));
            }
            self.chart
                .result
                .and_then(|results| results.into_iter().next())
                .ok_or_else(|| ToolError::upstream("no data for symbol"))
        }
    }
}

fn malformed(e: &impl std::fmt::Display) -> ToolError {
    ToolError::upstream(format!("malformed response: {e}"))
}

/// Extracts `<endpoint>.error.description` from a fault body.
fn fault_description(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value.as_object()?.values().find_map(|endpoint| {
        endpoint
            .get("error")?
            .get("description")?
            .as_str()
            .map(str::to_owned)
    })
}

fn format_unix_date(ts: i64) -> Option<String> {
    let format = format_description!("[year]-[month]-[day]");
    OffsetDateTime::from_unix_timestamp(ts)
        .ok()?
        .date()
        .format(&format)
        .ok()
}

fn parse_quote(symbol: &str, chart: &ChartResult) -> Result<Quote, ToolError> {
    let last_close = chart
        .indicators
        .quote
        .first()
        .and_then(|series| series.close.iter().rev().find_map(|c| *c));

    let price = chart
        .meta
        .regular_market_price
        .or(last_close)
        .ok_or_else(|| ToolError::upstream(format!("no price available for {symbol}")))?;

    let as_of = chart
        .meta
        .regular_market_time
        .or_else(|| chart.timestamp.last().copied())
        .and_then(format_unix_date);

    Ok(Quote {
        symbol: symbol.to_owned(),
        price,
        currency: chart.meta.currency.clone(),
        as_of,
    })
}

fn parse_history(chart: &ChartResult) -> Vec<PriceBar> {
    let Some(series) = chart.indicators.quote.first() else {
        return Vec::new();
    };
    let at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    chart
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            // Rows without a close are market holidays or partial days.
            let close = at(&series.close, i)?;
            Some(PriceBar {
                date: format_unix_date(*ts)?,
                open: at(&series.open, i),
                high: at(&series.high, i),
                low: at(&series.low, i),
                close,
                volume: series.volume.get(i).copied().flatten(),
            })
        })
        .collect()
}

fn parse_dividends(chart: &ChartResult) -> Vec<Dividend> {
    let Some(events) = &chart.events else {
        return Vec::new();
    };
    let mut dated: Vec<_> = events
        .dividends
        .values()
        .map(|event| (event.date, event.amount))
        .collect();
    dated.sort_by_key(|(ts, _)| *ts);

    dated
        .into_iter()
        .filter_map(|(ts, amount)| {
            Some(Dividend {
                date: format_unix_date(ts)?,
                amount,
            })
        })
        .collect()
}

fn parse_news(search: SearchEnvelope) -> Vec<NewsItem> {
    search
        .news
        .into_iter()
        .map(|item| NewsItem {
            title: item.title,
            publisher: item.publisher,
            link: item.link,
            published_at: item.provider_publish_time.and_then(format_unix_date),
        })
        .collect()
}

fn summary_result(envelope: Value) -> Result<Value, ToolError> {
    let body = envelope
        .get("quoteSummary")
        .ok_or_else(|| malformed(&"missing quoteSummary"))?;

    if let Some(description) = body
        .get("error")
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
    {
        return Err(ToolError::upstream(description));
    }

    body.get("result")
        .and_then(|r| r.get(0))
        .cloned()
        .ok_or_else(|| ToolError::upstream("no data for symbol"))
}

/// Collapses Yahoo's `{"raw": .., "fmt": ..}` cells to their raw value.
fn flatten_cell(value: &Value) -> Value {
    match value {
        Value::Object(cell) if cell.is_empty() => Value::Null,
        Value::Object(cell) => cell
            .get("raw")
            .or_else(|| cell.get("fmt"))
            .cloned()
            .unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

fn period_end(entry: &Map<String, Value>) -> Option<String> {
    let cell = entry.get("endDate")?;
    cell.get("fmt")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| cell.get("raw").and_then(Value::as_i64).and_then(format_unix_date))
}

fn parse_statements(
    summary: &Value,
    module: &str,
    list_key: &str,
) -> Result<Vec<Statement>, ToolError> {
    let entries = summary
        .get(module)
        .and_then(|m| m.get(list_key))
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(&format!("missing {module}.{list_key}")))?;

    Ok(entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| {
            let period_end = period_end(entry)?;
            let items = entry
                .iter()
                .filter(|(key, _)| !matches!(key.as_str(), "endDate" | "maxAge"))
                .map(|(key, value)| (key.clone(), flatten_cell(value)))
                .filter(|(_, value)| !value.is_null())
                .collect();
            Some(Statement { period_end, items })
        })
        .collect())
}

fn parse_company_info(summary: &Value) -> Map<String, Value> {
    let mut info = Map::new();
    let Some(modules) = summary.as_object() else {
        return info;
    };

    for module in modules.values().filter_map(Value::as_object) {
        for (key, value) in module {
            if matches!(key.as_str(), "maxAge" | "companyOfficers") || info.contains_key(key) {
                continue;
            }
            let flat = flatten_cell(value);
            if !flat.is_null() {
                info.insert(key.clone(), flat);
            }
        }
    }
    info
}
