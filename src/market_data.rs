//! Market data source behind the finance tools.
//!
//! [`MarketData`] is the narrow contract the tools depend on; [`YahooFinance`]
//! implements it over the public Yahoo Finance HTTP endpoints. Every failure
//! is reported as a [`ToolError`] so the tool boundary never sees anything
//! else.

pub mod yahoo;

pub use yahoo::YahooFinance;

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::Date;

/// Latest traded price of a symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Date of the price, `YYYY-MM-DD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<String>,
}

/// One daily bar of price history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub volume: Option<u64>,
}

/// A single dividend payment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub date: String,
    pub amount: f64,
}

/// A news headline related to a symbol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

/// A periodic financial statement (balance sheet or income statement).
///
/// `items` maps line-item names to their reported values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub period_end: String,
    pub items: serde_json::Map<String, serde_json::Value>,
}

/// Read-only market data queries used by the finance tools.
///
/// Symbols passed in are already validated and upper-cased.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote, ToolError>;

    /// Daily bars for `start..=end`.
    async fn history(&self, symbol: &str, start: Date, end: Date)
    -> Result<Vec<PriceBar>, ToolError>;

    async fn balance_sheet(&self, symbol: &str) -> Result<Vec<Statement>, ToolError>;

    async fn news(&self, symbol: &str) -> Result<Vec<NewsItem>, ToolError>;

    /// Company profile (sector, industry, summary, website, ...).
    async fn company_info(
        &self,
        symbol: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>, ToolError>;

    async fn dividends(&self, symbol: &str) -> Result<Vec<Dividend>, ToolError>;

    /// Income statements, most recent first.
    async fn financials(&self, symbol: &str) -> Result<Vec<Statement>, ToolError>;

    /// Get the source name for logging/debugging.
    fn source_name(&self) -> &'static str;
}
