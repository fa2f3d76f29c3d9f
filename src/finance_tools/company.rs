use super::{FinanceToolName, Ticker, ticker_schema, to_payload};
use crate::error::ToolError;
use crate::market_data::MarketData;
use crate::tools::Tool;
use serde_json::{Value, json};
use std::sync::Arc;

/// Company profile: summary, sector, industry, website and key figures.
pub struct GetCompanyInfo {
    data: Arc<dyn MarketData>,
}

impl GetCompanyInfo {
    #[must_use]
    pub fn new(data: Arc<dyn MarketData>) -> Self {
        Self { data }
    }
}

impl Tool for GetCompanyInfo {
    type Name = FinanceToolName;
    type Args = Ticker;

    fn name(&self) -> FinanceToolName {
        FinanceToolName::GetCompanyInfo
    }

    fn description(&self) -> &'static str {
        "Returns the company profile for a ticker (summary, sector, industry, website, etc.)."
    }

    fn input_schema(&self) -> Value {
        ticker_schema()
    }

    fn validate(&self, input: &Value) -> Result<Ticker, ToolError> {
        Ticker::from_args(input)
    }

    async fn execute(&self, ticker: Ticker) -> Result<Value, ToolError> {
        let profile = self.data.company_info(ticker.as_str()).await?;
        Ok(json!({
            "ticker": ticker.as_str(),
            "profile": profile,
        }))
    }
}

/// Recent news headlines.
pub struct GetStockNews {
    data: Arc<dyn MarketData>,
}

impl GetStockNews {
    #[must_use]
    pub fn new(data: Arc<dyn MarketData>) -> Self {
        Self { data }
    }
}

impl Tool for GetStockNews {
    type Name = FinanceToolName;
    type Args = Ticker;

    fn name(&self) -> FinanceToolName {
        FinanceToolName::GetStockNews
    }

    fn description(&self) -> &'static str {
        "Returns recent news based on a ticker symbol."
    }

    fn input_schema(&self) -> Value {
        ticker_schema()
    }

    fn validate(&self, input: &Value) -> Result<Ticker, ToolError> {
        Ticker::from_args(input)
    }

    async fn execute(&self, ticker: Ticker) -> Result<Value, ToolError> {
        let articles = self.data.news(ticker.as_str()).await?;
        Ok(json!({
            "ticker": ticker.as_str(),
            "articles": to_payload(&articles)?,
        }))
    }
}
