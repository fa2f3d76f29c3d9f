use super::{FinanceToolName, Ticker, ticker_schema, to_payload};
use crate::error::ToolError;
use crate::market_data::MarketData;
use crate::tools::Tool;
use serde_json::{Value, json};
use std::sync::Arc;

/// Dividend history, oldest first.
pub struct GetDividends {
    data: Arc<dyn MarketData>,
}

impl GetDividends {
    #[must_use]
    pub fn new(data: Arc<dyn MarketData>) -> Self {
        Self { data }
    }
}

impl Tool for GetDividends {
    type Name = FinanceToolName;
    type Args = Ticker;

    fn name(&self) -> FinanceToolName {
        FinanceToolName::GetDividends
    }

    fn description(&self) -> &'static str {
        "Returns the dividend history for a ticker."
    }

    fn input_schema(&self) -> Value {
        ticker_schema()
    }

    fn validate(&self, input: &Value) -> Result<Ticker, ToolError> {
        Ticker::from_args(input)
    }

    async fn execute(&self, ticker: Ticker) -> Result<Value, ToolError> {
        let dividends = self.data.dividends(ticker.as_str()).await?;
        Ok(json!({
            "ticker": ticker.as_str(),
            "dividends": to_payload(&dividends)?,
        }))
    }
}
