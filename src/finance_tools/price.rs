use super::{DateRange, FinanceToolName, Ticker, ticker_schema, to_payload};
use crate::error::ToolError;
use crate::market_data::MarketData;
use crate::tools::Tool;
use serde_json::{Value, json};
use std::sync::Arc;
use time::OffsetDateTime;

/// Latest price for a ticker.
pub struct GetStockPrice {
    data: Arc<dyn MarketData>,
}

impl GetStockPrice {
    #[must_use]
    pub fn new(data: Arc<dyn MarketData>) -> Self {
        Self { data }
    }
}

impl Tool for GetStockPrice {
    type Name = FinanceToolName;
    type Args = Ticker;

    fn name(&self) -> FinanceToolName {
        FinanceToolName::GetStockPrice
    }

    fn description(&self) -> &'static str {
        "Returns the current stock price based on a ticker symbol."
    }

    fn input_schema(&self) -> Value {
        ticker_schema()
    }

    fn validate(&self, input: &Value) -> Result<Ticker, ToolError> {
        Ticker::from_args(input)
    }

    async fn execute(&self, ticker: Ticker) -> Result<Value, ToolError> {
        let quote = self.data.quote(ticker.as_str()).await?;
        to_payload(&quote)
    }
}

/// Validated arguments of [`GetHistoricalStockPrice`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryArgs {
    pub ticker: Ticker,
    pub range: DateRange,
}

/// Daily price history between two dates, both inclusive.
pub struct GetHistoricalStockPrice {
    data: Arc<dyn MarketData>,
}

impl GetHistoricalStockPrice {
    #[must_use]
    pub fn new(data: Arc<dyn MarketData>) -> Self {
        Self { data }
    }
}

impl Tool for GetHistoricalStockPrice {
    type Name = FinanceToolName;
    type Args = HistoryArgs;

    fn name(&self) -> FinanceToolName {
        FinanceToolName::GetHistoricalStockPrice
    }

    fn description(&self) -> &'static str {
        "Returns the stock price over time based on a ticker symbol and a start and end date \
         (YYYY-MM-DD, inclusive)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": {
                    "type": "string",
                    "description": "Ticker symbol, e.g. AAPL"
                },
                "start_date": {
                    "type": "string",
                    "format": "date",
                    "description": "First day, YYYY-MM-DD"
                },
                "end_date": {
                    "type": "string",
                    "format": "date",
                    "description": "Last day, YYYY-MM-DD, not in the future"
                }
            },
            "required": ["ticker", "start_date", "end_date"]
        })
    }

    fn validate(&self, input: &Value) -> Result<HistoryArgs, ToolError> {
        Ok(HistoryArgs {
            ticker: Ticker::from_args(input)?,
            range: DateRange::from_args(input, OffsetDateTime::now_utc().date())?,
        })
    }

    async fn execute(&self, args: HistoryArgs) -> Result<Value, ToolError> {
        let HistoryArgs { ticker, range } = args;
        let bars = self
            .data
            .history(ticker.as_str(), range.start, range.end)
            .await?;
        Ok(json!({
            "ticker": ticker.as_str(),
            "start_date": range.start.to_string(),
            "end_date": range.end.to_string(),
            "bars": to_payload(&bars)?,
        }))
    }
}
