use super::{FinanceToolName, Ticker, ticker_schema, to_payload};
use crate::error::ToolError;
use crate::market_data::{MarketData, Statement};
use crate::tools::Tool;
use serde_json::{Value, json};
use std::sync::Arc;

fn statements_payload(ticker: &Ticker, statements: &[Statement]) -> Result<Value, ToolError> {
    Ok(json!({
        "ticker": ticker.as_str(),
        "statements": to_payload(&statements)?,
    }))
}

/// Annual balance sheets.
pub struct GetBalanceSheet {
    data: Arc<dyn MarketData>,
}

impl GetBalanceSheet {
    #[must_use]
    pub fn new(data: Arc<dyn MarketData>) -> Self {
        Self { data }
    }
}

impl Tool for GetBalanceSheet {
    type Name = FinanceToolName;
    type Args = Ticker;

    fn name(&self) -> FinanceToolName {
        FinanceToolName::GetBalanceSheet
    }

    fn description(&self) -> &'static str {
        "Returns the balance sheet based on a ticker symbol."
    }

    fn input_schema(&self) -> Value {
        ticker_schema()
    }

    fn validate(&self, input: &Value) -> Result<Ticker, ToolError> {
        Ticker::from_args(input)
    }

    async fn execute(&self, ticker: Ticker) -> Result<Value, ToolError> {
        let statements = self.data.balance_sheet(ticker.as_str()).await?;
        statements_payload(&ticker, &statements)
    }
}

/// Annual income statements.
pub struct GetFinancials {
    data: Arc<dyn MarketData>,
}

impl GetFinancials {
    #[must_use]
    pub fn new(data: Arc<dyn MarketData>) -> Self {
        Self { data }
    }
}

impl Tool for GetFinancials {
    type Name = FinanceToolName;
    type Args = Ticker;

    fn name(&self) -> FinanceToolName {
        FinanceToolName::GetFinancials
    }

    fn description(&self) -> &'static str {
        "Returns financial statements (income statement / financials) for a ticker."
    }

    fn input_schema(&self) -> Value {
        ticker_schema()
    }

    fn validate(&self, input: &Value) -> Result<Ticker, ToolError> {
        Ticker::from_args(input)
    }

    async fn execute(&self, ticker: Ticker) -> Result<Value, ToolError> {
        let statements = self.data.financials(ticker.as_str()).await?;
        statements_payload(&ticker, &statements)
    }
}
