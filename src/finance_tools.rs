//! The seven read-only finance tools exposed to the model.
//!
//! Every tool takes a `ticker` argument (alias `symbol`); the historical
//! price tool also takes `start_date` and `end_date`. Arguments are checked
//! in [`Tool::validate`](crate::Tool::validate), so a bad call never reaches
//! the [`MarketData`] source.

mod args;
mod company;
mod dividends;
mod price;
mod statements;

#[cfg(test)]
pub(crate) mod test_utils;

pub use args::{DateRange, Ticker};
pub use company::{GetCompanyInfo, GetStockNews};
pub use dividends::GetDividends;
pub use price::{GetHistoricalStockPrice, GetStockPrice, HistoryArgs};
pub use statements::{GetBalanceSheet, GetFinancials};

use crate::error::{ConfigurationError, ToolError};
use crate::market_data::MarketData;
use crate::tools::{ToolName, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Names of the finance tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinanceToolName {
    GetStockPrice,
    GetHistoricalStockPrice,
    GetBalanceSheet,
    GetStockNews,
    GetCompanyInfo,
    GetDividends,
    GetFinancials,
}

impl ToolName for FinanceToolName {}

/// Register all seven finance tools backed by `data`.
///
/// # Errors
/// Returns [`ConfigurationError::DuplicateTool`] if any of them is already
/// registered.
pub fn register_finance_tools(
    registry: &mut ToolRegistry,
    data: &Arc<dyn MarketData>,
) -> Result<(), ConfigurationError> {
    registry
        .register(GetStockPrice::new(Arc::clone(data)))?
        .register(GetHistoricalStockPrice::new(Arc::clone(data)))?
        .register(GetBalanceSheet::new(Arc::clone(data)))?
        .register(GetStockNews::new(Arc::clone(data)))?
        .register(GetCompanyInfo::new(Arc::clone(data)))?
        .register(GetDividends::new(Arc::clone(data)))?
        .register(GetFinancials::new(Arc::clone(data)))?;
    log::debug!(
        "Registered finance tools source={} total={}",
        data.source_name(),
        registry.len()
    );
    Ok(())
}

/// Input schema for tools that only take a ticker.
fn ticker_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "ticker": {
                "type": "string",
                "description": "Ticker symbol, e.g. AAPL, BRK-B, ^GSPC"
            }
        },
        "required": ["ticker"]
    })
}

fn to_payload<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::upstream(format!("unserializable data: {e}")))
}
