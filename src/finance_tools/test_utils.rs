use crate::error::ToolError;
use crate::market_data::{Dividend, MarketData, NewsItem, PriceBar, Quote, Statement};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use time::Date;

// ===================
// Mock Market Data
// ===================

/// Canned data for `ACME`; counts every upstream call.
#[derive(Default)]
pub struct MockMarketData {
    calls: AtomicUsize,
    failure: Option<ToolError>,
}

impl MockMarketData {
    pub fn failing(error: ToolError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) -> Result<(), ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failure.clone().map_or(Ok(()), Err)
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[async_trait]
impl MarketData for MockMarketData {
    async fn quote(&self, symbol: &str) -> Result<Quote, ToolError> {
        self.hit()?;
        Ok(Quote {
            symbol: symbol.to_owned(),
            price: 12.5,
            currency: Some("USD".to_owned()),
            as_of: Some("2024-01-05".to_owned()),
        })
    }

    async fn history(
        &self,
        _symbol: &str,
        start: Date,
        _end: Date,
    ) -> Result<Vec<PriceBar>, ToolError> {
        self.hit()?;
        let bar = |date: String, close: f64| PriceBar {
            date,
            open: None,
            high: None,
            low: None,
            close,
            volume: Some(1_000),
        };
        let next = start.next_day().unwrap_or(start);
        Ok(vec![
            bar(start.to_string(), 10.0),
            bar(next.to_string(), 11.0),
        ])
    }

    async fn balance_sheet(&self, _symbol: &str) -> Result<Vec<Statement>, ToolError> {
        self.hit()?;
        Ok(vec![Statement {
            period_end: "2023-12-31".to_owned(),
            items: object(json!({"totalAssets": 5000, "totalLiab": 2000})),
        }])
    }

    async fn news(&self, _symbol: &str) -> Result<Vec<NewsItem>, ToolError> {
        self.hit()?;
        Ok(vec![NewsItem {
            title: "Acme ships anvils".to_owned(),
            publisher: Some("Wire".to_owned()),
            link: None,
            published_at: Some("2024-01-04".to_owned()),
        }])
    }

    async fn company_info(&self, _symbol: &str) -> Result<Map<String, Value>, ToolError> {
        self.hit()?;
        Ok(object(json!({"longName": "Acme Corp", "sector": "Industrials"})))
    }

    async fn dividends(&self, _symbol: &str) -> Result<Vec<Dividend>, ToolError> {
        self.hit()?;
        Ok(vec![Dividend {
            date: "2024-01-03".to_owned(),
            amount: 0.25,
        }])
    }

    async fn financials(&self, _symbol: &str) -> Result<Vec<Statement>, ToolError> {
        self.hit()?;
        Ok(vec![Statement {
            period_end: "2023-12-31".to_owned(),
            items: object(json!({"totalRevenue": 1000, "netIncome": 100})),
        }])
    }

    fn source_name(&self) -> &'static str {
        "mock"
    }
}
