//! Argument parsing shared by the finance tools.

use crate::error::ToolError;
use serde_json::{Map, Value};
use time::{Date, macros::format_description};

const MAX_TICKER_LEN: usize = 12;

/// A validated, upper-cased ticker symbol such as `AAPL`, `BRK-B`, `^GSPC`
/// or `EURUSD=X`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticker(String);

impl Ticker {
    /// # Errors
    /// Returns a validation error for `field` if `raw` is not a ticker.
    pub fn parse(field: &str, raw: &str) -> Result<Self, ToolError> {
        let symbol = raw.trim();
        if symbol.is_empty() {
            return Err(ToolError::validation(field, "must not be empty"));
        }
        if symbol.len() > MAX_TICKER_LEN {
            return Err(ToolError::validation(
                field,
                format!("must be at most {MAX_TICKER_LEN} characters"),
            ));
        }
        if let Some(bad) = symbol
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')))
        {
            return Err(ToolError::validation(
                field,
                format!("contains invalid character {bad:?}"),
            ));
        }
        if !symbol
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '^')
        {
            return Err(ToolError::validation(
                field,
                "must start with a letter, digit or '^'",
            ));
        }
        Ok(Self(symbol.to_ascii_uppercase()))
    }

    /// Reads `ticker` (or its alias `symbol`) from tool arguments.
    ///
    /// # Errors
    /// Returns a validation error if the key is missing, not a string, or
    /// not a ticker.
    pub fn from_args(input: &Value) -> Result<Self, ToolError> {
        let args = require_object(input)?;
        let (field, value) = args
            .get_key_value("ticker")
            .or_else(|| args.get_key_value("symbol"))
            .ok_or_else(|| ToolError::validation("ticker", "is required"))?;
        let raw = value
            .as_str()
            .ok_or_else(|| ToolError::validation(field.as_str(), "must be a string"))?;
        Self::parse(field, raw)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive calendar range with `start <= end <= today`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl DateRange {
    /// Reads `start_date` and `end_date` (`YYYY-MM-DD`).
    ///
    /// # Errors
    /// Returns a validation error naming the offending field.
    pub fn from_args(input: &Value, today: Date) -> Result<Self, ToolError> {
        let args = require_object(input)?;
        let start = parse_date(args, "start_date")?;
        let end = parse_date(args, "end_date")?;

        if start > end {
            return Err(ToolError::validation(
                "start_date",
                format!("{start} is after end_date {end}"),
            ));
        }
        if end > today {
            return Err(ToolError::validation(
                "end_date",
                format!("{end} is in the future"),
            ));
        }
        Ok(Self { start, end })
    }
}

fn require_object(input: &Value) -> Result<&Map<String, Value>, ToolError> {
    input
        .as_object()
        .ok_or_else(|| ToolError::validation("arguments", "must be a JSON object"))
}

fn parse_date(args: &Map<String, Value>, field: &str) -> Result<Date, ToolError> {
    let raw = args
        .get(field)
        .ok_or_else(|| ToolError::validation(field, "is required"))?
        .as_str()
        .ok_or_else(|| ToolError::validation(field, "must be a string"))?;
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| ToolError::validation(field, format!("{raw:?} is not a YYYY-MM-DD date")))
}
