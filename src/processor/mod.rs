use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub mod aggregate;
pub mod dashboard;
pub mod filter;
pub mod loader;
pub mod record;
pub mod summary;
pub mod workbook;

/// Error type used across the crate
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Sheet '{0}' not found in workbook")]
    MissingSheet(String),

    #[error("UTF8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Missing header line")]
    MissingHeader,

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Malformed row at line {line}: expected {expected} fields, got {found}")]
    MalformedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid time '{value}' at line {line}: expected HH:MM:SS or a time cell")]
    InvalidTime { line: usize, value: String },

    #[error("Invalid number '{value}' in column '{column}' at line {line}")]
    InvalidNumber {
        line: usize,
        column: String,
        value: String,
    },

    #[error("Duplicate order id: {0}")]
    DuplicateOrderId(String),

    #[error("Non-numeric {measure} value in order {order_id}")]
    NonNumeric { order_id: String, measure: String },
}

/// Categorical columns a table can be filtered or grouped on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    City,
    CustomerType,
    Gender,
    ProductLine,
    /// Derived hour-of-day (0-23)
    Hour,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::City => "city",
            Dimension::CustomerType => "customer_type",
            Dimension::Gender => "gender",
            Dimension::ProductLine => "product_line",
            Dimension::Hour => "hour",
        };
        f.write_str(name)
    }
}

/// Numeric columns that can be summed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measure {
    TotalPrice,
    Rating,
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::TotalPrice => f.write_str("total_price"),
            Measure::Rating => f.write_str("rating"),
        }
    }
}

/// Value of a grouping key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum DimensionValue {
    Text(String),
    Hour(u8),
}

impl fmt::Display for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionValue::Text(s) => f.write_str(s),
            DimensionValue::Hour(h) => write!(f, "{h}"),
        }
    }
}

/// One (key, summed total) pair produced by grouping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket<K> {
    pub key: K,
    pub total: f64,
}

/// Ordering applied to aggregation output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketOrder {
    /// First-encountered group order
    Encounter,
    /// Natural order of the grouping key
    KeyAscending,
    /// Ascending by total, ties kept in encounter order
    TotalAscending,
}
