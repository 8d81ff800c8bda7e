//! # sales-dashboard
//!
//! Data core of a small sales dashboard. It loads transaction records, filters
//! them by city, customer type and gender, and computes the figures a
//! dashboard shows:
//!
//! - Spreadsheet loading from a named sheet (xlsx, xls, ods) via `calamine`
//! - Memory-mapped CSV loading with parallel chunk parsing
//! - Hour-of-day derived from the `HH:MM:SS` time column at load
//! - Built-in sample dataset when the data file is absent
//! - Filtering: OR within a dimension, AND across dimensions
//! - **Group-by** sums per product line (ascending by total) and per hour
//! - Summary: total sales, average rating (with star count), average per order
//!
//! # Example
//!
//! ```rust
//! use sales_dashboard::{Dashboard, DashboardConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DashboardConfig::default().with_source("does-not-exist.csv");
//!     let (dashboard, warning) = Dashboard::load(&config)?;
//!     assert!(warning.is_some());
//!
//!     let view = dashboard.query().cities(["上海"]).execute()?;
//!     assert_eq!(view.summary.total_sales, 388);
//!
//!     for bucket in &view.sales_by_product_line {
//!         println!("{} => {}", bucket.key, bucket.total);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
mod helpers;
pub mod processor;

pub use config::{ColumnNames, DashboardConfig};
pub use processor::{
    Bucket, BucketOrder, Dimension, DimensionValue, Measure, ProcessorError,
    aggregate::{aggregate, bucket_mass, group_sum, sales_by_hour, sales_by_product_line},
    dashboard::{Dashboard, DashboardQuery, DashboardView},
    filter::{FilterSelection, filter},
    loader::{LoadOutcome, LoadWarning, fallback_table, is_workbook, load, load_csv, parse_csv},
    record::{FilterOptions, SalesRecord, Table},
    summary::{Summary, summarize},
    workbook::{load_workbook, parse_range},
};
