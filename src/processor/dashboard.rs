use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::{
    config::DashboardConfig,
    processor::{
        Bucket, ProcessorError,
        aggregate::{sales_by_hour, sales_by_product_line},
        filter::{FilterSelection, filter},
        loader::{LoadWarning, load},
        record::{FilterOptions, Table},
        summary::{Summary, summarize},
    },
};

/// Everything the presentation layer needs for one render
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub filter_options: FilterOptions,
    pub row_count: usize,
    pub summary: Summary,
    pub sales_by_product_line: Vec<Bucket<String>>,
    pub sales_by_hour: Vec<Bucket<u8>>,
}

/// A loaded table plus its filter options
///
/// The table is read-only after construction; every query works on a
/// filtered copy.
#[derive(Debug, Clone)]
pub struct Dashboard {
    table: Table,
    options: FilterOptions,
}

impl Dashboard {
    pub fn new(table: Table) -> Self {
        let options = FilterOptions::from_table(&table);
        Dashboard { table, options }
    }

    /// Loads the configured source, returning the fallback warning if any
    pub fn load(config: &DashboardConfig) -> Result<(Self, Option<LoadWarning>), ProcessorError> {
        let outcome = load(config)?;
        Ok((Self::new(outcome.table), outcome.warning))
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Default selection: all values of every dimension
    pub fn default_selection(&self) -> FilterSelection {
        FilterSelection::from_options(&self.options)
    }

    pub fn query(&self) -> DashboardQuery<'_> {
        DashboardQuery::new(self)
    }

    /// Filters, then computes summary and both chart series
    pub fn render(&self, selection: &FilterSelection) -> Result<DashboardView, ProcessorError> {
        let filtered = filter(&self.table, selection);
        debug!(
            total = self.table.len(),
            selected = filtered.len(),
            "rendering dashboard"
        );

        let summary = summarize(&filtered)?;
        Ok(DashboardView {
            filter_options: self.options.clone(),
            row_count: filtered.len(),
            summary,
            sales_by_product_line: sales_by_product_line(&filtered)?,
            sales_by_hour: sales_by_hour(&filtered)?,
        })
    }
}

/// Builder over a dashboard's filter selection
///
/// Dimensions left unset keep every value.
#[derive(Debug, Clone)]
pub struct DashboardQuery<'a> {
    dashboard: &'a Dashboard,
    cities: Option<HashSet<String>>,
    customer_types: Option<HashSet<String>>,
    genders: Option<HashSet<String>>,
}

impl<'a> DashboardQuery<'a> {
    pub fn new(dashboard: &'a Dashboard) -> Self {
        Self {
            dashboard,
            cities: None,
            customer_types: None,
            genders: None,
        }
    }

    /// Restrict to these cities
    pub fn cities<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cities = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to these customer types
    pub fn customer_types<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.customer_types = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to these genders
    pub fn genders<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genders = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn selection(&self) -> FilterSelection {
        let mut selection = self.dashboard.default_selection();
        if let Some(v) = &self.cities {
            selection.cities = v.clone();
        }
        if let Some(v) = &self.customer_types {
            selection.customer_types = v.clone();
        }
        if let Some(v) = &self.genders {
            selection.genders = v.clone();
        }
        selection
    }

    /// Filtered table only
    pub fn rows(&self) -> Table {
        filter(self.dashboard.table(), &self.selection())
    }

    pub fn execute(self) -> Result<DashboardView, ProcessorError> {
        self.dashboard.render(&self.selection())
    }
}
