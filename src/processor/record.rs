use std::collections::HashSet;

use chrono::{NaiveTime, Timelike};
use serde::Serialize;

use crate::processor::{Dimension, DimensionValue, Measure, ProcessorError};

/// One sales transaction
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRecord {
    pub order_id: String,
    pub time: NaiveTime,
    pub city: String,
    pub customer_type: String,
    pub gender: String,
    pub product_line: String,
    /// `None` when the source cell was empty
    pub total_price: Option<f64>,
    /// `None` when the source cell was empty
    pub rating: Option<f64>,
    hour: u8,
}

impl SalesRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: impl Into<String>,
        time: NaiveTime,
        city: impl Into<String>,
        customer_type: impl Into<String>,
        gender: impl Into<String>,
        product_line: impl Into<String>,
        total_price: Option<f64>,
        rating: Option<f64>,
    ) -> Self {
        SalesRecord {
            order_id: order_id.into(),
            hour: time.hour() as u8,
            time,
            city: city.into(),
            customer_type: customer_type.into(),
            gender: gender.into(),
            product_line: product_line.into(),
            total_price,
            rating,
        }
    }

    /// Hour-of-day derived from `time` at construction
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Categorical value of this record for a dimension
    pub fn text(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::City => Some(self.city.as_str()),
            Dimension::CustomerType => Some(self.customer_type.as_str()),
            Dimension::Gender => Some(self.gender.as_str()),
            Dimension::ProductLine => Some(self.product_line.as_str()),
            Dimension::Hour => None,
        }
    }

    pub fn dimension_value(&self, dimension: Dimension) -> DimensionValue {
        match self.text(dimension) {
            Some(s) => DimensionValue::Text(s.to_string()),
            None => DimensionValue::Hour(self.hour),
        }
    }

    pub fn measure(&self, measure: Measure) -> Option<f64> {
        match measure {
            Measure::TotalPrice => self.total_price,
            Measure::Rating => self.rating,
        }
    }
}

/// Ordered collection of records with unique order ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    records: Vec<SalesRecord>,
}

impl Table {
    /// Builds a table, rejecting duplicate order ids
    pub fn new(records: Vec<SalesRecord>) -> Result<Self, ProcessorError> {
        {
            let mut seen = HashSet::with_capacity(records.len());
            for r in &records {
                if !seen.insert(r.order_id.as_str()) {
                    return Err(ProcessorError::DuplicateOrderId(r.order_id.clone()));
                }
            }
        }
        Ok(Table { records })
    }

    /// Records must come from an already validated table
    pub(crate) fn from_validated(records: Vec<SalesRecord>) -> Self {
        Table { records }
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &SalesRecord> + '_ {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, order_id: &str) -> Option<&SalesRecord> {
        self.records.iter().find(|r| r.order_id == order_id)
    }

    /// Distinct values of a categorical dimension in first-seen order
    pub fn distinct(&self, dimension: Dimension) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for r in &self.records {
            let value = match r.text(dimension) {
                Some(s) => s.to_string(),
                None => r.hour.to_string(),
            };
            if seen.insert(value.clone()) {
                out.push(value);
            }
        }
        out
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a SalesRecord;
    type IntoIter = std::slice::Iter<'a, SalesRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Distinct values offered by the filter controls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub cities: Vec<String>,
    pub customer_types: Vec<String>,
    pub genders: Vec<String>,
}

impl FilterOptions {
    pub fn from_table(table: &Table) -> Self {
        FilterOptions {
            cities: table.distinct(Dimension::City),
            customer_types: table.distinct(Dimension::CustomerType),
            genders: table.distinct(Dimension::Gender),
        }
    }
}
