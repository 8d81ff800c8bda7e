use std::collections::HashSet;

use crate::processor::record::{FilterOptions, SalesRecord, Table};

/// Selected values for each filterable dimension
///
/// Values within a dimension are OR-ed, dimensions are AND-ed. An empty set
/// matches no rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub cities: HashSet<String>,
    pub customer_types: HashSet<String>,
    pub genders: HashSet<String>,
}

impl FilterSelection {
    pub fn new<C, T, G>(cities: C, customer_types: T, genders: G) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
        G: IntoIterator,
        G::Item: Into<String>,
    {
        FilterSelection {
            cities: cities.into_iter().map(Into::into).collect(),
            customer_types: customer_types.into_iter().map(Into::into).collect(),
            genders: genders.into_iter().map(Into::into).collect(),
        }
    }

    /// Default selection: every distinct value present in the table
    pub fn all(table: &Table) -> Self {
        Self::from_options(&FilterOptions::from_table(table))
    }

    pub fn from_options(options: &FilterOptions) -> Self {
        Self::new(
            options.cities.iter().cloned(),
            options.customer_types.iter().cloned(),
            options.genders.iter().cloned(),
        )
    }

    pub fn matches(&self, record: &SalesRecord) -> bool {
        self.cities.contains(&record.city)
            && self.customer_types.contains(&record.customer_type)
            && self.genders.contains(&record.gender)
    }
}

/// Returns the records matching `selection`, in table order
///
/// The input table is left untouched.
pub fn filter(table: &Table, selection: &FilterSelection) -> Table {
    let records = table
        .iter()
        .filter(|r| selection.matches(r))
        .cloned()
        .collect();
    Table::from_validated(records)
}
