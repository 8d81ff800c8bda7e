use serde::Serialize;

use crate::{
    helpers::kahan::KahanSum,
    processor::{
        Measure, ProcessorError,
        aggregate::numeric,
        record::Table,
    },
};

/// Key figures of a (filtered) table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    /// Sum of total price, truncated toward zero
    pub total_sales: i64,
    /// Mean rating to 1 decimal, `None` without ratings
    pub average_rating: Option<f64>,
    /// Mean total price to 2 decimals, `None` without prices
    pub average_transaction: Option<f64>,
}

impl Summary {
    /// Number of star glyphs to show next to the average rating
    pub fn star_count(&self) -> Option<u32> {
        self.average_rating
            .map(|r| r.round_ties_even().max(0.0) as u32)
    }

    pub fn stars(&self, glyph: &str) -> String {
        glyph.repeat(self.star_count().unwrap_or(0) as usize)
    }
}

/// Rounds half-to-even at `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Computes the dashboard key figures
///
/// Missing prices and ratings are excluded, not counted as zero. Values are
/// accumulated in record order with the same compensated sum the group-by
/// buckets use.
pub fn summarize(table: &Table) -> Result<Summary, ProcessorError> {
    let prices = accumulate(table, Measure::TotalPrice)?;
    let ratings = accumulate(table, Measure::Rating)?;

    Ok(Summary {
        total_sales: prices.sum().trunc() as i64,
        average_rating: ratings.mean().map(|m| round_to(m, 1)),
        average_transaction: prices.mean().map(|m| round_to(m, 2)),
    })
}

fn accumulate(table: &Table, measure: Measure) -> Result<KahanSum, ProcessorError> {
    let mut acc = KahanSum::new();
    for record in table {
        if let Some(v) = numeric(record, measure)? {
            acc.add(v);
        }
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{loader::fallback_table, record::SalesRecord};
    use chrono::NaiveTime;

    fn rec(id: &str, price: Option<f64>, rating: Option<f64>) -> SalesRecord {
        let time = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        SalesRecord::new(id, time, "上海", "会员", "男", "食品", price, rating)
    }

    #[test]
    fn test_fallback_summary() {
        let s = summarize(&fallback_table()).unwrap();
        assert_eq!(s.total_sales, 1374);
        assert_eq!(s.average_rating, Some(4.2));
        assert_eq!(s.average_transaction, Some(229.0));
        assert_eq!(s.star_count(), Some(4));
        assert_eq!(s.stars("⭐"), "⭐⭐⭐⭐");
    }

    #[test]
    fn test_empty_table() {
        let s = summarize(&Table::default()).unwrap();
        assert_eq!(s.total_sales, 0);
        assert_eq!(s.average_rating, None);
        assert_eq!(s.average_transaction, None);
        assert_eq!(s.star_count(), None);
        assert_eq!(s.stars("*"), "");
    }

    #[test]
    fn test_missing_values_excluded() {
        let table = Table::new(vec![
            rec("1", Some(10.0), None),
            rec("2", None, Some(3.0)),
            rec("3", Some(20.5), Some(5.0)),
        ])
        .unwrap();
        let s = summarize(&table).unwrap();
        assert_eq!(s.total_sales, 30);
        assert_eq!(s.average_transaction, Some(15.25));
        assert_eq!(s.average_rating, Some(4.0));
    }

    #[test]
    fn test_total_is_truncated() {
        let table = Table::new(vec![rec("1", Some(10.75), None), rec("2", Some(0.2), None)]).unwrap();
        assert_eq!(summarize(&table).unwrap().total_sales, 10);
    }

    #[test]
    fn test_fractional_total_not_truncated_below() {
        let records = (0..10)
            .map(|i| rec(&i.to_string(), Some(0.1), Some(4.0)))
            .collect();
        let s = summarize(&Table::new(records).unwrap()).unwrap();
        assert_eq!(s.total_sales, 1);
        assert_eq!(s.average_transaction, Some(0.1));
    }

    #[test]
    fn test_star_count_ties_to_even() {
        let s = Summary {
            total_sales: 0,
            average_rating: Some(4.5),
            average_transaction: None,
        };
        assert_eq!(s.star_count(), Some(4));
    }

    #[test]
    fn test_non_finite_rating_is_error() {
        let table = Table::new(vec![rec("7", Some(1.0), Some(f64::INFINITY))]).unwrap();
        assert!(matches!(
            summarize(&table),
            Err(ProcessorError::NonNumeric { order_id, .. }) if order_id == "7"
        ));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(229.0, 2), 229.0);
        assert_eq!(round_to(4.16, 1), 4.2);
        assert_eq!(round_to(3.14159, 2), 3.14);
    }
}
