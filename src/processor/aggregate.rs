use std::{collections::HashMap, hash::Hash};

use crate::{
    helpers::kahan::KahanSum,
    processor::{
        Bucket, BucketOrder, Dimension, DimensionValue, Measure, ProcessorError,
        record::{SalesRecord, Table},
    },
};

/// Groups `table` by `key_of` and sums `value_of` per group
///
/// Buckets come out in first-encountered key order. `None` values are left
/// out of the sum, but their key still gets a bucket. A non-finite value
/// fails the whole call. Totals use the same compensated sum as
/// [`summarize`](crate::processor::summary::summarize).
pub fn group_sum<K, FK, FV>(
    table: &Table,
    key_of: FK,
    value_of: FV,
) -> Result<Vec<Bucket<K>>, ProcessorError>
where
    K: Eq + Hash + Clone,
    FK: Fn(&SalesRecord) -> K,
    FV: Fn(&SalesRecord) -> Result<Option<f64>, ProcessorError>,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, KahanSum)> = Vec::new();

    for record in table {
        let key = key_of(record);
        let idx = *slots.entry(key.clone()).or_insert_with(|| {
            groups.push((key, KahanSum::new()));
            groups.len() - 1
        });
        if let Some(v) = value_of(record)? {
            groups[idx].1.add(v);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, acc)| Bucket {
            key,
            total: acc.sum(),
        })
        .collect())
}

/// Sum of all bucket totals
pub fn bucket_mass<K>(buckets: &[Bucket<K>]) -> f64 {
    buckets.iter().map(|b| b.total).collect::<KahanSum>().sum()
}

/// Reads a measure, rejecting NaN and infinities
pub fn numeric(record: &SalesRecord, measure: Measure) -> Result<Option<f64>, ProcessorError> {
    match record.measure(measure) {
        Some(v) if !v.is_finite() => Err(ProcessorError::NonNumeric {
            order_id: record.order_id.clone(),
            measure: measure.to_string(),
        }),
        other => Ok(other),
    }
}

/// Column-driven group-by: sums `measure` per value of `dimension`
pub fn aggregate(
    table: &Table,
    dimension: Dimension,
    measure: Measure,
    order: BucketOrder,
) -> Result<Vec<Bucket<DimensionValue>>, ProcessorError> {
    let mut buckets = group_sum(
        table,
        |r| r.dimension_value(dimension),
        |r| numeric(r, measure),
    )?;
    sort_buckets(&mut buckets, order);
    Ok(buckets)
}

pub fn sort_buckets<K: Ord>(buckets: &mut [Bucket<K>], order: BucketOrder) {
    match order {
        BucketOrder::Encounter => {}
        BucketOrder::KeyAscending => buckets.sort_by(|a, b| a.key.cmp(&b.key)),
        // stable: equal totals keep encounter order
        BucketOrder::TotalAscending => buckets.sort_by(|a, b| a.total.total_cmp(&b.total)),
    }
}

/// Total price per product line, ascending by total
pub fn sales_by_product_line(table: &Table) -> Result<Vec<Bucket<String>>, ProcessorError> {
    let mut buckets = group_sum(
        table,
        |r| r.product_line.clone(),
        |r| numeric(r, Measure::TotalPrice),
    )?;
    sort_buckets(&mut buckets, BucketOrder::TotalAscending);
    Ok(buckets)
}

/// Total price per hour-of-day, ascending by hour
pub fn sales_by_hour(table: &Table) -> Result<Vec<Bucket<u8>>, ProcessorError> {
    let mut buckets = group_sum(table, SalesRecord::hour, |r| {
        numeric(r, Measure::TotalPrice)
    })?;
    sort_buckets(&mut buckets, BucketOrder::KeyAscending);
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::loader::fallback_table;
    use chrono::NaiveTime;

    fn rec(id: &str, product: &str, time: &str, price: Option<f64>) -> SalesRecord {
        let time = NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap();
        SalesRecord::new(id, time, "上海", "会员", "男", product, price, Some(4.0))
    }

    #[test]
    fn test_product_line_ascending() {
        let buckets = sales_by_product_line(&fallback_table()).unwrap();
        let got: Vec<(&str, f64)> = buckets.iter().map(|b| (b.key.as_str(), b.total)).collect();
        assert_eq!(got, vec![("食品", 218.0), ("服装", 458.0), ("电子产品", 698.0)]);
    }

    #[test]
    fn test_hour_ascending() {
        let table = Table::new(vec![
            rec("1", "A", "20:00:00", Some(1.0)),
            rec("2", "A", "09:10:00", Some(2.0)),
            rec("3", "A", "20:59:59", Some(3.0)),
            rec("4", "A", "00:00:01", Some(4.0)),
        ])
        .unwrap();
        let buckets = sales_by_hour(&table).unwrap();
        let got: Vec<(u8, f64)> = buckets.iter().map(|b| (b.key, b.total)).collect();
        assert_eq!(got, vec![(0, 4.0), (9, 2.0), (20, 4.0)]);
    }

    #[test]
    fn test_ties_keep_encounter_order() {
        let table = Table::new(vec![
            rec("1", "乙", "10:00:00", Some(5.0)),
            rec("2", "甲", "10:00:00", Some(5.0)),
            rec("3", "丙", "10:00:00", Some(1.0)),
        ])
        .unwrap();
        let keys: Vec<String> = sales_by_product_line(&table)
            .unwrap()
            .into_iter()
            .map(|b| b.key)
            .collect();
        assert_eq!(keys, vec!["丙", "乙", "甲"]);
    }

    #[test]
    fn test_missing_values_excluded_but_group_kept() {
        let table = Table::new(vec![
            rec("1", "A", "10:00:00", None),
            rec("2", "B", "10:00:00", Some(3.0)),
            rec("3", "B", "10:00:00", None),
        ])
        .unwrap();
        let buckets = group_sum(&table, |r| r.product_line.clone(), |r| {
            numeric(r, Measure::TotalPrice)
        })
        .unwrap();
        assert_eq!(
            buckets,
            vec![
                Bucket { key: "A".to_string(), total: 0.0 },
                Bucket { key: "B".to_string(), total: 3.0 },
            ]
        );
    }

    #[test]
    fn test_empty_table_gives_no_buckets() {
        let table = Table::default();
        assert!(sales_by_product_line(&table).unwrap().is_empty());
        assert!(sales_by_hour(&table).unwrap().is_empty());
    }

    #[test]
    fn test_non_finite_value_fails_call() {
        let table = Table::new(vec![rec("9", "A", "10:00:00", Some(f64::NAN))]).unwrap();
        let err = sales_by_product_line(&table).unwrap_err();
        assert!(matches!(err, ProcessorError::NonNumeric { order_id, .. } if order_id == "9"));
    }

    #[test]
    fn test_fractional_prices_keep_mass_with_summary() {
        let records = (0..10)
            .map(|i| rec(&i.to_string(), "食品", "10:00:00", Some(0.1)))
            .collect();
        let table = Table::new(records).unwrap();
        let total = crate::processor::summary::summarize(&table).unwrap().total_sales;
        assert_eq!(total, 1);

        let products = sales_by_product_line(&table).unwrap();
        let hours = sales_by_hour(&table).unwrap();
        assert_eq!(products[0].total, 1.0);
        assert_eq!(bucket_mass(&products).trunc() as i64, total);
        assert_eq!(bucket_mass(&hours).trunc() as i64, total);
    }

    #[test]
    fn test_aggregate_by_city_rating_in_encounter_order() {
        let buckets = aggregate(
            &fallback_table(),
            Dimension::City,
            Measure::Rating,
            BucketOrder::Encounter,
        )
        .unwrap();
        let keys: Vec<String> = buckets.iter().map(|b| b.key.to_string()).collect();
        assert_eq!(keys, vec!["上海", "北京", "广州"]);
        assert!((buckets[0].total - 8.3).abs() < 1e-9);
    }
}
