use crate::data::PriceTable;
use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Descriptive statistics for one ticker, computed over its non-missing
/// observations only.
///
/// Every measure is optional: an all-missing column yields a row of
/// `None`s, and the sample standard deviation needs at least two
/// observations. `latest` is the value at the table's most recent date,
/// not the most recent non-missing value, so it is `None` when the last
/// row has a hole for this ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerStats {
    pub symbol: String,
    pub observations: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub latest: Option<f64>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Computes per-ticker descriptive statistics for a price table.
///
/// # Errors
/// Returns an "insufficient data" error when the table has no rows.
pub fn descriptive_statistics(table: &PriceTable) -> Result<Vec<TickerStats>> {
    if table.num_rows() == 0 {
        bail!("insufficient data: price table has no rows");
    }

    let mut rows = Vec::with_capacity(table.num_tickers());
    for (index, symbol) in table.tickers().iter().enumerate() {
        let column = table.column(index);
        let values: Vec<f64> = column.iter().filter_map(|v| *v).collect();
        let range = table.observed_range(index);

        rows.push(TickerStats {
            symbol: symbol.clone(),
            observations: values.len(),
            mean: mean(&values),
            median: median(&values),
            std_dev: sample_std_dev(&values),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
            latest: column.last().copied().flatten(),
            first_date: range.map(|(first, _)| first),
            last_date: range.map(|(_, last)| last),
        });
    }

    Ok(rows)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Midpoint of the sorted values; mean of the two middle values on even
/// counts.
fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation (N-1 denominator); undefined below two
/// observations.
fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - m;
            diff * diff
        })
        .sum::<f64>()
        / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Percentage returns between consecutive non-missing observations of one
/// column.
pub fn daily_returns(column: &[Option<f64>]) -> Vec<f64> {
    let values: Vec<f64> = column.iter().filter_map(|v| *v).collect();
    values
        .windows(2)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect()
}

/// Rebases a column so its first non-missing observation equals 100.
///
/// Holes stay holes; entries before the first observation are also `None`.
pub fn normalized_base_100(column: &[Option<f64>]) -> Vec<Option<f64>> {
    let base = column.iter().find_map(|v| *v);
    match base {
        Some(base) => column
            .iter()
            .map(|v| v.map(|price| price / base * 100.0))
            .collect(),
        None => vec![None; column.len()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceSeries;
    use chrono::Duration;

    const TOL: f64 = 1e-9;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn table_from(columns: Vec<(&str, Vec<Option<f64>>)>) -> PriceTable {
        let base = date("2024-01-01");
        let series: Vec<PriceSeries> = columns
            .into_iter()
            .map(|(symbol, values)| {
                let points = values
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, v)| v.map(|price| (base + Duration::days(i as i64), price)))
                    .collect();
                PriceSeries::new(symbol, points)
            })
            .collect();
        PriceTable::from_series(&series).unwrap()
    }

    #[test]
    fn statistics_over_a_full_column() {
        let table = table_from(vec![(
            "A",
            vec![Some(100.0), Some(102.0), Some(104.0), Some(103.0), Some(105.0)],
        )]);
        let stats = descriptive_statistics(&table).unwrap();
        let a = &stats[0];

        assert_eq!(a.observations, 5);
        assert!((a.mean.unwrap() - 102.8).abs() < TOL);
        assert!((a.median.unwrap() - 103.0).abs() < TOL);
        assert_eq!(a.min, Some(100.0));
        assert_eq!(a.max, Some(105.0));
        assert_eq!(a.latest, Some(105.0));
        assert_eq!(a.first_date, Some(date("2024-01-01")));
        assert_eq!(a.last_date, Some(date("2024-01-05")));
    }

    #[test]
    fn median_averages_the_two_middle_values_on_even_counts() {
        assert!((median(&[4.0, 1.0, 3.0, 2.0]).unwrap() - 2.5).abs() < TOL);
        assert!((median(&[3.0, 1.0, 2.0]).unwrap() - 2.0).abs() < TOL);
    }

    #[test]
    fn std_dev_of_a_single_observation_is_undefined() {
        assert_eq!(sample_std_dev(&[100.0]), None);
        assert!(sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).is_some());
    }

    #[test]
    fn sample_std_dev_uses_the_n_minus_one_denominator() {
        // Variance of [1, 2, 3] with N-1 is 1.0.
        assert!((sample_std_dev(&[1.0, 2.0, 3.0]).unwrap() - 1.0).abs() < TOL);
    }

    #[test]
    fn missing_last_row_makes_latest_undefined() {
        let table = table_from(vec![
            ("A", vec![Some(100.0), Some(102.0), None]),
            ("B", vec![Some(50.0), Some(51.0), Some(52.0)]),
        ]);
        let stats = descriptive_statistics(&table).unwrap();

        assert_eq!(stats[0].latest, None);
        assert_eq!(stats[0].observations, 2);
        assert_eq!(stats[1].latest, Some(52.0));
    }

    #[test]
    fn all_missing_column_yields_undefined_statistics_without_aborting() {
        let table = table_from(vec![
            ("A", vec![None, None, None]),
            ("B", vec![Some(50.0), Some(51.0), Some(52.0)]),
        ]);
        let stats = descriptive_statistics(&table).unwrap();

        let a = &stats[0];
        assert_eq!(a.observations, 0);
        assert_eq!(a.mean, None);
        assert_eq!(a.median, None);
        assert_eq!(a.std_dev, None);
        assert_eq!(a.min, None);
        assert_eq!(a.max, None);
        assert_eq!(a.latest, None);

        assert!((stats[1].mean.unwrap() - 51.0).abs() < TOL);
    }

    #[test]
    fn empty_table_is_insufficient_data() {
        let series = PriceSeries::new("A", Vec::new());
        let table = PriceTable::from_series(&[series]).unwrap();
        assert!(descriptive_statistics(&table).is_err());
    }

    #[test]
    fn daily_returns_bridge_missing_entries() {
        let returns = daily_returns(&[Some(100.0), None, Some(110.0), Some(99.0)]);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.1).abs() < TOL);
        assert!((returns[1] - (-0.1)).abs() < TOL);
    }

    #[test]
    fn normalization_rebases_the_first_observation_to_100() {
        let normalized = normalized_base_100(&[None, Some(50.0), Some(55.0), None]);
        assert_eq!(normalized[0], None);
        assert!((normalized[1].unwrap() - 100.0).abs() < TOL);
        assert!((normalized[2].unwrap() - 110.0).abs() < TOL);
        assert_eq!(normalized[3], None);

        assert_eq!(normalized_base_100(&[None, None]), vec![None, None]);
    }
}
