use crate::data::PriceTable;
use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Window length for the rolling correlation panel, in trading days.
pub const ROLLING_WINDOW: usize = 30;

/// Pairwise Pearson correlations between the tickers of a price table.
///
/// The matrix is square and symmetric. A cell is `None` when the
/// correlation is undefined: fewer than two overlapping observations for
/// an off-diagonal pair, or fewer than two observations for a diagonal
/// entry. Defined diagonal entries are exactly 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    tickers: Vec<String>,
    cells: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Correlation between the first two tickers, when both exist and the
    /// value is defined. This is the headline number of the report.
    pub fn primary_pair(&self) -> Option<f64> {
        if self.tickers.len() < 2 {
            return None;
        }
        self.get(0, 1)
    }

    /// Formats the matrix as an aligned grid for the console, with `n/a`
    /// for undefined entries.
    pub fn to_display_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{:<16}", ""));
        for ticker in &self.tickers {
            out.push_str(&format!("{:>16}", ticker));
        }
        out.push('\n');
        for (row, ticker) in self.tickers.iter().enumerate() {
            out.push_str(&format!("{:<16}", ticker));
            for col in 0..self.tickers.len() {
                match self.get(row, col) {
                    Some(value) => out.push_str(&format!("{:>16.6}", value)),
                    None => out.push_str(&format!("{:>16}", "n/a")),
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Pearson correlation coefficient over paired observations.
///
/// Undefined (`None`) for fewer than two pairs or when either side has
/// zero variance. The result is clamped to [-1, 1] to absorb rounding.
pub(crate) fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return None;
    }

    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

/// Rows where both columns have a value, as (x, y) pairs.
fn paired(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<(f64, f64)> {
    a.iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect()
}

/// Computes the pairwise correlation matrix of a price table.
///
/// Every unordered ticker pair is correlated over the dates where both
/// series have a value (pairwise-complete observations). Other tickers'
/// missing entries do not shrink a pair's sample; this deliberately
/// differs from dropping every row that has any hole in it.
///
/// # Errors
/// Returns an "insufficient data" error when the table has no rows.
pub fn correlation_matrix(table: &PriceTable) -> Result<CorrelationMatrix> {
    if table.num_rows() == 0 {
        bail!("insufficient data: price table has no rows");
    }

    let n = table.num_tickers();
    let mut cells = vec![vec![None; n]; n];

    for i in 0..n {
        if table.observation_count(i) >= 2 {
            cells[i][i] = Some(1.0);
        }
        for j in (i + 1)..n {
            let r = pearson(&paired(table.column(i), table.column(j)));
            cells[i][j] = r;
            cells[j][i] = r;
        }
    }

    Ok(CorrelationMatrix {
        tickers: table.tickers().to_vec(),
        cells,
    })
}

/// Rolling correlation between two columns of the table.
///
/// The window slides over the pairwise-complete observations of the two
/// tickers, one observation at a time; each point is stamped with the
/// date of the newest observation in its window. Windows whose
/// correlation is undefined are skipped.
pub fn rolling_correlation(
    table: &PriceTable,
    first: usize,
    second: usize,
    window: usize,
) -> Vec<(NaiveDate, f64)> {
    let observations: Vec<(NaiveDate, f64, f64)> = table
        .dates()
        .iter()
        .zip(table.column(first).iter().zip(table.column(second)))
        .filter_map(|(date, (x, y))| Some((*date, (*x)?, (*y)?)))
        .collect();

    if window < 2 || observations.len() < window {
        return Vec::new();
    }

    observations
        .windows(window)
        .filter_map(|w| {
            let pairs: Vec<(f64, f64)> = w.iter().map(|(_, x, y)| (*x, *y)).collect();
            let date = w[window - 1].0;
            pearson(&pairs).map(|r| (date, r))
        })
        .collect()
}

/// Strength bands for interpreting a correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationBand {
    StrongPositive,
    ModeratePositive,
    WeakOrNone,
    ModerateNegative,
    StrongNegative,
}

impl fmt::Display for CorrelationBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CorrelationBand::StrongPositive => "Strong Positive",
            CorrelationBand::ModeratePositive => "Moderate Positive",
            CorrelationBand::WeakOrNone => "Weak/No Correlation",
            CorrelationBand::ModerateNegative => "Moderate Negative",
            CorrelationBand::StrongNegative => "Strong Negative",
        };
        f.write_str(label)
    }
}

/// Classifies a correlation value into a strength band.
///
/// The comparisons are strict, so boundary values fall into the band of
/// lower magnitude: 0.7 is Weak/No Correlation, -0.7 is Strong Negative.
pub fn classify(value: f64) -> CorrelationBand {
    if value > 0.7 {
        CorrelationBand::StrongPositive
    } else if value > 0.3 {
        CorrelationBand::ModeratePositive
    } else if value > -0.3 {
        CorrelationBand::WeakOrNone
    } else if value > -0.7 {
        CorrelationBand::ModerateNegative
    } else {
        CorrelationBand::StrongNegative
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceSeries;

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
                    .filter_map(|(i, v)| {
                        v.map(|price| (base + chrono::Duration::days(i as i64), price))
                    })
                    .collect();
                PriceSeries::new(symbol, points)
            })
            .collect();
        PriceTable::from_series(&series).unwrap()
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let table = table_from(vec![
            ("A", vec![Some(100.0), Some(102.0), Some(104.0), Some(103.0)]),
            ("B", vec![Some(50.0), Some(51.0), Some(49.0), Some(52.0)]),
        ]);
        let matrix = correlation_matrix(&table).unwrap();

        assert_eq!(matrix.get(0, 0), Some(1.0));
        assert_eq!(matrix.get(1, 1), Some(1.0));
        let ab = matrix.get(0, 1).unwrap();
        let ba = matrix.get(1, 0).unwrap();
        assert!((ab - ba).abs() < TOL);
        assert!((-1.0..=1.0).contains(&ab));
    }

    #[test]
    fn identical_series_correlate_to_one() {
        let values = vec![Some(100.0), Some(102.0), Some(101.0), Some(105.0)];
        let table = table_from(vec![("A", values.clone()), ("B", values)]);
        let matrix = correlation_matrix(&table).unwrap();

        assert!((matrix.primary_pair().unwrap() - 1.0).abs() < TOL);
    }

    #[test]
    fn negated_shifted_copy_correlates_to_minus_one() {
        let a = vec![100.0, 102.0, 101.0, 105.0, 99.0];
        let b: Vec<f64> = a.iter().map(|v| -v + 300.0).collect();
        let table = table_from(vec![
            ("A", a.into_iter().map(Some).collect()),
            ("B", b.into_iter().map(Some).collect()),
        ]);
        let matrix = correlation_matrix(&table).unwrap();

        assert!((matrix.primary_pair().unwrap() - (-1.0)).abs() < TOL);
    }

    #[test]
    fn too_few_overlapping_observations_are_undefined() {
        // A and B never share more than one date.
        let table = table_from(vec![
            ("A", vec![Some(100.0), None, Some(104.0), None]),
            ("B", vec![None, Some(51.0), None, Some(52.0)]),
        ]);
        let matrix = correlation_matrix(&table).unwrap();

        assert_eq!(matrix.primary_pair(), None);
        assert_eq!(matrix.get(0, 0), Some(1.0));
    }

    #[test]
    fn pairwise_policy_uses_only_rows_where_both_are_present() {
        let table = table_from(vec![
            ("A", vec![Some(100.0), None, Some(104.0)]),
            ("B", vec![Some(50.0), Some(51.0), Some(52.0)]),
        ]);
        let matrix = correlation_matrix(&table).unwrap();

        // Two overlapping rows, both moving up, so exactly 1.0.
        assert!((matrix.primary_pair().unwrap() - 1.0).abs() < TOL);
    }

    #[test]
    fn constant_series_has_undefined_correlation() {
        let table = table_from(vec![
            ("A", vec![Some(100.0), Some(100.0), Some(100.0)]),
            ("B", vec![Some(50.0), Some(51.0), Some(52.0)]),
        ]);
        let matrix = correlation_matrix(&table).unwrap();
        assert_eq!(matrix.primary_pair(), None);
    }

    #[test]
    fn empty_table_is_insufficient_data() {
        let series = PriceSeries::new("A", Vec::new());
        let table = PriceTable::from_series(&[series]).unwrap();
        let result = correlation_matrix(&table);
        assert!(result.unwrap_err().to_string().contains("insufficient data"));
    }

    #[test]
    fn single_ticker_matrix_has_no_primary_pair() {
        let table = table_from(vec![("A", vec![Some(100.0), Some(101.0)])]);
        let matrix = correlation_matrix(&table).unwrap();
        assert_eq!(matrix.get(0, 0), Some(1.0));
        assert_eq!(matrix.primary_pair(), None);
    }

    #[test]
    fn co_moving_series_are_strongly_positive() {
        let table = table_from(vec![
            (
                "A",
                vec![Some(100.0), Some(102.0), Some(104.0), Some(103.0), Some(105.0)],
            ),
            (
                "B",
                vec![Some(50.0), Some(51.0), Some(52.0), Some(51.0), Some(53.0)],
            ),
        ]);
        let matrix = correlation_matrix(&table).unwrap();

        let r = matrix.primary_pair().unwrap();
        assert!((0.9..=1.0).contains(&r), "expected strong positive, got {}", r);
        assert_eq!(classify(r), CorrelationBand::StrongPositive);
    }

    #[test]
    fn classification_boundaries_are_strict() {
        assert_eq!(classify(0.70001), CorrelationBand::StrongPositive);
        assert_eq!(classify(0.7), CorrelationBand::ModeratePositive);
        assert_eq!(classify(0.3), CorrelationBand::WeakOrNone);
        assert_eq!(classify(0.0), CorrelationBand::WeakOrNone);
        assert_eq!(classify(-0.3), CorrelationBand::ModerateNegative);
        assert_eq!(classify(-0.69999), CorrelationBand::ModerateNegative);
        assert_eq!(classify(-0.7), CorrelationBand::StrongNegative);
        assert_eq!(classify(-1.0), CorrelationBand::StrongNegative);
    }

    #[test]
    fn band_labels_match_report_wording() {
        assert_eq!(classify(0.9).to_string(), "Strong Positive");
        assert_eq!(classify(0.0).to_string(), "Weak/No Correlation");
    }

    #[test]
    fn rolling_correlation_slides_one_observation_at_a_time() {
        let n = 40;
        let a: Vec<Option<f64>> = (0..n).map(|i| Some(100.0 + i as f64)).collect();
        let b: Vec<Option<f64>> = (0..n)
            .map(|i| Some(50.0 + (i as f64) * ((i % 2) as f64 + 0.5)))
            .collect();
        let table = table_from(vec![("A", a), ("B", b)]);

        let rolling = rolling_correlation(&table, 0, 1, 30);
        assert_eq!(rolling.len(), n - 30 + 1);
        // Each point is stamped with the newest date of its window.
        assert_eq!(rolling[0].0, date("2024-01-30"));
        for (_, r) in &rolling {
            assert!((-1.0..=1.0).contains(r));
        }
    }

    #[test]
    fn rolling_correlation_needs_a_full_window() {
        let table = table_from(vec![
            ("A", vec![Some(100.0), Some(101.0), Some(102.0)]),
            ("B", vec![Some(50.0), Some(51.0), Some(52.0)]),
        ]);
        assert!(rolling_correlation(&table, 0, 1, 30).is_empty());
    }
}
