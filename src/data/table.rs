use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A cleaned closing-price history for a single ticker.
///
/// Construction normalizes the raw provider output so the rest of the
/// pipeline can rely on the series invariants:
/// * dates strictly increasing, no duplicates (first occurrence wins)
/// * every retained price is finite and strictly positive
///
/// Non-positive or non-finite prices are dropped here; they show up as
/// missing entries once the series is joined into a [`PriceTable`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<(NaiveDate, f64)>,
}

impl PriceSeries {
    /// Builds a normalized series from raw (date, close) observations.
    ///
    /// # Arguments
    /// * `symbol`: The ticker symbol this series belongs to
    /// * `points`: Raw observations in any order, possibly with duplicates
    pub fn new(symbol: impl Into<String>, mut points: Vec<(NaiveDate, f64)>) -> Self {
        points.retain(|(_, price)| price.is_finite() && *price > 0.0);
        points.sort_by_key(|(date, _)| *date);
        points.dedup_by_key(|(date, _)| *date);
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Closing prices for a set of tickers aligned on a shared date axis.
///
/// The axis is the outer join of every series' dates in ascending order:
/// a date observed for any ticker appears as a row, and tickers without an
/// observation on that date hold `None`. Columns keep the insertion order
/// of the series they were built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

impl PriceTable {
    /// Outer-joins a set of price series into an aligned table.
    ///
    /// # Arguments
    /// * `series`: One normalized series per ticker, in display order
    ///
    /// # Errors
    /// Returns an error when `series` is empty; a single series is legal
    /// and produces a one-column table.
    pub fn from_series(series: &[PriceSeries]) -> Result<Self> {
        if series.is_empty() {
            bail!("cannot build a price table without any series");
        }

        let mut axis: BTreeSet<NaiveDate> = BTreeSet::new();
        for s in series {
            axis.extend(s.points.iter().map(|(date, _)| *date));
        }
        let dates: Vec<NaiveDate> = axis.into_iter().collect();

        let mut tickers = Vec::with_capacity(series.len());
        let mut columns = Vec::with_capacity(series.len());
        for s in series {
            let mut column = vec![None; dates.len()];
            for (date, price) in &s.points {
                if let Ok(row) = dates.binary_search(date) {
                    column[row] = Some(*price);
                }
            }
            tickers.push(s.symbol.clone());
            columns.push(column);
        }

        Ok(Self {
            dates,
            tickers,
            columns,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn num_tickers(&self) -> usize {
        self.tickers.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    /// Returns the aligned column for the ticker at `index`.
    pub fn column(&self, index: usize) -> &[Option<f64>] {
        &self.columns[index]
    }

    /// Number of non-missing observations in one column.
    pub fn observation_count(&self, index: usize) -> usize {
        self.columns[index].iter().filter(|v| v.is_some()).count()
    }

    /// First and last date with a non-missing observation for one column.
    pub fn observed_range(&self, index: usize) -> Option<(NaiveDate, NaiveDate)> {
        let column = &self.columns[index];
        let first = column.iter().position(|v| v.is_some())?;
        let last = column.iter().rposition(|v| v.is_some())?;
        Some((self.dates[first], self.dates[last]))
    }

    /// Formats the first `n` rows as a fixed-width preview for the console.
    pub fn head(&self, n: usize) -> String {
        let mut out = String::new();
        out.push_str(&format!("{:<12}", "Date"));
        for ticker in &self.tickers {
            out.push_str(&format!("{:>16}", ticker));
        }
        out.push('\n');
        for (row, date) in self.dates.iter().take(n).enumerate() {
            out.push_str(&format!("{:<12}", date.format("%Y-%m-%d")));
            for column in &self.columns {
                match column[row] {
                    Some(price) => out.push_str(&format!("{:>16.2}", price)),
                    None => out.push_str(&format!("{:>16}", "-")),
                }
            }
            out.push('\n');
        }
        out
    }
}
