use super::table::{PriceSeries, PriceTable};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDate};
use std::env;
use tracing::{debug, info, warn};

/// Source of daily closing prices for a single ticker.
///
/// This is the seam between the pipeline and the market-data provider:
/// production code talks to Alpha Vantage through [`AlphaVantageClient`],
/// tests substitute an in-memory implementation.
#[async_trait]
pub trait ClosePriceProvider {
    /// Fetches the full daily close history for `symbol`. Callers must not
    /// rely on the order of the returned observations.
    async fn fetch_daily_closes(&self, symbol: &str) -> Result<Vec<(NaiveDate, f64)>>;
}

/// Alpha Vantage client for daily equity closing prices.
///
/// Handles API authentication, request generation, and response parsing
/// for the `TIME_SERIES_DAILY` endpoint. The API key is read from the
/// `ALPHA_VANTAGE_API_KEY` environment variable.
pub struct AlphaVantageClient {
    api_key: String,
    client: reqwest::Client,
}

impl AlphaVantageClient {
    /// Creates a new client with credentials from the environment.
    ///
    /// # Errors
    /// Returns an error if `ALPHA_VANTAGE_API_KEY` is not set.
    pub fn new() -> Result<Self> {
        let api_key = env::var("ALPHA_VANTAGE_API_KEY")
            .context("ALPHA_VANTAGE_API_KEY must be set in environment")?;

        Ok(Self {
            api_key,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl ClosePriceProvider for AlphaVantageClient {
    async fn fetch_daily_closes(&self, symbol: &str) -> Result<Vec<(NaiveDate, f64)>> {
        let url = format!(
            "https://www.alphavantage.co/query?function=TIME_SERIES_DAILY&symbol={}&outputsize=full&apikey={}",
            symbol, self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        if let Some(error_message) = response.get("Error Message") {
            bail!(
                "Alpha Vantage API error for {}: {}",
                symbol,
                error_message.as_str().unwrap_or("Unknown error")
            );
        }

        // "Note" is a soft warning (usually rate limiting); keep going.
        if let Some(note) = response.get("Note") {
            warn!("Alpha Vantage API note: {}", note.as_str().unwrap_or(""));
        }

        let time_series = match response.get("Time Series (Daily)") {
            Some(ts) => ts
                .as_object()
                .ok_or_else(|| anyhow!("invalid response format: time series is not an object"))?,
            None => {
                debug!("API response without time series: {:#?}", response);

                if let Some(info) = response.get("Information") {
                    bail!(
                        "API information: {}",
                        info.as_str().unwrap_or("Unknown information message")
                    );
                }

                bail!(
                    "time series data not found for {}. This could be due to an invalid API key, rate limiting, or an invalid symbol.",
                    symbol
                );
            }
        };

        let mut closes = Vec::with_capacity(time_series.len());

        for (date_str, entry) in time_series {
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .map_err(|e| anyhow!("invalid date {} in response: {}", date_str, e))?;

            let close: f64 = entry
                .get("4. close")
                .ok_or_else(|| anyhow!("close price not found for {} on {}", symbol, date_str))?
                .as_str()
                .ok_or_else(|| anyhow!("close price is not a string"))?
                .parse()?;

            closes.push((date, close));
        }

        if closes.is_empty() {
            bail!("no market data returned for {}", symbol);
        }

        Ok(closes)
    }
}

/// Resolves a lookback period string to its start date.
///
/// Supported periods: `1d`, `5d`, `1mo`, `3mo`, `6mo`, `1y`, `2y`, `5y`,
/// `10y`, `ytd`, `max`.
pub fn period_start(period: &str, today: NaiveDate) -> Result<NaiveDate> {
    let start = match period {
        "1d" => today - Duration::days(1),
        "5d" => today - Duration::days(5),
        "1mo" => today - Duration::days(30),
        "3mo" => today - Duration::days(90),
        "6mo" => today - Duration::days(180),
        "1y" => today - Duration::days(365),
        "2y" => today - Duration::days(730),
        "5y" => today - Duration::days(1825),
        "10y" => today - Duration::days(3650),
        "ytd" => NaiveDate::from_ymd_opt(today.year(), 1, 1)
            .ok_or_else(|| anyhow!("invalid year {}", today.year()))?,
        "max" => today - Duration::days(36500),
        other => bail!("invalid lookback period: {}", other),
    };
    Ok(start)
}

/// Fetches closing prices for every ticker and aligns them into a table.
///
/// Tickers are fetched strictly one after another. A ticker whose fetch
/// fails, or that has no observations inside the lookback window, is
/// dropped from the table with a warning; the run only fails when no
/// ticker produced data at all.
///
/// # Arguments
/// * `provider`: The market-data source
/// * `tickers`: Symbols in the column order the table should keep
/// * `period`: Lookback period string, e.g. `"5y"`
///
/// # Errors
/// Returns an error for an unknown period string or when no data could be
/// retrieved for any ticker.
pub async fn fetch_price_table<P>(
    provider: &P,
    tickers: &[&str],
    period: &str,
) -> Result<PriceTable>
where
    P: ClosePriceProvider + ?Sized,
{
    let today = Local::now().date_naive();
    let start = period_start(period, today)?;

    println!("Fetching {} data for: {}", period, tickers.join(", "));

    let mut series = Vec::with_capacity(tickers.len());
    for &symbol in tickers {
        match provider.fetch_daily_closes(symbol).await {
            Ok(closes) => {
                let windowed: Vec<(NaiveDate, f64)> = closes
                    .into_iter()
                    .filter(|(date, _)| *date >= start)
                    .collect();
                let normalized = PriceSeries::new(symbol, windowed);
                if normalized.is_empty() {
                    warn!("no observations for {} within the last {}", symbol, period);
                } else {
                    info!(
                        "fetched {} observations for {}",
                        normalized.points.len(),
                        symbol
                    );
                    series.push(normalized);
                }
            }
            Err(e) => warn!("failed to fetch {}: {:#}", symbol, e),
        }
    }

    if series.is_empty() {
        bail!("no data retrieved, please check ticker symbols");
    }
    if series.len() < tickers.len() {
        warn!(
            "data available for only {} of {} tickers",
            series.len(),
            tickers.len()
        );
    }

    let table = PriceTable::from_series(&series)?;
    println!("✓ Data fetched successfully\n");
    Ok(table)
}
