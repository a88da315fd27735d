mod analysis;
mod data;
mod report;

use analysis::{classify, correlation_matrix, descriptive_statistics, TickerStats};
use data::{fetch_price_table, AlphaVantageClient};
use dotenv::dotenv;
use report::{default_chart_path, default_report_path, render_charts, write_report, ChartStyle};
use tracing::error;

/// Tickers to analyze, in report column order.
const TICKERS: &[&str] = &["MAHSCOOTER.NS", "BAJAJHLDNG.NS"];

/// Lookback period for the price history.
const LOOKBACK: &str = "5y";

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "n/a".to_string(),
    }
}

/// Prints per-ticker descriptive statistics to the console.
fn print_statistics(stats: &[TickerStats]) {
    println!("\nDescriptive Statistics:");
    for row in stats {
        println!("\n{}:", row.symbol);
        println!("  Observations: {}", row.observations);
        println!("  Mean: {}", fmt_opt(row.mean));
        println!("  Median: {}", fmt_opt(row.median));
        println!("  Std Dev: {}", fmt_opt(row.std_dev));
        println!("  Min: {}", fmt_opt(row.min));
        println!("  Max: {}", fmt_opt(row.max));
        println!("  Current Price: {}", fmt_opt(row.latest));
    }
}

/// Runs the full pipeline: fetch, compute, report, charts.
///
/// Each stage catches its own failures and prints a diagnostic. A failed
/// fetch or computation stops the run; a failed export only skips that
/// export, so the other one still gets its chance.
async fn run_pipeline() {
    let client = match AlphaVantageClient::new() {
        Ok(client) => client,
        Err(e) => {
            error!("configuration error: {:#}", e);
            println!("\nFailed to initialize the market data client. Exiting.");
            return;
        }
    };

    let table = match fetch_price_table(&client, TICKERS, LOOKBACK).await {
        Ok(table) => table,
        Err(e) => {
            error!("acquisition failed: {:#}", e);
            println!("\nFailed to fetch stock data. Exiting.");
            return;
        }
    };

    println!("Stock Data (Closing Prices):");
    println!("{}", table.head(5));

    let computed = correlation_matrix(&table)
        .and_then(|matrix| descriptive_statistics(&table).map(|stats| (matrix, stats)));
    let (matrix, stats) = match computed {
        Ok(result) => result,
        Err(e) => {
            error!("computation failed: {:#}", e);
            println!("\nFailed to calculate correlation. Exiting.");
            return;
        }
    };

    println!("\nCorrelation Matrix:");
    println!("{}", matrix.to_display_string());

    match matrix.primary_pair() {
        Some(r) => {
            println!(
                "Correlation Coefficient between {} and {}: {:.4}",
                matrix.tickers()[0],
                matrix.tickers()[1],
                r
            );
            println!("Interpretation: {}", classify(r));
        }
        None => println!("Warning: Cannot calculate correlation - insufficient data"),
    }

    print_statistics(&stats);
    println!();

    let report_path = default_report_path();
    match write_report(&report_path, &table, &matrix, &stats) {
        Ok(()) => println!("✓ Report written to {}", report_path.display()),
        Err(e) => error!("spreadsheet export failed: {:#}", e),
    }

    let chart_path = default_chart_path();
    match render_charts(&chart_path, &table, &matrix, &ChartStyle::default()) {
        Ok(()) => println!("✓ Charts written to {}", chart_path.display()),
        Err(e) => error!("chart export failed: {:#}", e),
    }
}

/// Entry point. Initializes logging and configuration, then races the
/// pipeline against a user interrupt. The process exits 0 either way;
/// failures are reported as diagnostics, not exit codes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenv().ok();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("\n\nProcess interrupted by user.");
        }
        _ = run_pipeline() => {}
    }

    Ok(())
}
