use crate::analysis::{CorrelationMatrix, TickerStats};
use crate::data::PriceTable;
use anyhow::Result;
use chrono::Local;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::path::{Path, PathBuf};
use tracing::info;

/// Default report filename, stamped with the local time of the run.
pub fn default_report_path() -> PathBuf {
    PathBuf::from(format!(
        "correlation_report_{}.xlsx",
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Writes the four-sheet spreadsheet report.
///
/// Sheets: raw prices, correlation matrix, per-ticker statistics, and a
/// one-row-per-ticker summary. Missing prices and undefined correlations
/// are left as blank cells.
///
/// # Arguments
/// * `path`: Output file location
/// * `table`: Aligned closing prices
/// * `matrix`: Pairwise correlations
/// * `stats`: One statistics row per ticker, in table column order
pub fn write_report(
    path: &Path,
    table: &PriceTable,
    matrix: &CorrelationMatrix,
    stats: &[TickerStats],
) -> Result<()> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    write_prices_sheet(workbook.add_worksheet(), table, &bold)?;
    write_correlation_sheet(workbook.add_worksheet(), matrix, &bold)?;
    write_statistics_sheet(workbook.add_worksheet(), stats, &bold)?;
    write_summary_sheet(workbook.add_worksheet(), stats, &bold)?;

    workbook.save(path)?;
    info!("spreadsheet report written to {}", path.display());
    Ok(())
}

fn write_prices_sheet(sheet: &mut Worksheet, table: &PriceTable, bold: &Format) -> Result<()> {
    sheet.set_name("Prices")?;
    sheet.write_string_with_format(0, 0, "Date", bold)?;
    for (col, ticker) in table.tickers().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16 + 1, ticker.as_str(), bold)?;
    }

    for (row, date) in table.dates().iter().enumerate() {
        let row = row as u32 + 1;
        sheet.write_string(row, 0, date.format("%Y-%m-%d").to_string())?;
        for col in 0..table.num_tickers() {
            if let Some(price) = table.column(col)[row as usize - 1] {
                sheet.write_number(row, col as u16 + 1, price)?;
            }
        }
    }
    sheet.set_column_width(0, 12.0)?;
    Ok(())
}

fn write_correlation_sheet(
    sheet: &mut Worksheet,
    matrix: &CorrelationMatrix,
    bold: &Format,
) -> Result<()> {
    sheet.set_name("Correlation")?;
    for (i, ticker) in matrix.tickers().iter().enumerate() {
        sheet.write_string_with_format(0, i as u16 + 1, ticker.as_str(), bold)?;
        sheet.write_string_with_format(i as u32 + 1, 0, ticker.as_str(), bold)?;
    }
    for row in 0..matrix.tickers().len() {
        for col in 0..matrix.tickers().len() {
            if let Some(value) = matrix.get(row, col) {
                sheet.write_number(row as u32 + 1, col as u16 + 1, value)?;
            }
        }
    }
    sheet.set_column_width(0, 16.0)?;
    Ok(())
}

fn write_statistics_sheet(
    sheet: &mut Worksheet,
    stats: &[TickerStats],
    bold: &Format,
) -> Result<()> {
    sheet.set_name("Statistics")?;
    let headers = [
        "Ticker",
        "Mean",
        "Median",
        "Std Dev",
        "Min",
        "Max",
        "Current Price",
    ];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, bold)?;
    }

    for (i, row) in stats.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, row.symbol.as_str())?;
        let measures = [row.mean, row.median, row.std_dev, row.min, row.max, row.latest];
        for (col, measure) in measures.iter().enumerate() {
            if let Some(value) = measure {
                sheet.write_number(r, col as u16 + 1, *value)?;
            }
        }
    }
    sheet.set_column_width(0, 16.0)?;
    Ok(())
}

fn write_summary_sheet(sheet: &mut Worksheet, stats: &[TickerStats], bold: &Format) -> Result<()> {
    sheet.set_name("Summary")?;
    for (col, header) in ["Ticker", "Observations", "Date Range"].iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, bold)?;
    }

    for (i, row) in stats.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, row.symbol.as_str())?;
        sheet.write_number(r, 1, row.observations as f64)?;
        let range = match (row.first_date, row.last_date) {
            (Some(first), Some(last)) => {
                format!("{} to {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d"))
            }
            _ => "no observations".to_string(),
        };
        sheet.write_string(r, 2, range)?;
    }
    sheet.set_column_width(0, 16.0)?;
    sheet.set_column_width(2, 26.0)?;
    Ok(())
}
