use crate::analysis::{daily_returns, normalized_base_100, rolling_correlation, CorrelationMatrix, ROLLING_WINDOW};
use crate::data::PriceTable;
use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::{Path, PathBuf};
use tracing::info;

/// Presentation settings for the chart image, passed in explicitly
/// instead of living in process-wide state.
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub palette: Vec<RGBColor>,
    pub histogram_bins: usize,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 1400,
            palette: vec![
                RGBColor(31, 119, 180),
                RGBColor(255, 127, 14),
                RGBColor(44, 160, 44),
                RGBColor(214, 39, 40),
                RGBColor(148, 103, 189),
                RGBColor(140, 86, 75),
            ],
            histogram_bins: 40,
        }
    }
}

impl ChartStyle {
    fn color(&self, index: usize) -> RGBColor {
        self.palette[index % self.palette.len()]
    }
}

type Panel<'b> = DrawingArea<BitMapBackend<'b>, Shift>;

/// Default chart filename, stamped with the local time of the run.
pub fn default_chart_path() -> PathBuf {
    PathBuf::from(format!(
        "correlation_charts_{}.png",
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Renders the six-panel analysis image.
///
/// Panels: closing prices, base-100 performance, annotated correlation
/// heatmap, daily-return histograms, price scatter of the first two
/// tickers, and their rolling correlation. With fewer than two tickers
/// the pair panels show a placeholder instead of indexing a second
/// column.
pub fn render_charts(
    path: &Path,
    table: &PriceTable,
    matrix: &CorrelationMatrix,
    style: &ChartStyle,
) -> Result<()> {
    if table.num_rows() == 0 {
        bail!("insufficient data: nothing to plot");
    }

    let root = BitMapBackend::new(path, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((3, 2));

    draw_price_lines(&panels[0], table, style)?;
    draw_normalized_performance(&panels[1], table, style)?;
    draw_heatmap(&panels[2], matrix)?;
    draw_return_histograms(&panels[3], table, style)?;
    draw_pair_scatter(&panels[4], table, matrix, style)?;
    draw_rolling_correlation(&panels[5], table, style)?;

    root.present()?;
    info!("charts written to {}", path.display());
    Ok(())
}

fn placeholder(panel: &Panel, message: &str) -> Result<()> {
    let (w, h) = panel.dim_in_pixel();
    let style = TextStyle::from(("sans-serif", 18).into_font())
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));
    panel.draw(&Text::new(
        message.to_string(),
        (w as i32 / 2, h as i32 / 2),
        style,
    ))?;
    Ok(())
}

fn date_span(dates: &[NaiveDate]) -> Option<(NaiveDate, NaiveDate)> {
    let first = *dates.first()?;
    let last = *dates.last()?;
    (first < last).then_some((first, last))
}

fn padded(min: f64, max: f64) -> (f64, f64) {
    let pad = ((max - min) * 0.05).max(1e-6);
    (min - pad, max + pad)
}

fn value_bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn draw_price_lines(panel: &Panel, table: &PriceTable, style: &ChartStyle) -> Result<()> {
    let Some((first, last)) = date_span(table.dates()) else {
        return placeholder(panel, "not enough observations for a price chart");
    };
    let all_values = (0..table.num_tickers()).flat_map(|i| table.column(i).iter().filter_map(|v| *v));
    let Some((lo, hi)) = value_bounds(all_values) else {
        return placeholder(panel, "no price observations");
    };
    let (lo, hi) = padded(lo, hi);

    let mut chart = ChartBuilder::on(panel)
        .caption("Closing Prices", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(first..last, lo..hi)?;
    chart
        .configure_mesh()
        .x_labels(6)
        .x_label_formatter(&|d| d.format("%Y-%m").to_string())
        .draw()?;

    for (i, ticker) in table.tickers().iter().enumerate() {
        let color = style.color(i);
        let points = table
            .dates()
            .iter()
            .zip(table.column(i))
            .filter_map(|(date, value)| value.map(|v| (*date, v)));
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))?
            .label(ticker.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color.stroke_width(2)));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_normalized_performance(panel: &Panel, table: &PriceTable, style: &ChartStyle) -> Result<()> {
    let Some((first, last)) = date_span(table.dates()) else {
        return placeholder(panel, "not enough observations for a performance chart");
    };
    let normalized: Vec<Vec<Option<f64>>> = (0..table.num_tickers())
        .map(|i| normalized_base_100(table.column(i)))
        .collect();
    let Some((lo, hi)) = value_bounds(normalized.iter().flatten().filter_map(|v| *v)) else {
        return placeholder(panel, "no price observations");
    };
    let (lo, hi) = padded(lo, hi);

    let mut chart = ChartBuilder::on(panel)
        .caption("Performance (base 100)", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(first..last, lo..hi)?;
    chart
        .configure_mesh()
        .x_labels(6)
        .x_label_formatter(&|d| d.format("%Y-%m").to_string())
        .draw()?;

    for (i, ticker) in table.tickers().iter().enumerate() {
        let color = style.color(i);
        let points = table
            .dates()
            .iter()
            .zip(&normalized[i])
            .filter_map(|(date, value)| value.map(|v| (*date, v)));
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))?
            .label(ticker.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color.stroke_width(2)));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Diverging red/blue fill for a correlation value in [-1, 1].
fn heatmap_color(value: f64) -> RGBColor {
    let t = value.clamp(-1.0, 1.0);
    let lerp = |a: u8, b: u8, t: f64| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    if t >= 0.0 {
        RGBColor(lerp(255, 33, t), lerp(255, 102, t), lerp(255, 172, t))
    } else {
        let t = -t;
        RGBColor(lerp(255, 178, t), lerp(255, 24, t), lerp(255, 43, t))
    }
}

fn draw_heatmap(panel: &Panel, matrix: &CorrelationMatrix) -> Result<()> {
    let n = matrix.tickers().len();
    if n == 0 {
        return placeholder(panel, "no tickers to correlate");
    }

    let mut chart = ChartBuilder::on(panel)
        .caption("Correlation Heatmap", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(90)
        .build_cartesian_2d(0.0..n as f64, 0.0..n as f64)?;
    let tickers = matrix.tickers().to_vec();
    let x_tickers = tickers.clone();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&move |v: &f64| {
            x_tickers.get(*v as usize).cloned().unwrap_or_default()
        })
        .y_label_formatter(&move |v: &f64| tickers.get(*v as usize).cloned().unwrap_or_default())
        .draw()?;

    chart.draw_series((0..n).flat_map(|row| {
        (0..n).map(move |col| {
            let fill = match matrix.get(row, col) {
                Some(value) => heatmap_color(value).filled(),
                None => RGBColor(230, 230, 230).filled(),
            };
            Rectangle::new(
                [
                    (col as f64, row as f64),
                    (col as f64 + 1.0, row as f64 + 1.0),
                ],
                fill,
            )
        })
    }))?;

    fn annotation(value: Option<f64>) -> String {
        match value {
            Some(v) => format!("{:.2}", v),
            None => "n/a".to_string(),
        }
    }
    chart.draw_series((0..n).flat_map(|row| {
        (0..n).map(move |col| {
            let value = matrix.get(row, col);
            let dark_cell = value.map(|v| v.abs() > 0.6).unwrap_or(false);
            let color = if dark_cell { &WHITE } else { &BLACK };
            let style = TextStyle::from(("sans-serif", 16).into_font())
                .color(color)
                .pos(Pos::new(HPos::Center, VPos::Center));
            Text::new(
                annotation(value),
                (col as f64 + 0.5, row as f64 + 0.5),
                style,
            )
        })
    }))?;
    Ok(())
}

fn draw_return_histograms(panel: &Panel, table: &PriceTable, style: &ChartStyle) -> Result<()> {
    let returns: Vec<Vec<f64>> = (0..table.num_tickers())
        .map(|i| daily_returns(table.column(i)))
        .collect();
    let Some((lo, hi)) = value_bounds(returns.iter().flatten().copied()) else {
        return placeholder(panel, "not enough observations for returns");
    };
    let (lo, hi) = padded(lo, hi);
    let bins = style.histogram_bins.max(1);
    let bin_width = (hi - lo) / bins as f64;

    let mut counts = vec![vec![0usize; bins]; returns.len()];
    for (i, series) in returns.iter().enumerate() {
        for &r in series {
            let bin = (((r - lo) / bin_width) as usize).min(bins - 1);
            counts[i][bin] += 1;
        }
    }
    let max_count = counts.iter().flatten().copied().max().unwrap_or(0);
    if max_count == 0 {
        return placeholder(panel, "not enough observations for returns");
    }

    let mut chart = ChartBuilder::on(panel)
        .caption("Daily Returns", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(lo..hi, 0.0..(max_count as f64 * 1.05))?;
    chart
        .configure_mesh()
        .x_label_formatter(&|v| format!("{:.1}%", v * 100.0))
        .draw()?;

    for (i, ticker) in table.tickers().iter().enumerate() {
        let color = style.color(i);
        chart
            .draw_series(counts[i].iter().enumerate().filter(|(_, c)| **c > 0).map(
                move |(bin, count)| {
                    let x0 = lo + bin as f64 * bin_width;
                    Rectangle::new(
                        [(x0, 0.0), (x0 + bin_width, *count as f64)],
                        color.mix(0.45).filled(),
                    )
                },
            ))?
            .label(ticker.as_str())
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.mix(0.45).filled())
            });
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_pair_scatter(
    panel: &Panel,
    table: &PriceTable,
    matrix: &CorrelationMatrix,
    style: &ChartStyle,
) -> Result<()> {
    if table.num_tickers() < 2 {
        return placeholder(panel, "scatter needs two tickers");
    }
    let pairs: Vec<(f64, f64)> = table
        .column(0)
        .iter()
        .zip(table.column(1))
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.is_empty() {
        return placeholder(panel, "no overlapping observations to scatter");
    }

    let (x_lo, x_hi) = value_bounds(pairs.iter().map(|(a, _)| *a))
        .map(|(lo, hi)| padded(lo, hi))
        .unwrap_or((0.0, 1.0));
    let (y_lo, y_hi) = value_bounds(pairs.iter().map(|(_, b)| *b))
        .map(|(lo, hi)| padded(lo, hi))
        .unwrap_or((0.0, 1.0));

    let caption = match matrix.primary_pair() {
        Some(r) => format!(
            "{} vs {} (r = {:.4})",
            table.tickers()[0],
            table.tickers()[1],
            r
        ),
        None => format!(
            "{} vs {} (r undefined)",
            table.tickers()[0],
            table.tickers()[1]
        ),
    };

    let mut chart = ChartBuilder::on(panel)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;
    chart.configure_mesh().draw()?;

    let color = style.color(0);
    chart.draw_series(
        pairs
            .iter()
            .map(|(a, b)| Circle::new((*a, *b), 3, color.mix(0.6).filled())),
    )?;
    Ok(())
}

fn draw_rolling_correlation(panel: &Panel, table: &PriceTable, style: &ChartStyle) -> Result<()> {
    if table.num_tickers() < 2 {
        return placeholder(panel, "rolling correlation needs two tickers");
    }
    let series = rolling_correlation(table, 0, 1, ROLLING_WINDOW);
    let Some((first, last)) = date_span(&series.iter().map(|(d, _)| *d).collect::<Vec<_>>()) else {
        return placeholder(
            panel,
            "not enough overlapping observations for a rolling window",
        );
    };

    let mut chart = ChartBuilder::on(panel)
        .caption(
            format!("{}-day Rolling Correlation", ROLLING_WINDOW),
            ("sans-serif", 20),
        )
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(first..last, -1.1..1.1)?;
    chart
        .configure_mesh()
        .x_labels(6)
        .x_label_formatter(&|d| d.format("%Y-%m").to_string())
        .draw()?;

    chart.draw_series(LineSeries::new(
        series.iter().copied(),
        style.color(3).stroke_width(2),
    ))?;
    // Zero line for orientation.
    chart.draw_series(LineSeries::new(
        vec![(first, 0.0), (last, 0.0)],
        BLACK.mix(0.3),
    ))?;
    Ok(())
}
