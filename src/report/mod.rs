pub mod charts;
pub mod spreadsheet;

pub use charts::{default_chart_path, render_charts, ChartStyle};
pub use spreadsheet::{default_report_path, write_report};
