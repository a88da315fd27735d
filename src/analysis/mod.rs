pub mod correlation;
pub mod statistics;

pub use correlation::{
    classify, correlation_matrix, rolling_correlation, CorrelationBand, CorrelationMatrix,
    ROLLING_WINDOW,
};
pub use statistics::{daily_returns, descriptive_statistics, normalized_base_100, TickerStats};
