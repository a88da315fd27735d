pub mod ingestion;
pub mod table;

pub use ingestion::{fetch_price_table, AlphaVantageClient, ClosePriceProvider};
pub use table::{PriceSeries, PriceTable};
