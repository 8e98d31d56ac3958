pub mod provider;
pub mod types;
pub mod yahoo;

pub use provider::MarketDataProvider;
