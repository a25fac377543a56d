pub mod marketstack;
pub mod price_provider;
pub mod yahoofinance;
