//! Background jobs.
//!
//! - `live_quote_job` - polls the live-quote provider for every tracked
//!   symbol on a fixed period, refreshes the cache and pushes updates to
//!   subscribers

pub mod live_quote_job;
