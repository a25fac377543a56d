pub mod broadcast;
pub mod change_detector;
pub mod freshness_cache;
pub mod price_service;
pub mod rate_limiter;
