pub(crate) mod alerts;
pub(crate) mod health;
pub(crate) mod live;
pub(crate) mod prices;
pub(crate) mod symbols;
pub(crate) mod trends;
pub(crate) mod ws;

use serde::Deserialize;

/// `?start_date=YYYY-MM-DD&end_date=YYYY-MM-DD`, both optional.
#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}
