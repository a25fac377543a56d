mod alert;
mod price_point;
mod quote;
mod range;
mod symbol;

pub use alert::ChangeAlert;
pub use price_point::{PricePoint, PriceSeries};
pub use quote::{LiveQuote, PriceUpdate};
pub use range::DateRange;
pub use symbol::{Symbol, SymbolListError, TrackedSymbols};
