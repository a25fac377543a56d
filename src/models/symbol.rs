use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub ticker: String,
    pub name: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum SymbolListError {
    #[error("symbol list is empty")]
    Empty,
    #[error("malformed symbol entry '{0}', expected TICKER:Name")]
    Malformed(String),
    #[error("duplicate ticker '{0}'")]
    Duplicate(String),
}

/// The process-wide set of symbols polled for live quotes.
///
/// Fixed at startup; order is preserved so listings match configuration.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedSymbols {
    symbols: Vec<Symbol>,
}

impl TrackedSymbols {
    pub fn new(symbols: Vec<Symbol>) -> Result<Self, SymbolListError> {
        if symbols.is_empty() {
            return Err(SymbolListError::Empty);
        }
        for (idx, symbol) in symbols.iter().enumerate() {
            if symbols[..idx].iter().any(|s| s.ticker == symbol.ticker) {
                return Err(SymbolListError::Duplicate(symbol.ticker.clone()));
            }
        }
        Ok(Self { symbols })
    }

    /// Parse `AAPL:Apple,MSFT:Microsoft`. A bare ticker uses itself as display name.
    pub fn parse(list: &str) -> Result<Self, SymbolListError> {
        let symbols = list
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (ticker, name) = match entry.split_once(':') {
                    Some((ticker, name)) => (ticker.trim(), name.trim()),
                    None => (entry, entry),
                };
                if ticker.is_empty() || name.is_empty() || ticker.contains(char::is_whitespace) {
                    return Err(SymbolListError::Malformed(entry.to_string()));
                }
                Ok(Symbol {
                    ticker: ticker.to_uppercase(),
                    name: name.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(symbols)
    }

    pub fn get(&self, ticker: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.ticker.eq_ignore_ascii_case(ticker))
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.get(ticker).is_some()
    }

    /// Display name for a ticker, falling back to the ticker itself.
    pub fn display_name<'a>(&'a self, ticker: &'a str) -> &'a str {
        self.get(ticker).map(|s| s.name.as_str()).unwrap_or(ticker)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn tickers(&self) -> Vec<String> {
        self.symbols.iter().map(|s| s.ticker.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
