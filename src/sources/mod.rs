pub mod currency;
pub mod gold;
pub mod news;
pub mod quote_table;
pub mod stock;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::category::Category;

/// The three market data kinds served by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Currency,
    Gold,
    Stock,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [DataKind::Currency, DataKind::Gold, DataKind::Stock];
}

impl AsRef<str> for DataKind {
    fn as_ref(&self) -> &str {
        match self {
            DataKind::Currency => "currency",
            DataKind::Gold => "gold",
            DataKind::Stock => "stock",
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// One instrument normalized out of a provider page.
///
/// Currency and gold quote both sides of the spread; stocks carry a single
/// traded price. The serialized forms are kept distinct so cached payloads
/// read back into the same variant.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum InstrumentQuote {
    BidAsk {
        bid: f64,
        ask: f64,
        change_percent: f64,
    },
    Last {
        price: f64,
        change_percent: f64,
    },
}

/// A provider result normalized to the common shape.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarketData {
    /// Which provider produced the payload.
    pub source: String,
    pub instruments: BTreeMap<String, InstrumentQuote>,
}

impl MarketData {
    pub fn new(source: &str) -> MarketData {
        MarketData {
            source: source.to_string(),
            instruments: BTreeMap::new(),
        }
    }

    pub fn insert_bid_ask(&mut self, instrument: &str, bid: f64, ask: f64) {
        self.instruments.insert(
            instrument.to_string(),
            InstrumentQuote::BidAsk {
                bid,
                ask,
                change_percent: 0.0,
            },
        );
    }

    pub fn insert_last(&mut self, instrument: &str, price: f64, change_percent: f64) {
        self.instruments.insert(
            instrument.to_string(),
            InstrumentQuote::Last {
                price,
                change_percent,
            },
        );
    }

    /// A payload counts only when it holds at least one real instrument
    /// beyond the source label.
    pub fn is_valid(&self) -> bool {
        !self.instruments.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub category: Category,
    pub published_at: Option<DateTime<Utc>>,
}

/// One (kind x provider) fetcher. Ordinary network or parse trouble is
/// reported as `None`; panics are reserved for programmer errors such as
/// a malformed selector literal.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self) -> Option<MarketData>;
}

/// One news provider for a category.
#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, category: Category) -> Vec<NewsItem>;
}

/// Parses a Turkish-formatted decimal ("34,25", "1.234,56", "₺2.450,00").
pub(crate) fn parse_tr_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    // Thousands dots first, then the decimal comma.
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };

    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parses a percent cell that may carry the sign glyphs providers use.
pub(crate) fn parse_tr_percent(raw: &str) -> Option<f64> {
    parse_tr_number(&raw.replace('%', ""))
}

#[cfg(test)]
mod tests {
    use super::{parse_tr_number, parse_tr_percent, InstrumentQuote, MarketData};

    #[test]
    fn turkish_decimal_comma_is_parsed() {
        assert_eq!(parse_tr_number("34,25"), Some(34.25));
        assert_eq!(parse_tr_number(" 0,9312 "), Some(0.9312));
    }

    #[test]
    fn thousands_separator_is_dropped() {
        assert_eq!(parse_tr_number("1.234,56"), Some(1234.56));
        assert_eq!(parse_tr_number("10.500"), Some(10.500));
    }

    #[test]
    fn currency_glyphs_are_ignored() {
        assert_eq!(parse_tr_number("₺2.450,00"), Some(2450.0));
        assert_eq!(parse_tr_percent("%1,25"), Some(1.25));
        assert_eq!(parse_tr_percent("-0,42%"), Some(-0.42));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_tr_number(""), None);
        assert_eq!(parse_tr_number("n/a"), None);
        assert_eq!(parse_tr_number("--"), None);
    }

    #[test]
    fn payload_with_no_instruments_is_invalid() {
        let mut data = MarketData::new("Mynet");
        assert!(!data.is_valid());

        data.insert_bid_ask("USD", 32.1, 32.4);
        assert!(data.is_valid());
    }

    #[test]
    fn cached_payload_round_trips_through_json() {
        let mut data = MarketData::new("TCMB");
        data.insert_bid_ask("USD", 32.10, 32.45);
        data.insert_last("XU100", 10_250.0, 0.8);

        let serialized = serde_json::to_string(&data).unwrap();
        let deserialized: MarketData = serde_json::from_str(&serialized).unwrap();

        assert_eq!(deserialized, data);
        assert!(matches!(
            deserialized.instruments.get("USD"),
            Some(InstrumentQuote::BidAsk { .. })
        ));
        assert!(matches!(
            deserialized.instruments.get("XU100"),
            Some(InstrumentQuote::Last { .. })
        ));
    }
}
