use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::fetch_gate::FetchGate;
use crate::sources::{parse_tr_number, parse_tr_percent, MarketData, SourceAdapter};

/// How one provider lays its quote rows out.
///
/// Adapters are configuration data over two shared parsers rather than a
/// type per provider; the chain order carries the trust ranking.
#[derive(Clone, Copy)]
pub struct QuoteSelectors {
    pub row: &'static str,
    pub cells: CellSelectors,
}

#[derive(Clone, Copy)]
pub enum CellSelectors {
    /// Name/buy/sell (or symbol/price/change) are the first three `td`s.
    Positional,
    /// Values live in dedicated elements inside each row.
    Named {
        name: &'static str,
        buy: &'static str,
        sell: &'static str,
    },
}

/// Maps a provider's row label to the canonical instrument name, or
/// rejects the row.
pub type RowClassifier = fn(&str) -> Option<&'static str>;

/// Scrapes bid/ask quote tables (currency and gold providers).
pub struct BidAskTableAdapter {
    gate: Arc<FetchGate>,
    name: &'static str,
    url: &'static str,
    selectors: QuoteSelectors,
    classify: RowClassifier,
}

impl BidAskTableAdapter {
    pub fn new(
        gate: Arc<FetchGate>,
        name: &'static str,
        url: &'static str,
        selectors: QuoteSelectors,
        classify: RowClassifier,
    ) -> BidAskTableAdapter {
        BidAskTableAdapter {
            gate,
            name,
            url,
            selectors,
            classify,
        }
    }
}

#[async_trait]
impl SourceAdapter for BidAskTableAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self) -> Option<MarketData> {
        let body = match self.gate.get(self.url).await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(source = self.name, %error, "provider fetch failed");
                return None;
            }
        };

        Some(parse_bid_ask_table(
            &body,
            self.name,
            self.selectors,
            self.classify,
        ))
    }
}

/// Scrapes last-price tables (stock providers). The first column is taken
/// as the symbol, the second as the price, the third as the day change.
pub struct LastPriceTableAdapter {
    gate: Arc<FetchGate>,
    name: &'static str,
    url: &'static str,
    selectors: QuoteSelectors,
}

impl LastPriceTableAdapter {
    pub fn new(
        gate: Arc<FetchGate>,
        name: &'static str,
        url: &'static str,
        selectors: QuoteSelectors,
    ) -> LastPriceTableAdapter {
        LastPriceTableAdapter {
            gate,
            name,
            url,
            selectors,
        }
    }
}

#[async_trait]
impl SourceAdapter for LastPriceTableAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self) -> Option<MarketData> {
        let body = match self.gate.get(self.url).await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(source = self.name, %error, "provider fetch failed");
                return None;
            }
        };

        Some(parse_last_price_table(&body, self.name, self.selectors))
    }
}

pub fn parse_bid_ask_table(
    html: &str,
    source: &str,
    selectors: QuoteSelectors,
    classify: RowClassifier,
) -> MarketData {
    let mut data = MarketData::new(source);

    for (label, values) in extract_rows(html, selectors) {
        let instrument = match classify(&label) {
            Some(instrument) => instrument,
            None => continue,
        };
        let (bid, ask) = match (values.first().copied(), values.get(1).copied()) {
            (Some(bid), Some(ask)) => (bid, ask),
            _ => continue,
        };

        data.insert_bid_ask(instrument, bid, ask);
    }

    data
}

pub fn parse_last_price_table(html: &str, source: &str, selectors: QuoteSelectors) -> MarketData {
    let mut data = MarketData::new(source);

    for (symbol, values) in extract_rows(html, selectors) {
        // Symbols are short upper-case codes; anything longer is a header
        // or promo row.
        if symbol.is_empty() || symbol.len() > 12 || !symbol.chars().all(|c| c.is_alphanumeric()) {
            continue;
        }
        let price = match values.first().copied() {
            Some(price) if price > 0.0 => price,
            _ => continue,
        };
        let change = values.get(1).copied().unwrap_or(0.0);

        data.insert_last(&symbol, price, change);
    }

    data
}

/// Pulls `(label, numeric cells)` out of each row matching the config.
fn extract_rows(html: &str, selectors: QuoteSelectors) -> Vec<(String, Vec<f64>)> {
    let document = Html::parse_document(html);
    let row_selector =
        Selector::parse(selectors.row).expect("row selector literal must be valid CSS");
    let mut rows = Vec::new();

    for row in document.select(&row_selector) {
        let (label, raw_values) = match selectors.cells {
            CellSelectors::Positional => {
                let cell_selector = Selector::parse("td").expect("td is valid CSS");
                let mut cells = row.select(&cell_selector).map(element_text);
                let label = match cells.next() {
                    Some(label) => label,
                    None => continue,
                };
                (label, cells.take(2).collect::<Vec<_>>())
            }
            CellSelectors::Named { name, buy, sell } => {
                let label = match select_text(&row, name) {
                    Some(label) => label,
                    None => continue,
                };
                let buy = select_text(&row, buy);
                let sell = select_text(&row, sell);
                (label, [buy, sell].into_iter().flatten().collect())
            }
        };

        let values: Vec<f64> = raw_values
            .iter()
            .filter_map(|raw| parse_tr_number(raw).or_else(|| parse_tr_percent(raw)))
            .collect();

        rows.push((label, values));
    }

    rows
}

fn element_text(element: scraper::ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn select_text(row: &scraper::ElementRef<'_>, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).expect("cell selector literal must be valid CSS");
    row.select(&selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}
