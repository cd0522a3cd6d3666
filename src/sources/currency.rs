use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::fetch_gate::FetchGate;
use crate::sources::quote_table::{BidAskTableAdapter, CellSelectors, QuoteSelectors};
use crate::sources::{MarketData, SourceAdapter};

/// Currencies a digest quotes; everything else on a provider page is noise.
const TRACKED_CODES: [&str; 3] = ["USD", "EUR", "GBP"];

const TCMB_TODAY_XML: &str = "https://www.tcmb.gov.tr/kurlar/today.xml";

/// Maps a provider's row label to a tracked ISO code.
pub fn classify_currency(label: &str) -> Option<&'static str> {
    let label = label.trim();

    if label.contains("Dolar") || label.contains("USD") {
        Some("USD")
    } else if label.contains("Euro") || label.contains("EUR") {
        Some("EUR")
    } else if label.contains("Sterlin") || label.contains("GBP") {
        Some("GBP")
    } else {
        None
    }
}

/// Central bank reference rates, published as a daily XML document. First
/// in the chain: authoritative, but only refreshed on business days.
pub struct TcmbXmlAdapter {
    gate: Arc<FetchGate>,
}

impl TcmbXmlAdapter {
    pub fn new(gate: Arc<FetchGate>) -> TcmbXmlAdapter {
        TcmbXmlAdapter { gate }
    }
}

#[async_trait]
impl SourceAdapter for TcmbXmlAdapter {
    fn name(&self) -> &'static str {
        "TCMB"
    }

    async fn fetch(&self) -> Option<MarketData> {
        let body = match self.gate.get(TCMB_TODAY_XML).await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(source = "TCMB", %error, "provider fetch failed");
                return None;
            }
        };

        parse_tcmb_xml(&body)
    }
}

/// Pulls BanknoteBuying/BanknoteSelling out of each tracked `<Currency>`
/// element. Returns `None` on malformed XML so the chain can move on.
pub fn parse_tcmb_xml(xml: &str) -> Option<MarketData> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut data = MarketData::new("TCMB");
    let mut current_code: Option<String> = None;
    let mut current_field: Option<String> = None;
    let mut buying: Option<f64> = None;
    let mut selling: Option<f64> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let element = String::from_utf8_lossy(start.name().as_ref()).to_string();
                if element == "Currency" {
                    current_code = start.attributes().flatten().find_map(|attribute| {
                        (attribute.key.as_ref() == b"CurrencyCode").then(|| {
                            String::from_utf8_lossy(attribute.value.as_ref()).to_string()
                        })
                    });
                    buying = None;
                    selling = None;
                } else {
                    current_field = Some(element);
                }
            }
            Ok(Event::Text(text)) => {
                let value = text.unescape().ok()?.trim().parse::<f64>().ok();
                match current_field.as_deref() {
                    Some("BanknoteBuying") => buying = value,
                    Some("BanknoteSelling") => selling = value,
                    _ => {}
                }
            }
            Ok(Event::End(end)) => {
                if end.name().as_ref() == b"Currency" {
                    if let (Some(code), Some(bid), Some(ask)) = (current_code.take(), buying, selling)
                    {
                        if TRACKED_CODES.contains(&code.as_str()) {
                            data.insert_bid_ask(&code, bid, ask);
                        }
                    }
                } else {
                    current_field = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }

    Some(data)
}

/// The ordered currency chain; earlier entries are trusted first.
pub fn currency_chain(gate: Arc<FetchGate>) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(TcmbXmlAdapter::new(gate.clone())),
        Arc::new(BidAskTableAdapter::new(
            gate.clone(),
            "Mynet",
            "https://finans.mynet.com/doviz/",
            QuoteSelectors {
                row: ".table-data tbody tr",
                cells: CellSelectors::Positional,
            },
            classify_currency,
        )),
        Arc::new(BidAskTableAdapter::new(
            gate.clone(),
            "Doviz.com",
            "https://www.doviz.com/",
            QuoteSelectors {
                row: ".market-data",
                cells: CellSelectors::Named {
                    name: ".name",
                    buy: ".value.buying",
                    sell: ".value.selling",
                },
            },
            classify_currency,
        )),
        Arc::new(BidAskTableAdapter::new(
            gate.clone(),
            "Bigpara",
            "https://bigpara.hurriyet.com.tr/doviz/",
            QuoteSelectors {
                row: "table tr",
                cells: CellSelectors::Positional,
            },
            classify_currency,
        )),
        Arc::new(BidAskTableAdapter::new(
            gate.clone(),
            "Hürriyet",
            "https://www.hurriyet.com.tr/doviz/",
            QuoteSelectors {
                row: ".currency-box, .doviz-item, table tr",
                cells: CellSelectors::Positional,
            },
            classify_currency,
        )),
        Arc::new(BidAskTableAdapter::new(
            gate,
            "Milliyet",
            "https://www.milliyet.com.tr/ekonomi/doviz/",
            QuoteSelectors {
                row: ".currency-list li, table tr, .doviz-row",
                cells: CellSelectors::Positional,
            },
            classify_currency,
        )),
    ]
}
