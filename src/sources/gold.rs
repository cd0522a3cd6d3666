use std::sync::Arc;

use crate::fetch_gate::FetchGate;
use crate::sources::quote_table::{BidAskTableAdapter, CellSelectors, QuoteSelectors};
use crate::sources::SourceAdapter;

/// Maps a provider's row label to the canonical gold product slug.
///
/// "tam" must not swallow "yarım" rows ("yarım altın" labels often contain
/// both words on provider pages).
pub fn classify_gold(label: &str) -> Option<&'static str> {
    let label = label.trim().to_lowercase();

    if label.contains("gram") {
        Some("gram")
    } else if label.contains("çeyrek") {
        Some("ceyrek")
    } else if label.contains("yarım") {
        Some("yarim")
    } else if label.contains("tam") || label.contains("cumhuriyet") {
        Some("tam")
    } else {
        None
    }
}

/// The ordered gold chain; earlier entries are trusted first.
pub fn gold_chain(gate: Arc<FetchGate>) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(BidAskTableAdapter::new(
            gate.clone(),
            "Mynet",
            "https://finans.mynet.com/altin/",
            QuoteSelectors {
                row: ".table-data tbody tr",
                cells: CellSelectors::Positional,
            },
            classify_gold,
        )),
        Arc::new(BidAskTableAdapter::new(
            gate.clone(),
            "Bigpara",
            "https://bigpara.hurriyet.com.tr/altin/",
            QuoteSelectors {
                row: "table tr",
                cells: CellSelectors::Positional,
            },
            classify_gold,
        )),
        Arc::new(BidAskTableAdapter::new(
            gate.clone(),
            "Genelpara",
            "https://www.genelpara.com/altin/",
            QuoteSelectors {
                row: "table tr",
                cells: CellSelectors::Positional,
            },
            classify_gold,
        )),
        Arc::new(BidAskTableAdapter::new(
            gate,
            "Doviz.com Altın",
            "https://www.doviz.com/altin",
            QuoteSelectors {
                row: ".market-data, .altin-item, table tr",
                cells: CellSelectors::Positional,
            },
            classify_gold,
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::classify_gold;
    use crate::sources::quote_table::{parse_bid_ask_table, CellSelectors, QuoteSelectors};

    #[test]
    fn gold_products_classify_by_turkish_label() {
        assert_eq!(classify_gold("Gram Altın"), Some("gram"));
        assert_eq!(classify_gold("Çeyrek Altın"), Some("ceyrek"));
        assert_eq!(classify_gold("Yarım Altın"), Some("yarim"));
        assert_eq!(classify_gold("Tam Altın"), Some("tam"));
        assert_eq!(classify_gold("Cumhuriyet Altını"), Some("tam"));
        assert_eq!(classify_gold("Gümüş"), None);
    }

    #[test]
    fn yarim_rows_are_not_misread_as_tam() {
        // Some providers label the half coin "Yarım (Tam karşılığı)".
        assert_eq!(classify_gold("Yarım (Tam karşılığı)"), Some("yarim"));
    }

    #[test]
    fn gold_table_is_normalized() {
        let html = r#"
            <table class="table-data"><tbody>
              <tr><td>Gram Altın</td><td>2.450,10</td><td>2.451,80</td></tr>
              <tr><td>Çeyrek Altın</td><td>4.010,00</td><td>4.095,00</td></tr>
              <tr><td>Ons Altın</td><td>2.185,00</td><td>2.186,00</td></tr>
            </tbody></table>
        "#;
        let selectors = QuoteSelectors {
            row: ".table-data tbody tr",
            cells: CellSelectors::Positional,
        };

        let data = parse_bid_ask_table(html, "Mynet", selectors, classify_gold);

        assert_eq!(data.instruments.len(), 2);
        assert!(data.instruments.contains_key("gram"));
        assert!(data.instruments.contains_key("ceyrek"));
        assert!(!data.instruments.contains_key("ons"));
    }
}
