use std::sync::Arc;

use crate::fetch_gate::FetchGate;
use crate::sources::quote_table::{CellSelectors, LastPriceTableAdapter, QuoteSelectors};
use crate::sources::SourceAdapter;

/// The ordered Borsa İstanbul chain; earlier entries are trusted first.
pub fn stock_chain(gate: Arc<FetchGate>) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(LastPriceTableAdapter::new(
            gate.clone(),
            "Bigpara",
            "https://bigpara.hurriyet.com.tr/borsa/canli-borsa/",
            QuoteSelectors {
                row: "table tr",
                cells: CellSelectors::Positional,
            },
        )),
        Arc::new(LastPriceTableAdapter::new(
            gate.clone(),
            "Mynet Borsa",
            "https://finans.mynet.com/borsa/",
            QuoteSelectors {
                row: ".table-data tbody tr, table tr",
                cells: CellSelectors::Positional,
            },
        )),
        Arc::new(LastPriceTableAdapter::new(
            gate.clone(),
            "Foreks",
            "https://www.foreks.com/hisseler/",
            QuoteSelectors {
                row: "table.stock-table tr, .hisse-listesi tr",
                cells: CellSelectors::Positional,
            },
        )),
        Arc::new(LastPriceTableAdapter::new(
            gate,
            "Borsa Gündem",
            "https://www.borsagundem.com/canli-borsa",
            QuoteSelectors {
                row: "table tbody tr, .stock-row",
                cells: CellSelectors::Positional,
            },
        )),
    ]
}
