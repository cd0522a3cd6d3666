use crate::domain::category::{Category, CategorySet};
use crate::domain::frequency::NotificationFrequency;
use crate::sources::{InstrumentQuote, MarketData};

pub const DIGEST_SUBJECT: &str = "Finans Bülteni - Günlük Finans Özeti";
pub const WELCOME_SUBJECT: &str = "Finans Bülteni'ne Hoş Geldiniz";

/// Stock tables can be hundreds of rows; emails show the head only.
const MAX_MARKET_ROWS: usize = 10;

/// One rendered digest section: the category, its summary text, and the
/// market block backing it (absent when that kind's aggregation failed).
pub struct CategoryDigest {
    pub category: Category,
    pub summary: String,
    pub market: Option<MarketData>,
}

/// Renders the digest body. Rendering is the boundary of the templating
/// system proper; this stays deliberately minimal.
pub fn render_digest(sections: &[CategoryDigest], recipient: &str) -> String {
    let mut body = String::from(
        "<html lang=\"tr\"><body>\
         <h1>Finans Bülteni</h1>\
         <p>Bugünün finans haberlerinin özeti aşağıda yer alıyor:</p>",
    );

    for section in sections {
        body.push_str(&format!(
            "<h2>{} Haberleri</h2><p>{}</p>",
            section.category.display_name(),
            section.summary
        ));

        if let Some(market) = &section.market {
            body.push_str(&render_market_table(market));
        }
    }

    body.push_str(&format!(
        "<hr><p>Bu e-posta <strong>{}</strong> adresine gönderilmiştir. \
         Bildirim tercihlerinizi değiştirmek için web sitemizi ziyaret edin.</p>\
         </body></html>",
        recipient
    ));

    body
}

fn render_market_table(market: &MarketData) -> String {
    let mut table = format!(
        "<table><caption>Kaynak: {}</caption>",
        market.source
    );

    for (instrument, quote) in market.instruments.iter().take(MAX_MARKET_ROWS) {
        let cells = match quote {
            InstrumentQuote::BidAsk { bid, ask, .. } => {
                format!("<td>Alış: {:.2} TL</td><td>Satış: {:.2} TL</td>", bid, ask)
            }
            InstrumentQuote::Last {
                price,
                change_percent,
            } => {
                let direction = if *change_percent >= 0.0 { "▲" } else { "▼" };
                format!(
                    "<td>Fiyat: {:.2} TL</td><td>{} %{:.2}</td>",
                    price,
                    direction,
                    change_percent.abs()
                )
            }
        };
        table.push_str(&format!("<tr><td>{}</td>{}</tr>", instrument, cells));
    }

    table.push_str("</table>");
    table
}

/// Welcome mail confirming the stored preferences, sent on first signup.
pub fn render_welcome(
    recipient: &str,
    categories: &CategorySet,
    notification_hour: u32,
    frequency: NotificationFrequency,
) -> String {
    let category_list = categories
        .iter()
        .map(|category| format!("<li>{}</li>", category.display_name()))
        .collect::<String>();

    let frequency_text = match frequency {
        NotificationFrequency::Daily => "Günde 1 kez",
        NotificationFrequency::Twice => "Günde 2 kez",
        NotificationFrequency::ThreeTimes => "Günde 3 kez",
    };

    format!(
        "<html lang=\"tr\"><body>\
         <h1>Hoş Geldiniz!</h1>\
         <p>Finans Bülteni'ne başarıyla kaydoldunuz. Size özel finans haberlerini \
         düzenli olarak e-posta adresinize göndereceğiz.</p>\
         <h2>Bildirim Tercihleriniz</h2>\
         <ul>{}</ul>\
         <p>Bildirim Saati: {:02}:00</p>\
         <p>Bildirim Sıklığı: {}</p>\
         <p>İlk bülteniniz {:02}:00'da size ulaşacak. Tercihlerinizi dilediğiniz \
         zaman değiştirebilirsiniz.</p>\
         <hr><p>Bu e-posta <strong>{}</strong> adresine gönderilmiştir.</p>\
         </body></html>",
        category_list, notification_hour, frequency_text, notification_hour, recipient
    )
}

#[cfg(test)]
mod tests {
    use super::{render_digest, render_welcome, CategoryDigest};
    use crate::domain::category::{Category, CategorySet};
    use crate::domain::frequency::NotificationFrequency;
    use crate::sources::MarketData;

    #[test]
    fn digest_contains_each_section_and_its_market_block() {
        let mut currency = MarketData::new("TCMB");
        currency.insert_bid_ask("USD", 32.10, 32.45);

        let sections = vec![
            CategoryDigest {
                category: Category::Doviz,
                summary: String::from("Dolar yatay seyretti."),
                market: Some(currency),
            },
            CategoryDigest {
                category: Category::Borsa,
                summary: String::from("Borsa kategorisinde henüz haber bulunmamaktadır."),
                market: None,
            },
        ];

        let html = render_digest(&sections, "ali@example.com");

        assert!(html.contains("Döviz Haberleri"));
        assert!(html.contains("Dolar yatay seyretti."));
        assert!(html.contains("Kaynak: TCMB"));
        assert!(html.contains("Alış: 32.10 TL"));
        assert!(html.contains("Borsa Haberleri"));
        assert!(html.contains("henüz haber bulunmamaktadır"));
        assert!(html.contains("ali@example.com"));
    }

    #[test]
    fn stock_rows_are_capped() {
        let mut stock = MarketData::new("Bigpara");
        for i in 0..30 {
            stock.insert_last(&format!("SYM{:02}", i), 10.0 + i as f64, 0.5);
        }

        let sections = vec![CategoryDigest {
            category: Category::Borsa,
            summary: String::from("Özet."),
            market: Some(stock),
        }];

        let html = render_digest(&sections, "ali@example.com");

        assert!(html.contains("SYM09"));
        assert!(!html.contains("SYM10"));
    }

    #[test]
    fn welcome_mail_reflects_preferences() {
        let categories = CategorySet::parse("doviz,altin").unwrap();

        let html = render_welcome(
            "ayse@example.com",
            &categories,
            9,
            NotificationFrequency::Twice,
        );

        assert!(html.contains("<li>Döviz</li>"));
        assert!(html.contains("<li>Altın</li>"));
        assert!(html.contains("09:00"));
        assert!(html.contains("Günde 2 kez"));
        assert!(html.contains("ayse@example.com"));
    }
}
