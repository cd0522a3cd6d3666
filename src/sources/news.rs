use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};

use crate::domain::category::Category;
use crate::fetch_gate::FetchGate;
use crate::sources::{NewsItem, NewsSource};

/// Cap applied per provider page / feed before ranking.
const ITEMS_PER_PAGE: usize = 5;
/// Cap on one gathered batch.
const MAX_ITEMS: usize = 10;

/// RSS feeds per category, most reliable first. Feeds drift far less than
/// page markup, which is why this source heads every news chain.
fn feeds_for(category: Category) -> &'static [&'static str] {
    match category {
        Category::Doviz => &[
            "https://www.bloomberght.com/api/categories/haberler/doviz?_format=rss",
            "https://www.hurriyet.com.tr/rss/ekonomi",
            "https://www.ntv.com.tr/ekonomi.rss",
        ],
        Category::Altin => &[
            "https://www.bloomberght.com/api/categories/haberler/emtia?_format=rss",
            "https://www.hurriyet.com.tr/rss/ekonomi",
            "https://www.ntv.com.tr/ekonomi.rss",
        ],
        Category::Borsa => &[
            "https://www.bloomberght.com/api/categories/haberler/borsa?_format=rss",
            "https://www.hurriyet.com.tr/rss/ekonomi",
            "https://www.cnnturk.com/feed/rss/ekonomi/news",
            "https://www.ntv.com.tr/ekonomi.rss",
        ],
    }
}

/// Aggregates the category's RSS feeds. Items are deliberately not
/// keyword-filtered: feeds carry general finance news and the summarizer
/// produces the category focus.
pub struct RssNewsSource {
    gate: Arc<FetchGate>,
}

impl RssNewsSource {
    pub fn new(gate: Arc<FetchGate>) -> RssNewsSource {
        RssNewsSource { gate }
    }
}

#[async_trait]
impl NewsSource for RssNewsSource {
    fn name(&self) -> &'static str {
        "RSS"
    }

    async fn fetch(&self, category: Category) -> Vec<NewsItem> {
        let mut items = Vec::new();

        for feed_url in feeds_for(category).iter().copied() {
            let body = match self.gate.get(feed_url).await {
                Ok(body) => body,
                Err(error) => {
                    tracing::warn!(feed = feed_url, %error, "rss feed fetch failed");
                    continue;
                }
            };

            match parse_rss_feed(&body, category) {
                Some(feed_items) => items.extend(feed_items),
                None => tracing::warn!(feed = feed_url, "rss feed could not be parsed"),
            }
        }

        // Newest first, bounded batch.
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(MAX_ITEMS);
        items
    }
}

/// Parses one RSS document into normalized items, newest `ITEMS_PER_PAGE`.
pub fn parse_rss_feed(body: &str, category: Category) -> Option<Vec<NewsItem>> {
    let channel = rss::Channel::read_from(body.as_bytes()).ok()?;

    let items = channel
        .items()
        .iter()
        .take(ITEMS_PER_PAGE)
        .filter_map(|item| {
            let title = item.title()?.trim().to_string();
            let url = item.link()?.trim().to_string();
            if title.is_empty() || url.is_empty() {
                return None;
            }

            let snippet = item
                .description()
                .map(|description| strip_tags(description))
                .unwrap_or_else(|| title.clone());
            let published_at = item
                .pub_date()
                .and_then(|date| DateTime::parse_from_rfc2822(date).ok())
                .map(|date| date.with_timezone(&Utc));

            Some(NewsItem {
                title,
                url,
                snippet,
                category,
                published_at,
            })
        })
        .collect();

    Some(items)
}

/// Category landing pages scraped as a fallback when every feed is down.
pub struct HtmlNewsSource {
    gate: Arc<FetchGate>,
    name: &'static str,
    base_url: &'static str,
    url_for: fn(Category) -> &'static str,
    item_selector: &'static str,
    title_selector: &'static str,
    snippet_selector: &'static str,
}

impl HtmlNewsSource {
    #[allow(clippy::too_many_arguments)]
    fn new(
        gate: Arc<FetchGate>,
        name: &'static str,
        base_url: &'static str,
        url_for: fn(Category) -> &'static str,
        item_selector: &'static str,
        title_selector: &'static str,
        snippet_selector: &'static str,
    ) -> HtmlNewsSource {
        HtmlNewsSource {
            gate,
            name,
            base_url,
            url_for,
            item_selector,
            title_selector,
            snippet_selector,
        }
    }
}

#[async_trait]
impl NewsSource for HtmlNewsSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, category: Category) -> Vec<NewsItem> {
        let url = (self.url_for)(category);
        let body = match self.gate.get(url).await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(source = self.name, %error, "news page fetch failed");
                return Vec::new();
            }
        };

        parse_news_page(
            &body,
            self.base_url,
            self.item_selector,
            self.title_selector,
            self.snippet_selector,
            category,
        )
    }
}

/// Extracts headline items from a listing page. Relative links are
/// resolved against the provider's base url.
pub fn parse_news_page(
    html: &str,
    base_url: &str,
    item_selector: &str,
    title_selector: &str,
    snippet_selector: &str,
    category: Category,
) -> Vec<NewsItem> {
    let document = Html::parse_document(html);
    let items = Selector::parse(item_selector).expect("item selector literal must be valid CSS");
    let titles = Selector::parse(title_selector).expect("title selector literal must be valid CSS");
    let snippets =
        Selector::parse(snippet_selector).expect("snippet selector literal must be valid CSS");
    let links = Selector::parse("a").expect("a is valid CSS");

    document
        .select(&items)
        .filter_map(|item| {
            let title = item
                .select(&titles)
                .map(|el| el.text().collect::<String>().trim().to_string())
                .find(|text| !text.is_empty())?;
            let href = item
                .select(&links)
                .find_map(|el| el.value().attr("href"))?
                .trim();
            if href.is_empty() {
                return None;
            }

            let url = if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{}{}", base_url, href)
            };
            let snippet = item
                .select(&snippets)
                .map(|el| el.text().collect::<String>().trim().to_string())
                .find(|text| !text.is_empty())
                .unwrap_or_default();

            Some(NewsItem {
                title,
                url,
                snippet,
                category,
                published_at: None,
            })
        })
        .take(ITEMS_PER_PAGE)
        .collect()
}

fn strip_tags(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    fragment.root_element().text().collect::<String>().trim().to_string()
}

/// The ordered news chain; the RSS aggregate leads, page scrapes follow.
pub fn news_chain(gate: Arc<FetchGate>) -> Vec<Arc<dyn NewsSource>> {
    vec![
        Arc::new(RssNewsSource::new(gate.clone())),
        Arc::new(HtmlNewsSource::new(
            gate.clone(),
            "BloombergHT",
            "https://www.bloomberght.com",
            |category| match category {
                Category::Doviz => "https://www.bloomberght.com/doviz",
                Category::Altin => "https://www.bloomberght.com/emtia",
                Category::Borsa => "https://www.bloomberght.com/borsa",
            },
            ".news-item, article",
            "h2, h3, .title",
            "p, .summary",
        )),
        Arc::new(HtmlNewsSource::new(
            gate.clone(),
            "Mynet Finans",
            "https://finans.mynet.com",
            |_| "https://finans.mynet.com/",
            ".news-item",
            ".title",
            ".summary",
        )),
        Arc::new(HtmlNewsSource::new(
            gate.clone(),
            "Hürriyet",
            "https://www.hurriyet.com.tr",
            |category| match category {
                Category::Doviz => "https://www.hurriyet.com.tr/ekonomi/doviz/",
                Category::Altin => "https://www.hurriyet.com.tr/ekonomi/",
                Category::Borsa => "https://www.hurriyet.com.tr/ekonomi/borsa/",
            },
            ".news-list li, article, .haber-item",
            "h2, h3, .title",
            "p, .summary, .spot",
        )),
        Arc::new(HtmlNewsSource::new(
            gate.clone(),
            "CNN Türk",
            "https://www.cnnturk.com",
            |_| "https://www.cnnturk.com/ekonomi",
            "article, .card, .news-item",
            "h2, h3, .card__title",
            "p, .card__text, .summary",
        )),
        Arc::new(HtmlNewsSource::new(
            gate,
            "NTV",
            "https://www.ntv.com.tr",
            |_| "https://www.ntv.com.tr/ekonomi",
            "article, .list-item, .news",
            "h2, h3, .title",
            "p, .description",
        )),
    ]
}
