use std::sync::Arc;

use crate::domain::category::Category;
use crate::fetch_gate::FetchGate;
use crate::sources::currency::currency_chain;
use crate::sources::gold::gold_chain;
use crate::sources::news::news_chain;
use crate::sources::stock::stock_chain;
use crate::sources::{DataKind, MarketData, NewsItem, NewsSource, SourceAdapter};

/// Ordered fallback list for one data kind.
///
/// Adapters run strictly in sequence; probing every provider in parallel
/// would hammer all of them for a single winner and defeat the pacing
/// gate. The first structurally valid payload wins; there is no merging.
pub struct AdapterChain {
    kind: DataKind,
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl AdapterChain {
    pub fn new(kind: DataKind, adapters: Vec<Arc<dyn SourceAdapter>>) -> AdapterChain {
        AdapterChain { kind, adapters }
    }

    /// Returns the first valid adapter result, or `None` when the chain is
    /// exhausted. Exhaustion is reported, never raised, so callers can
    /// degrade the digest instead of aborting it.
    #[tracing::instrument(name = "Aggregating market data", skip(self), fields(kind = %self.kind))]
    pub async fn aggregate(&self) -> Option<MarketData> {
        for adapter in &self.adapters {
            match adapter.fetch().await {
                Some(data) if data.is_valid() => {
                    tracing::info!(kind = %self.kind, source = adapter.name(), "market data fetched");
                    return Some(data);
                }
                Some(_) => {
                    tracing::warn!(kind = %self.kind, source = adapter.name(), "provider returned an empty payload");
                }
                None => {
                    tracing::warn!(kind = %self.kind, source = adapter.name(), "provider failed");
                }
            }
        }

        tracing::error!(kind = %self.kind, "all providers failed");
        None
    }
}

/// Ordered fallback list for news providers; first non-empty batch wins.
pub struct NewsChain {
    sources: Vec<Arc<dyn NewsSource>>,
}

impl NewsChain {
    pub fn new(sources: Vec<Arc<dyn NewsSource>>) -> NewsChain {
        NewsChain { sources }
    }

    /// An empty result is a normal outcome, not an error: digests render a
    /// placeholder for categories with no news.
    #[tracing::instrument(name = "Aggregating news", skip(self))]
    pub async fn gather(&self, category: Category) -> Vec<NewsItem> {
        for source in &self.sources {
            let items = source.fetch(category).await;
            if !items.is_empty() {
                tracing::info!(
                    %category,
                    source = source.name(),
                    count = items.len(),
                    "news fetched"
                );
                return items;
            }

            tracing::warn!(%category, source = source.name(), "news source yielded nothing");
        }

        tracing::warn!(%category, "all news sources failed");
        Vec::new()
    }
}

/// The full set of fallback chains, built once at startup around a shared
/// pacing gate.
pub struct MarketChains {
    pub currency: AdapterChain,
    pub gold: AdapterChain,
    pub stock: AdapterChain,
    pub news: NewsChain,
}

impl MarketChains {
    pub fn build(gate: Arc<FetchGate>) -> MarketChains {
        MarketChains {
            currency: AdapterChain::new(DataKind::Currency, currency_chain(gate.clone())),
            gold: AdapterChain::new(DataKind::Gold, gold_chain(gate.clone())),
            stock: AdapterChain::new(DataKind::Stock, stock_chain(gate.clone())),
            news: NewsChain::new(news_chain(gate)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AdapterChain, NewsChain};
    use crate::domain::category::Category;
    use crate::sources::{DataKind, MarketData, NewsItem, NewsSource, SourceAdapter};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    enum Behavior {
        Fail,
        Empty,
        Valid,
    }

    struct ScriptedAdapter {
        name: &'static str,
        behavior: Behavior,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedAdapter {
        fn new(name: &'static str, behavior: Behavior) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let adapter = Arc::new(ScriptedAdapter {
                name,
                behavior,
                calls: calls.clone(),
            });
            (adapter, calls)
        }
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self) -> Option<MarketData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Fail => None,
                Behavior::Empty => Some(MarketData::new(self.name)),
                Behavior::Valid => {
                    let mut data = MarketData::new(self.name);
                    data.insert_bid_ask("USD", 32.0, 32.3);
                    Some(data)
                }
            }
        }
    }

    #[tokio::test]
    async fn first_valid_adapter_wins_and_later_ones_are_not_called() {
        let (a, a_calls) = ScriptedAdapter::new("A", Behavior::Fail);
        let (b, b_calls) = ScriptedAdapter::new("B", Behavior::Valid);
        let (c, c_calls) = ScriptedAdapter::new("C", Behavior::Valid);
        let chain = AdapterChain::new(DataKind::Currency, vec![a, b, c]);

        let result = chain.aggregate().await.unwrap();

        assert_eq!(result.source, "B");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_payload_does_not_win() {
        let (a, _) = ScriptedAdapter::new("A", Behavior::Empty);
        let (b, _) = ScriptedAdapter::new("B", Behavior::Valid);
        let chain = AdapterChain::new(DataKind::Gold, vec![a, b]);

        let result = chain.aggregate().await.unwrap();

        assert_eq!(result.source, "B");
    }

    #[tokio::test]
    async fn exhausted_chain_reports_none() {
        let (a, _) = ScriptedAdapter::new("A", Behavior::Fail);
        let (b, _) = ScriptedAdapter::new("B", Behavior::Empty);
        let chain = AdapterChain::new(DataKind::Stock, vec![a, b]);

        assert!(chain.aggregate().await.is_none());
    }

    struct ScriptedNewsSource {
        name: &'static str,
        items: usize,
    }

    #[async_trait]
    impl NewsSource for ScriptedNewsSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, category: Category) -> Vec<NewsItem> {
            (0..self.items)
                .map(|i| NewsItem {
                    title: format!("{} haber {}", self.name, i),
                    url: format!("https://example.com/{}/{}", self.name, i),
                    snippet: String::new(),
                    category,
                    published_at: None,
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn first_non_empty_news_source_wins() {
        let chain = NewsChain::new(vec![
            Arc::new(ScriptedNewsSource { name: "rss", items: 0 }),
            Arc::new(ScriptedNewsSource { name: "html", items: 3 }),
        ]);

        let items = chain.gather(Category::Borsa).await;

        assert_eq!(items.len(), 3);
        assert!(items[0].title.starts_with("html"));
    }

    #[tokio::test]
    async fn exhausted_news_chain_is_empty_not_an_error() {
        let chain = NewsChain::new(vec![Arc::new(ScriptedNewsSource { name: "rss", items: 0 })]);

        assert!(chain.gather(Category::Doviz).await.is_empty());
    }
}
