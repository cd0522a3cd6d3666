use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::aggregator::{MarketChains, NewsChain};
use crate::domain::category::Category;
use crate::sources::{DataKind, MarketData, NewsItem};

/// Snapshots older than this are stale and trigger re-aggregation.
const MARKET_FRESHNESS_MINUTES: i64 = 30;
/// News survives much longer before a re-scrape is worth the traffic.
const NEWS_FRESHNESS_HOURS: i64 = 6;
const NEWS_BATCH_LIMIT: i64 = 10;
/// Housekeeping retention bounds.
const SNAPSHOTS_KEPT_PER_KIND: i64 = 100;
const NEWS_RETENTION_DAYS: i64 = 7;

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("all market data sources failed for every kind")]
    AllKindsFailed,
    #[error("database query failed")]
    Database(#[from] sqlx::Error),
}

/// The combined market view served to the dispatcher. A missing kind is a
/// tolerated degradation, not an error.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MarketOverview {
    pub currency: Option<MarketData>,
    pub gold: Option<MarketData>,
    pub stock: Option<MarketData>,
    pub as_of: DateTime<Utc>,
}

impl MarketOverview {
    /// The market block backing one digest category.
    pub fn slice_for(&self, category: Category) -> Option<&MarketData> {
        match category {
            Category::Doviz => self.currency.as_ref(),
            Category::Altin => self.gold.as_ref(),
            Category::Borsa => self.stock.as_ref(),
        }
    }

    fn kind(&self, kind: DataKind) -> Option<&MarketData> {
        match kind {
            DataKind::Currency => self.currency.as_ref(),
            DataKind::Gold => self.gold.as_ref(),
            DataKind::Stock => self.stock.as_ref(),
        }
    }
}

/// What a refresh produced, reported back to the cron trigger.
#[derive(Debug, serde::Serialize)]
pub struct RefreshSummary {
    pub currency: Option<String>,
    pub gold: Option<String>,
    pub stock: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub duration_ms: i64,
}

fn is_fresh(captured_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now - captured_at <= window
}

/// Serves the freshest snapshot per kind; any stale or missing kind
/// triggers a full re-aggregation. Two calls inside the freshness window
/// therefore cost zero provider traffic.
#[tracing::instrument(name = "Serving market data", skip(pool, chains))]
pub async fn get_market_data(
    pool: &PgPool,
    chains: &MarketChains,
) -> Result<MarketOverview, CacheError> {
    let now = Utc::now();
    let freshness = Duration::minutes(MARKET_FRESHNESS_MINUTES);

    let (currency, gold, stock) = tokio::try_join!(
        latest_snapshot(pool, DataKind::Currency),
        latest_snapshot(pool, DataKind::Gold),
        latest_snapshot(pool, DataKind::Stock),
    )?;

    let currency = currency.filter(|(_, captured_at)| is_fresh(*captured_at, now, freshness));
    let gold = gold.filter(|(_, captured_at)| is_fresh(*captured_at, now, freshness));
    let stock = stock.filter(|(_, captured_at)| is_fresh(*captured_at, now, freshness));

    if let (Some(currency), Some(gold), Some(stock)) = (currency, gold, stock) {
        tracing::info!("using cached market data");
        let as_of = [currency.1, gold.1, stock.1].into_iter().max().unwrap_or(now);
        return Ok(MarketOverview {
            currency: Some(currency.0),
            gold: Some(gold.0),
            stock: Some(stock.0),
            as_of,
        });
    }

    tracing::info!("cache stale or incomplete, fetching fresh market data");
    let (overview, _) = refresh_all(pool, chains).await?;
    Ok(overview)
}

/// Re-aggregates all three kinds (concurrently, since their adapter chains hit
/// disjoint host sets), persists every non-null result as a new snapshot
/// row, and hard-fails only when literally nothing came back.
#[tracing::instrument(name = "Refreshing market data cache", skip(pool, chains))]
pub async fn refresh_all(
    pool: &PgPool,
    chains: &MarketChains,
) -> Result<(MarketOverview, RefreshSummary), CacheError> {
    let started = std::time::Instant::now();

    let (currency, gold, stock) = tokio::join!(
        chains.currency.aggregate(),
        chains.gold.aggregate(),
        chains.stock.aggregate(),
    );

    let now = Utc::now();
    let overview = MarketOverview {
        currency,
        gold,
        stock,
        as_of: now,
    };

    if overview.currency.is_none() && overview.gold.is_none() && overview.stock.is_none() {
        return Err(CacheError::AllKindsFailed);
    }

    for kind in DataKind::ALL {
        if let Some(data) = overview.kind(kind) {
            insert_snapshot(pool, kind, data, now).await?;
        }
    }

    let summary = RefreshSummary {
        currency: overview.currency.as_ref().map(|data| data.source.clone()),
        gold: overview.gold.as_ref().map(|data| data.source.clone()),
        stock: overview.stock.as_ref().map(|data| data.source.clone()),
        last_updated: now,
        duration_ms: started.elapsed().as_millis() as i64,
    };

    tracing::info!(
        currency = ?summary.currency,
        gold = ?summary.gold,
        stock = ?summary.stock,
        duration_ms = summary.duration_ms,
        "market data cache updated"
    );

    Ok((overview, summary))
}

async fn latest_snapshot(
    pool: &PgPool,
    kind: DataKind,
) -> Result<Option<(MarketData, DateTime<Utc>)>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT payload, captured_at
        FROM market_snapshots
        WHERE data_kind = $1
        ORDER BY captured_at DESC
        LIMIT 1
        "#,
    )
    .bind(kind.as_ref())
    .map(|row: PgRow| {
        let payload: String = row.get("payload");
        let captured_at: DateTime<Utc> = row.get("captured_at");
        (payload, captured_at)
    })
    .fetch_optional(pool)
    .await?;

    Ok(row.and_then(|(payload, captured_at)| {
        match serde_json::from_str::<MarketData>(&payload) {
            Ok(data) => Some((data, captured_at)),
            Err(error) => {
                // A corrupt row is treated as a cache miss.
                tracing::warn!(%kind, %error, "discarding unreadable snapshot payload");
                None
            }
        }
    }))
}

async fn insert_snapshot(
    pool: &PgPool,
    kind: DataKind,
    data: &MarketData,
    captured_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let payload = serde_json::to_string(data).expect("market payloads serialize to JSON");

    sqlx::query(
        r#"
        INSERT INTO market_snapshots (id, data_kind, payload, source, captured_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(kind.as_ref())
    .bind(payload)
    .bind(&data.source)
    .bind(captured_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Serves cached news for the category, re-scraping only when nothing
/// fresh is stored. An empty batch is a valid answer, never an error.
#[tracing::instrument(name = "Serving cached news", skip(pool, chain))]
pub async fn get_cached_news(
    pool: &PgPool,
    chain: &NewsChain,
    category: Category,
) -> Result<Vec<NewsItem>, sqlx::Error> {
    let stale_floor = Utc::now() - Duration::hours(NEWS_FRESHNESS_HOURS);

    let cached = sqlx::query(
        r#"
        SELECT title, url, snippet, fetched_at
        FROM news_cache
        WHERE category = $1 AND fetched_at >= $2
        ORDER BY fetched_at DESC
        LIMIT $3
        "#,
    )
    .bind(category.as_ref())
    .bind(stale_floor)
    .bind(NEWS_BATCH_LIMIT)
    .map(|row: PgRow| NewsItem {
        title: row.get("title"),
        url: row.get("url"),
        snippet: row.get("snippet"),
        category,
        published_at: Some(row.get("fetched_at")),
    })
    .fetch_all(pool)
    .await?;

    if !cached.is_empty() {
        tracing::info!(%category, count = cached.len(), "using cached news");
        return Ok(cached);
    }

    tracing::info!(%category, "fetching fresh news");
    let fresh = chain.gather(category).await;

    let fetched_at = Utc::now();
    for item in &fresh {
        sqlx::query(
            r#"
            INSERT INTO news_cache (id, category, title, url, snippet, fetched_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(category.as_ref())
        .bind(&item.title)
        .bind(&item.url)
        .bind(&item.snippet)
        .bind(fetched_at)
        .execute(pool)
        .await?;
    }

    Ok(fresh)
}

/// Keeps only the newest rows per kind. Routine housekeeping: it runs
/// after cron refreshes and is independent of request handling.
#[tracing::instrument(name = "Pruning old snapshots", skip(pool))]
pub async fn cleanup_old_snapshots(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let mut deleted = 0;

    for kind in DataKind::ALL {
        let result = sqlx::query(
            r#"
            DELETE FROM market_snapshots
            WHERE data_kind = $1 AND id NOT IN (
                SELECT id FROM market_snapshots
                WHERE data_kind = $1
                ORDER BY captured_at DESC
                LIMIT $2
            )
            "#,
        )
        .bind(kind.as_ref())
        .bind(SNAPSHOTS_KEPT_PER_KIND)
        .execute(pool)
        .await?;

        deleted += result.rows_affected();
    }

    if deleted > 0 {
        tracing::info!(deleted, "pruned old market snapshots");
    }

    Ok(deleted)
}

#[tracing::instrument(name = "Pruning old news", skip(pool))]
pub async fn cleanup_old_news(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let retention_floor = Utc::now() - Duration::days(NEWS_RETENTION_DAYS);

    let result = sqlx::query("DELETE FROM news_cache WHERE fetched_at < $1")
        .bind(retention_floor)
        .execute(pool)
        .await?;

    let deleted = result.rows_affected();
    if deleted > 0 {
        tracing::info!(deleted, "pruned old news items");
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::{is_fresh, MarketOverview};
    use crate::domain::category::Category;
    use crate::sources::MarketData;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn snapshot_inside_the_window_is_fresh() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap();

        assert!(is_fresh(now - Duration::minutes(10), now, Duration::minutes(30)));
        assert!(is_fresh(now - Duration::minutes(30), now, Duration::minutes(30)));
    }

    #[test]
    fn snapshot_past_the_window_is_stale() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap();

        assert!(!is_fresh(now - Duration::minutes(40), now, Duration::minutes(30)));
    }

    #[test]
    fn overview_slices_map_categories_to_kinds() {
        let mut currency = MarketData::new("TCMB");
        currency.insert_bid_ask("USD", 32.0, 32.3);

        let overview = MarketOverview {
            currency: Some(currency),
            gold: None,
            stock: None,
            as_of: Utc::now(),
        };

        assert!(overview.slice_for(Category::Doviz).is_some());
        assert!(overview.slice_for(Category::Altin).is_none());
        assert!(overview.slice_for(Category::Borsa).is_none());
    }
}
