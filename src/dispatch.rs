use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::aggregator::MarketChains;
use crate::cache::{self, CacheError, MarketOverview};
use crate::digest::{render_digest, CategoryDigest, DIGEST_SUBJECT};
use crate::domain::category::CategorySet;
use crate::domain::frequency::NotificationFrequency;
use crate::domain::subscriber::Subscriber;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::email_client::EmailClient;
use crate::schedule::{is_due, ScheduleState};
use crate::summarizer::SummarizerClient;

/// News items handed to the summarizer per category.
const NEWS_PER_CATEGORY: usize = 5;

/// Tally of one digest tick. `sent + failed == total` due subscribers.
#[derive(Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct DispatchOutcome {
    pub sent: u32,
    pub failed: u32,
    pub total: u32,
}

#[derive(thiserror::Error, Debug)]
enum SubscriberSendError {
    #[error("failed to read cached news")]
    News(#[from] sqlx::Error),
    #[error("failed to send the digest email")]
    Send(#[from] reqwest::Error),
}

/// Runs one digest tick for `current_hour`.
///
/// Subscribers are processed sequentially and in isolation: one failing
/// send is counted and logged, and the loop moves on. `last_sent_at`
/// advances only after a confirmed send, so a failed subscriber is
/// retried at their next eligible hour.
#[tracing::instrument(name = "Digest tick", skip(pool, chains, summarizer, email_client))]
pub async fn run_tick(
    pool: &PgPool,
    chains: &MarketChains,
    summarizer: &SummarizerClient,
    email_client: &EmailClient,
    current_hour: u32,
    now: DateTime<Utc>,
) -> Result<DispatchOutcome, sqlx::Error> {
    let subscribers = get_active_subscribers(pool).await?;
    let due: Vec<Subscriber> = due_subscribers(subscribers, current_hour, now);

    if due.is_empty() {
        tracing::info!(current_hour, "no subscribers due this hour");
        return Ok(DispatchOutcome::default());
    }

    tracing::info!(current_hour, due = due.len(), "dispatching digests");

    // One market fetch serves the whole tick.
    let overview = match cache::get_market_data(pool, chains).await {
        Ok(overview) => overview,
        Err(CacheError::AllKindsFailed) => {
            // Still worth sending: digests degrade to news-only sections.
            tracing::error!("market data unavailable for every kind, sending without it");
            MarketOverview {
                currency: None,
                gold: None,
                stock: None,
                as_of: now,
            }
        }
        Err(CacheError::Database(error)) => return Err(error),
    };

    let mut outcome = DispatchOutcome {
        total: due.len() as u32,
        ..Default::default()
    };

    for subscriber in &due {
        match send_digest(pool, chains, summarizer, email_client, &overview, subscriber).await {
            Ok(()) => {
                if let Err(error) = mark_sent(pool, subscriber.id, now).await {
                    // The email went out; the stamp failing means an extra
                    // digest may follow, which beats a silent drop.
                    tracing::error!(subscriber = %subscriber.email, %error, "failed to record last_sent_at");
                }
                outcome.sent += 1;
                tracing::info!(subscriber = %subscriber.email, "digest sent");
            }
            Err(error) => {
                outcome.failed += 1;
                tracing::error!(subscriber = %subscriber.email, %error, "digest failed");
            }
        }
    }

    tracing::info!(
        sent = outcome.sent,
        failed = outcome.failed,
        total = outcome.total,
        "digest tick finished"
    );

    Ok(outcome)
}

/// Applies the schedule evaluator over the loaded subscriber set.
fn due_subscribers(
    subscribers: Vec<Subscriber>,
    current_hour: u32,
    now: DateTime<Utc>,
) -> Vec<Subscriber> {
    subscribers
        .into_iter()
        .filter(|subscriber| is_due(&ScheduleState::from(subscriber), current_hour, now))
        .collect()
}

async fn send_digest(
    pool: &PgPool,
    chains: &MarketChains,
    summarizer: &SummarizerClient,
    email_client: &EmailClient,
    overview: &MarketOverview,
    subscriber: &Subscriber,
) -> Result<(), SubscriberSendError> {
    let mut sections = Vec::new();

    for category in subscriber.categories.iter() {
        let news = cache::get_cached_news(pool, &chains.news, category).await?;
        let top_news: Vec<_> = news.into_iter().take(NEWS_PER_CATEGORY).collect();
        let summary = summarizer.summarize(&top_news, category).await;

        let market = overview
            .slice_for(category)
            .filter(|market| market.is_valid())
            .cloned();

        sections.push(CategoryDigest {
            category,
            summary,
            market,
        });
    }

    let body = render_digest(&sections, subscriber.email.as_ref());
    email_client
        .send_email(&subscriber.email, DIGEST_SUBJECT, &body)
        .await?;

    Ok(())
}

async fn get_active_subscribers(pool: &PgPool) -> Result<Vec<Subscriber>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, email, categories, notification_hour, notification_frequency,
               is_active, last_sent_at, created_at, updated_at
        FROM subscribers
        WHERE is_active = true
        "#,
    )
    .map(|row: PgRow| Subscriber {
        id: row.get("id"),
        email: SubscriberEmail::parse(row.get("email")).unwrap(),
        categories: CategorySet::parse(row.get("categories")).unwrap(),
        notification_hour: row.get::<i32, _>("notification_hour") as u32,
        frequency: NotificationFrequency::parse(row.get("notification_frequency")).ok(),
        is_active: row.get("is_active"),
        last_sent_at: row.get("last_sent_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
    .fetch_all(pool)
    .await
}

/// Single-row stamp keyed by subscriber id, safe to run independently per
/// subscriber.
async fn mark_sent(pool: &PgPool, id: Uuid, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE subscribers
        SET last_sent_at = $1, updated_at = $1
        WHERE id = $2
        "#,
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}
