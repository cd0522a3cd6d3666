use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{Timelike, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use crate::aggregator::MarketChains;
use crate::cache::{self, CacheError};
use crate::config::SecuritySettings;
use crate::dispatch;
use crate::email_client::EmailClient;
use crate::routes::auth::is_authorized_cron;
use crate::summarizer::SummarizerClient;
use crate::throttle::RequestThrottle;

/// Scheduling trigger: refresh the market data cache.
///
/// Fired on a fixed interval by an external cron service. Housekeeping
/// piggybacks on the same trigger but never fails it.
#[tracing::instrument(name = "Cron market data update", skip_all)]
pub async fn handle_update_data(
    request: HttpRequest,
    db_pool: web::Data<PgPool>,
    chains: web::Data<MarketChains>,
    security: web::Data<SecuritySettings>,
    throttle: web::Data<RequestThrottle>,
) -> impl Responder {
    if !is_authorized_cron(&request, security.get_ref()) {
        tracing::warn!("unauthorized cron access attempt");
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Unauthorized - valid cron secret required"
        }));
    }

    let summary = match cache::refresh_all(db_pool.get_ref(), chains.get_ref()).await {
        Ok((_, summary)) => summary,
        Err(CacheError::AllKindsFailed) => {
            tracing::error!("market data refresh failed for every kind");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Failed to fetch market data from all sources"
            }));
        }
        Err(CacheError::Database(err)) => {
            tracing::error!("failed to persist market data: {:?}", err);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Failed to update market data"
            }));
        }
    };

    if let Err(err) = cache::cleanup_old_snapshots(db_pool.get_ref()).await {
        tracing::warn!("snapshot cleanup failed: {:?}", err);
    }
    if let Err(err) = cache::cleanup_old_news(db_pool.get_ref()).await {
        tracing::warn!("news cleanup failed: {:?}", err);
    }
    throttle.cleanup();

    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Market data updated successfully",
        "data": summary
    }))
}

#[derive(Deserialize, Debug)]
pub struct TickParameters {
    pub hour: Option<u32>,
}

/// Scheduling trigger: run one digest tick.
///
/// Fired hourly; an explicit `hour` parameter allows re-running a missed
/// tick. Authentication happens before any work.
#[tracing::instrument(name = "Cron digest tick", skip_all, fields(hour = ?parameters.hour))]
pub async fn handle_send_bulletins(
    request: HttpRequest,
    parameters: web::Query<TickParameters>,
    db_pool: web::Data<PgPool>,
    chains: web::Data<MarketChains>,
    summarizer: web::Data<SummarizerClient>,
    email_client: web::Data<EmailClient>,
    security: web::Data<SecuritySettings>,
) -> impl Responder {
    if !is_authorized_cron(&request, security.get_ref()) {
        tracing::warn!("unauthorized cron access attempt");
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Unauthorized - valid cron secret required"
        }));
    }

    let now = Utc::now();
    let current_hour = match parameters.hour {
        Some(hour) if hour > 23 => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("{} is not a valid hour", hour)
            }));
        }
        Some(hour) => hour,
        None => now.hour(),
    };

    match dispatch::run_tick(
        db_pool.get_ref(),
        chains.get_ref(),
        summarizer.get_ref(),
        email_client.get_ref(),
        current_hour,
        now,
    )
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "sent": outcome.sent,
            "failed": outcome.failed,
            "total": outcome.total
        })),
        Err(err) => {
            tracing::error!("digest tick failed: {:?}", err);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Failed to send bulletins"
            }))
        }
    }
}
