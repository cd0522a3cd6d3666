use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::config::SecuritySettings;
use crate::domain::category::CategorySet;
use crate::domain::frequency::NotificationFrequency;
use crate::domain::subscriber::Subscriber;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::routes::auth::is_authorized_admin;

#[derive(Deserialize, Debug)]
pub struct SubscriberParameters {
    pub email: Option<String>,
}

#[tracing::instrument(name = "Admin subscriber listing", skip(request, db_pool, security))]
pub async fn handle_list_subscribers(
    request: HttpRequest,
    parameters: web::Query<SubscriberParameters>,
    db_pool: web::Data<PgPool>,
    security: web::Data<SecuritySettings>,
) -> impl Responder {
    if !is_authorized_admin(&request, security.get_ref()) {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Unauthorized - admin authentication required"
        }));
    }

    if let Some(email) = &parameters.email {
        let email = match SubscriberEmail::parse(email.clone()) {
            Ok(email) => email,
            Err(err) => {
                tracing::error!("Validation error: {:?}", err);
                return HttpResponse::BadRequest().finish();
            }
        };

        return match get_subscriber(db_pool.get_ref(), &email).await {
            Ok(Some(subscriber)) => {
                HttpResponse::Ok().json(serde_json::json!({ "subscriber": subscriber }))
            }
            Ok(None) => HttpResponse::NotFound().finish(),
            Err(err) => {
                tracing::error!("Failed to fetch subscriber: {:?}", err);
                HttpResponse::InternalServerError().finish()
            }
        };
    }

    match get_all_subscribers(db_pool.get_ref()).await {
        Ok(subscribers) => {
            let active = subscribers.iter().filter(|s| s.is_active).count();
            HttpResponse::Ok().json(serde_json::json!({
                "count": subscribers.len(),
                "active": active,
                "inactive": subscribers.len() - active,
                "subscribers": subscribers
            }))
        }
        Err(err) => {
            tracing::error!("Failed to list subscribers: {:?}", err);
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct DeleteParameters {
    pub email: String,
}

/// Hard delete: the irreversible admin path, distinct from the
/// self-service soft unsubscribe.
#[tracing::instrument(
    name = "Admin subscriber hard delete",
    skip(request, db_pool, security),
    fields(subscriber_email = %parameters.email)
)]
pub async fn handle_delete_subscriber(
    request: HttpRequest,
    parameters: web::Query<DeleteParameters>,
    db_pool: web::Data<PgPool>,
    security: web::Data<SecuritySettings>,
) -> impl Responder {
    if !is_authorized_admin(&request, security.get_ref()) {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Unauthorized - admin authentication required"
        }));
    }

    let email = match SubscriberEmail::parse(parameters.email.clone()) {
        Ok(email) => email,
        Err(err) => {
            tracing::error!("Validation error: {:?}", err);
            return HttpResponse::BadRequest().finish();
        }
    };

    let result = sqlx::query("DELETE FROM subscribers WHERE email = $1")
        .bind(email.as_ref())
        .execute(db_pool.get_ref())
        .await;

    match result {
        Ok(outcome) if outcome.rows_affected() > 0 => HttpResponse::Ok().finish(),
        Ok(_) => HttpResponse::NotFound().finish(),
        Err(err) => {
            tracing::error!("Failed to delete subscriber: {:?}", err);
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn get_subscriber(
    db_pool: &PgPool,
    email: &SubscriberEmail,
) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, email, categories, notification_hour, notification_frequency,
               is_active, last_sent_at, created_at, updated_at
        FROM subscribers
        WHERE email = $1
        "#,
    )
    .bind(email.as_ref())
    .map(map_subscriber_row)
    .fetch_optional(db_pool)
    .await
}

async fn get_all_subscribers(db_pool: &PgPool) -> Result<Vec<Subscriber>, sqlx::Error> {
    sqlx::query(
        r#"
        SELECT id, email, categories, notification_hour, notification_frequency,
               is_active, last_sent_at, created_at, updated_at
        FROM subscribers
        ORDER BY notification_hour ASC, email ASC
        "#,
    )
    .map(map_subscriber_row)
    .fetch_all(db_pool)
    .await
}

fn map_subscriber_row(row: PgRow) -> Subscriber {
    Subscriber {
        id: row.get("id"),
        email: SubscriberEmail::parse(row.get("email")).unwrap(),
        categories: CategorySet::parse(row.get("categories")).unwrap(),
        notification_hour: row.get::<i32, _>("notification_hour") as u32,
        frequency: NotificationFrequency::parse(row.get("notification_frequency")).ok(),
        is_active: row.get("is_active"),
        last_sent_at: row.get("last_sent_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
