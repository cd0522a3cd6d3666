use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::digest::{render_welcome, WELCOME_SUBJECT};
use crate::domain::new_subscriber::{NewSubscriber, NewSubscriberBody};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::email_client::EmailClient;
use crate::throttle::RequestThrottle;

#[tracing::instrument(
    name = "Creating or updating a subscription",
    skip(request, body, db_pool, email_client, throttle),
    fields(subscriber_email = %body.email)
)]
pub async fn handle_create_subscription(
    request: HttpRequest,
    body: web::Json<NewSubscriberBody>,
    db_pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
    throttle: web::Data<RequestThrottle>,
) -> impl Responder {
    let client_ip = request
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();

    if !throttle.check(&format!("subscribe:{}", client_ip)) {
        tracing::warn!(%client_ip, "subscription rate limit exceeded");
        return HttpResponse::TooManyRequests().finish();
    }

    let new_subscriber: NewSubscriber = match body.into_inner().try_into() {
        Ok(subscriber) => subscriber,
        Err(err) => {
            tracing::error!("Validation error: {:?}", err);
            return HttpResponse::BadRequest().finish();
        }
    };

    let already_subscribed =
        match subscription_exists(db_pool.get_ref(), &new_subscriber.email).await {
            Ok(exists) => exists,
            Err(err) => {
                tracing::error!("Failed to look up subscriber: {:?}", err);
                return HttpResponse::InternalServerError().finish();
            }
        };

    if already_subscribed {
        // Re-subscribing reactivates a soft-deleted row as well.
        if let Err(err) = update_subscription(db_pool.get_ref(), &new_subscriber).await {
            tracing::error!("Failed to update subscriber: {:?}", err);
            return HttpResponse::InternalServerError().finish();
        }

        return HttpResponse::Ok().finish();
    }

    if let Err(err) = insert_subscription(db_pool.get_ref(), &new_subscriber).await {
        tracing::error!("Failed to insert new subscriber: {:?}", err);
        return HttpResponse::InternalServerError().finish();
    }

    // A failed welcome email must not undo a successful signup.
    if let Err(err) = send_welcome_email(email_client.get_ref(), &new_subscriber).await {
        tracing::error!(
            "Failed to send a welcome email to {}: {:?}",
            new_subscriber.email.as_ref(),
            err
        );
    }

    HttpResponse::Created().finish()
}

#[derive(Deserialize, Debug)]
pub struct UnsubscribeParameters {
    pub email: String,
}

#[tracing::instrument(
    name = "Unsubscribing",
    skip(db_pool),
    fields(subscriber_email = %parameters.email)
)]
pub async fn handle_delete_subscription(
    parameters: web::Query<UnsubscribeParameters>,
    db_pool: web::Data<PgPool>,
) -> impl Responder {
    let email = match SubscriberEmail::parse(parameters.email.clone()) {
        Ok(email) => email,
        Err(err) => {
            tracing::error!("Validation error: {:?}", err);
            return HttpResponse::BadRequest().finish();
        }
    };

    match deactivate_subscription(db_pool.get_ref(), &email).await {
        Ok(true) => HttpResponse::Ok().finish(),
        Ok(false) => HttpResponse::NotFound().finish(),
        Err(err) => {
            tracing::error!("Failed to deactivate subscriber: {:?}", err);
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn subscription_exists(
    db_pool: &PgPool,
    email: &SubscriberEmail,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT id FROM subscribers WHERE email = $1")
        .bind(email.as_ref())
        .fetch_optional(db_pool)
        .await?;

    Ok(row.is_some())
}

#[tracing::instrument(name = "Insert a new subscriber into the database", skip(new_subscriber, db_pool))]
async fn insert_subscription(
    db_pool: &PgPool,
    new_subscriber: &NewSubscriber,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO subscribers
            (id, email, categories, notification_hour, notification_frequency,
             is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, true, $6, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new_subscriber.email.as_ref())
    .bind(new_subscriber.categories.to_token_string())
    .bind(new_subscriber.notification_hour as i32)
    .bind(new_subscriber.frequency.as_ref())
    .bind(now)
    .execute(db_pool)
    .await?;

    Ok(())
}

#[tracing::instrument(name = "Update subscriber preferences", skip(new_subscriber, db_pool))]
async fn update_subscription(
    db_pool: &PgPool,
    new_subscriber: &NewSubscriber,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE subscribers
        SET categories = $1, notification_hour = $2, notification_frequency = $3,
            is_active = true, updated_at = $4
        WHERE email = $5
        "#,
    )
    .bind(new_subscriber.categories.to_token_string())
    .bind(new_subscriber.notification_hour as i32)
    .bind(new_subscriber.frequency.as_ref())
    .bind(Utc::now())
    .bind(new_subscriber.email.as_ref())
    .execute(db_pool)
    .await?;

    Ok(())
}

async fn deactivate_subscription(
    db_pool: &PgPool,
    email: &SubscriberEmail,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE subscribers
        SET is_active = false, updated_at = $1
        WHERE email = $2
        "#,
    )
    .bind(Utc::now())
    .bind(email.as_ref())
    .execute(db_pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[tracing::instrument(name = "Send a welcome email to a new subscriber", skip(email_client, new_subscriber))]
async fn send_welcome_email(
    email_client: &EmailClient,
    new_subscriber: &NewSubscriber,
) -> Result<(), reqwest::Error> {
    let html_body = render_welcome(
        new_subscriber.email.as_ref(),
        &new_subscriber.categories,
        new_subscriber.notification_hour,
        new_subscriber.frequency,
    );

    email_client
        .send_email(&new_subscriber.email, WELCOME_SUBJECT, &html_body)
        .await
}
