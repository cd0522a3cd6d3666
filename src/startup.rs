use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Pool, Postgres};
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::aggregator::MarketChains;
use crate::config::{DatabaseSettings, SecuritySettings, Settings};
use crate::email_client::EmailClient;
use crate::fetch_gate::FetchGate;
use crate::routes::{
    handle_create_subscription, handle_delete_subscriber, handle_delete_subscription,
    handle_list_subscribers, handle_send_bulletins, handle_update_data, health_check,
};
use crate::summarizer::SummarizerClient;
use crate::throttle::RequestThrottle;

/// Signup endpoint allowance per client IP.
const SIGNUP_MAX_REQUESTS: u32 = 5;
const SIGNUP_WINDOW: Duration = Duration::from_secs(60);

pub struct Application {
    pub port: u16,
    pub server: Server,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, std::io::Error> {
        let db_pool = get_connection_db_pool(&config.database);

        let sender_email = config
            .get_email_client_sender()
            .expect("Sender email is not valid");
        let email_client = EmailClient::new(
            config.email_client.base_url.clone(),
            sender_email,
            config.email_client.api_key.clone(),
            None,
        );
        let summarizer = SummarizerClient::new(
            config.summarizer.base_url.clone(),
            config.summarizer.api_key.clone(),
            config.summarizer.model.clone(),
            None,
            None,
        );

        let listener =
            TcpListener::bind(config.get_address()).expect("Failed to bind the address.");
        let port = listener.local_addr().unwrap().port();
        let server = run(
            listener,
            db_pool,
            email_client,
            summarizer,
            config.security.clone(),
        )?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn run(
    listener: TcpListener,
    db_pool: PgPool,
    email_client: EmailClient,
    summarizer: SummarizerClient,
    security: SecuritySettings,
) -> Result<Server, std::io::Error> {
    let db_pool = web::Data::new(db_pool);
    let email_client = web::Data::new(email_client);
    let summarizer = web::Data::new(summarizer);
    let security = web::Data::new(security);
    // All adapter chains share one pacing gate, built once per process.
    let chains = web::Data::new(MarketChains::build(Arc::new(FetchGate::new())));
    let throttle = web::Data::new(RequestThrottle::new(SIGNUP_MAX_REQUESTS, SIGNUP_WINDOW));

    let server = HttpServer::new(move || {
        // App is where your application logic lives: routing, middlewares, request handler, etc
        App::new()
            // 'wrap' method adds a middleware to the App. This specific middleware provide incoming
            // request logger
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/subscriptions", web::post().to(handle_create_subscription))
            .route(
                "/subscriptions",
                web::delete().to(handle_delete_subscription),
            )
            .route("/cron/update-data", web::get().to(handle_update_data))
            .route("/cron/send-bulletins", web::get().to(handle_send_bulletins))
            .route("/admin/subscribers", web::get().to(handle_list_subscribers))
            .route(
                "/admin/subscribers",
                web::delete().to(handle_delete_subscriber),
            )
            .app_data(db_pool.clone())
            .app_data(email_client.clone())
            .app_data(summarizer.clone())
            .app_data(security.clone())
            .app_data(chains.clone())
            .app_data(throttle.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
