pub mod aggregator;
pub mod cache;
pub mod config;
pub mod digest;
pub mod dispatch;
pub mod domain;
pub mod email_client;
pub mod fetch_gate;
pub mod routes;
pub mod schedule;
pub mod sources;
pub mod startup;
pub mod summarizer;
pub mod telemetry;
pub mod throttle;
