pub mod admin;
pub mod auth;
pub mod cron;
pub mod health_check;
pub mod subscriptions;

pub use admin::{handle_delete_subscriber, handle_list_subscribers};
pub use cron::{handle_send_bulletins, handle_update_data};
pub use health_check::health_check;
pub use subscriptions::{handle_create_subscription, handle_delete_subscription};
