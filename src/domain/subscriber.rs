use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::category::CategorySet;
use crate::domain::frequency::NotificationFrequency;
use crate::domain::subscriber_email::SubscriberEmail;

/// A digest recipient as persisted.
///
/// `frequency` is `None` when the stored token is not recognized; the
/// schedule evaluator degrades such rows to plain hour-match delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub email: SubscriberEmail,
    pub categories: CategorySet,
    pub notification_hour: u32,
    pub frequency: Option<NotificationFrequency>,
    pub is_active: bool,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
