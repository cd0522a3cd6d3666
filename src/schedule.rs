use chrono::{DateTime, Utc};

use crate::domain::frequency::NotificationFrequency;
use crate::domain::subscriber::Subscriber;

/// The slice of subscriber state the eligibility decision depends on.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    pub notification_hour: u32,
    pub frequency: Option<NotificationFrequency>,
    pub last_sent_at: Option<DateTime<Utc>>,
}

impl From<&Subscriber> for ScheduleState {
    fn from(subscriber: &Subscriber) -> Self {
        ScheduleState {
            notification_hour: subscriber.notification_hour,
            frequency: subscriber.frequency,
            last_sent_at: subscriber.last_sent_at,
        }
    }
}

/// Decides whether a digest is due for this subscriber at `current_hour`.
///
/// Pure over its inputs: one evaluation per subscriber per tick, no I/O.
/// A subscriber who has never received a digest is due only at the exact
/// hour they picked. After that, each frequency opens additional slots,
/// each gated on the time elapsed since the last confirmed send:
///
/// - daily:       hour                        (>= 23h)
/// - twice:       hour (>= 23h), hour+12      (>= 11h)
/// - three_times: hour (>= 23h), hour+6, +12  (>= 5h each)
///
/// An unrecognized stored frequency degrades to plain hour match.
pub fn is_due(state: &ScheduleState, current_hour: u32, now: DateTime<Utc>) -> bool {
    let at_chosen_hour = current_hour == state.notification_hour;

    let last_sent_at = match state.last_sent_at {
        Some(last_sent_at) => last_sent_at,
        None => return at_chosen_hour,
    };

    let hours_since_last = (now - last_sent_at).num_seconds() as f64 / 3600.0;
    let slot = |offset: u32| current_hour == (state.notification_hour + offset) % 24;

    match state.frequency {
        Some(NotificationFrequency::Daily) => at_chosen_hour && hours_since_last >= 23.0,
        Some(NotificationFrequency::Twice) => {
            (at_chosen_hour && hours_since_last >= 23.0)
                || (slot(12) && hours_since_last >= 11.0)
        }
        Some(NotificationFrequency::ThreeTimes) => {
            (at_chosen_hour && hours_since_last >= 23.0)
                || (slot(6) && hours_since_last >= 5.0)
                || (slot(12) && hours_since_last >= 5.0)
        }
        None => at_chosen_hour,
    }
}
