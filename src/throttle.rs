use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Fixed-window request throttle keyed by client identifier.
///
/// This guards our own endpoints against abuse; pacing of outbound
/// scraping requests is a different concern and lives in the fetch gate.
pub struct RequestThrottle {
    max_requests: u32,
    window: Duration,
    records: Mutex<HashMap<String, WindowRecord>>,
}

struct WindowRecord {
    count: u32,
    window_ends_at: Instant,
}

impl RequestThrottle {
    pub fn new(max_requests: u32, window: Duration) -> RequestThrottle {
        RequestThrottle {
            max_requests,
            window,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Records one request for `identifier` and reports whether it is
    /// still inside the allowance.
    pub fn check(&self, identifier: &str) -> bool {
        let mut records = self.records.lock().unwrap();
        let now = Instant::now();

        match records.get_mut(identifier) {
            Some(record) if now <= record.window_ends_at => {
                if record.count >= self.max_requests {
                    return false;
                }
                record.count += 1;
                true
            }
            _ => {
                records.insert(
                    identifier.to_string(),
                    WindowRecord {
                        count: 1,
                        window_ends_at: now + self.window,
                    },
                );
                true
            }
        }
    }

    /// Drops expired windows; called opportunistically, correctness does
    /// not depend on it.
    pub fn cleanup(&self) {
        let mut records = self.records.lock().unwrap();
        let now = Instant::now();

        records.retain(|_, record| now <= record.window_ends_at);
    }
}
