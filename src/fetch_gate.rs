use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::header;
use tokio::sync::Mutex;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Minimum spacing between two requests to the same host.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(5);
/// Extra randomized delay added to every request.
const JITTER_MIN_MS: u64 = 1_000;
const JITTER_MAX_MS: u64 = 3_000;

/// Browser identities rotated per request so providers cannot key on one.
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("{0} is not a fetchable url")]
    InvalidUrl(String),
    #[error("request failed")]
    Request(#[from] reqwest::Error),
}

/// Outbound HTTP wrapper that paces requests per destination host.
///
/// Owns all pacing state explicitly: the pooled client, the per-host
/// next-allowed-contact map, and the jitter bounds. Constructed once at
/// startup and shared behind an `Arc`; adapters never talk to the network
/// except through it.
pub struct FetchGate {
    http_client: reqwest::Client,
    // Host -> the instant the next request to it may be issued.
    next_contact: Mutex<HashMap<String, Instant>>,
    min_interval: Duration,
}

impl FetchGate {
    pub fn new() -> FetchGate {
        Self::with_min_interval(MIN_REQUEST_INTERVAL)
    }

    pub fn with_min_interval(min_interval: Duration) -> FetchGate {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build the scraping HTTP client");

        FetchGate {
            http_client,
            next_contact: Mutex::new(HashMap::new()),
            min_interval,
        }
    }

    /// Fetches `url`, suspending first until the host's pacing slot and a
    /// randomized jitter have elapsed. Transport and non-2xx failures
    /// propagate; adapters translate them into "no data".
    #[tracing::instrument(name = "Rate limited fetch", skip(self))]
    pub async fn get(&self, url: &str) -> Result<String, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.into()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(url.into()))?
            .to_string();

        let wait = self.reserve_slot(&host).await;
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        let response = self
            .http_client
            .get(parsed)
            .header(header::USER_AGENT, random_user_agent())
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(header::ACCEPT_LANGUAGE, "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7")
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }

    /// Claims the next slot for `host` under the lock and returns how long
    /// the caller must sleep before using it. Claiming up front keeps two
    /// concurrent callers to the same host from sharing one slot.
    async fn reserve_slot(&self, host: &str) -> Duration {
        let jitter = random_jitter();
        let mut next_contact = self.next_contact.lock().await;
        let now = Instant::now();

        let slot = next_slot(next_contact.get(host).copied(), now, self.min_interval) + jitter;
        next_contact.insert(host.to_string(), slot);

        slot - now
    }
}

/// Earliest instant a new request may target the host, before jitter.
fn next_slot(previous: Option<Instant>, now: Instant, min_interval: Duration) -> Instant {
    match previous {
        Some(previous) if previous + min_interval > now => previous + min_interval,
        _ => now,
    }
}

fn random_user_agent() -> &'static str {
    USER_AGENTS[rand::thread_rng().gen_range(0..USER_AGENTS.len())]
}

fn random_jitter() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(JITTER_MIN_MS..=JITTER_MAX_MS))
}

#[cfg(test)]
mod tests {
    use super::{next_slot, random_jitter, FetchGate, FetchError};
    use claim::assert_err;
    use std::time::{Duration, Instant};

    #[test]
    fn first_contact_with_a_host_is_immediate() {
        let now = Instant::now();

        assert_eq!(next_slot(None, now, Duration::from_secs(5)), now);
    }

    #[test]
    fn contact_inside_the_interval_is_pushed_to_the_boundary() {
        let now = Instant::now();
        let previous = now - Duration::from_secs(2);

        let slot = next_slot(Some(previous), now, Duration::from_secs(5));

        assert_eq!(slot, previous + Duration::from_secs(5));
    }

    #[test]
    fn contact_after_the_interval_is_immediate() {
        let now = Instant::now();
        let previous = now - Duration::from_secs(6);

        assert_eq!(next_slot(Some(previous), now, Duration::from_secs(5)), now);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..64 {
            let jitter = random_jitter();
            assert!(jitter >= Duration::from_millis(super::JITTER_MIN_MS));
            assert!(jitter <= Duration::from_millis(super::JITTER_MAX_MS));
        }
    }

    #[tokio::test]
    async fn consecutive_requests_to_one_host_are_spaced_apart() {
        let gate = FetchGate::with_min_interval(Duration::from_millis(50));

        let first = gate.reserve_slot("finans.example.com").await;
        let second = gate.reserve_slot("finans.example.com").await;

        // The second slot starts at least one interval after the first.
        assert!(second >= first + Duration::from_millis(50));
    }

    #[tokio::test]
    async fn distinct_hosts_do_not_share_a_slot() {
        let gate = FetchGate::with_min_interval(Duration::from_secs(60));

        let first = gate.reserve_slot("a.example.com").await;
        let second = gate.reserve_slot("b.example.com").await;

        // Both fit inside the jitter window alone.
        assert!(first <= Duration::from_millis(super::JITTER_MAX_MS));
        assert!(second <= Duration::from_millis(super::JITTER_MAX_MS));
    }

    #[tokio::test]
    async fn url_without_host_is_rejected() {
        let gate = FetchGate::new();

        let result = gate.get("not a url").await;

        assert_err!(&result);
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }
}
