use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::{API_HOST, BASE_URL, MAX_RETRY, REQUEST_TIMEOUT_SECS};
use crate::error::PredictError;

static CLIENT: OnceCell<Client> = OnceCell::new();

fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

pub enum TransportReply {
    Body(String),
    RateLimited,
}

/// Seam between the retry/cache layer and the wire. Errors returned from
/// `get` are treated as transient and retried under the call's budget.
pub trait Transport: Send + Sync {
    fn get(&self, endpoint: &str, params: &[(String, String)]) -> Result<TransportReply>;
}

pub struct HttpTransport {
    api_key: String,
}

impl HttpTransport {
    pub fn new(api_key: String) -> Self {
        Self { api_key }
    }
}

impl Transport for HttpTransport {
    fn get(&self, endpoint: &str, params: &[(String, String)]) -> Result<TransportReply> {
        let client = http_client()?;
        let url = format!("{BASE_URL}{endpoint}");
        let resp = client
            .get(&url)
            .query(params)
            .header("x-rapidapi-host", API_HOST)
            .header("x-rapidapi-key", &self.api_key)
            .send()
            .context("request failed")?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(TransportReply::RateLimited);
        }
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow::anyhow!("http {}: {}", status, body));
        }
        Ok(TransportReply::Body(body))
    }
}

/// Bounded exponential backoff shared by every provider call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRY,
            base_delay: Duration::from_secs(1),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        if self.jitter {
            delay.mul_f64(1.0 + 0.25 * rand::random::<f64>())
        } else {
            delay
        }
    }

    // Rate-limit replies get one extra base slice on top of the backoff.
    fn rate_limit_wait(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_add(self.backoff(attempt))
    }
}

/// Single point of contact with the statistics provider. Responses are cached
/// per (endpoint, sorted params) for the lifetime of the client; the cache is
/// run-scoped and never evicted.
pub struct ApiClient {
    transport: Box<dyn Transport>,
    policy: RetryPolicy,
    cache: Mutex<HashMap<String, Value>>,
    attempts: AtomicU64,
}

impl ApiClient {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self::with_policy(transport, RetryPolicy::default())
    }

    pub fn with_policy(transport: Box<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            cache: Mutex::new(HashMap::new()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Total network attempts made so far (cache hits excluded).
    pub fn network_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn call(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, PredictError> {
        let mut sorted: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        sorted.sort();
        let key = cache_key(endpoint, &sorted);

        {
            let cache = self.cache.lock().expect("response cache lock poisoned");
            if let Some(hit) = cache.get(&key) {
                return Ok(hit.clone());
            }
        }

        let mut last_err = String::new();
        for attempt in 0..self.policy.max_attempts {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            match self.transport.get(endpoint, &sorted) {
                Ok(TransportReply::Body(body)) => match serde_json::from_str::<Value>(&body) {
                    Ok(doc) => {
                        self.cache
                            .lock()
                            .expect("response cache lock poisoned")
                            .insert(key, doc.clone());
                        return Ok(doc);
                    }
                    Err(err) => last_err = format!("invalid json: {err}"),
                },
                Ok(TransportReply::RateLimited) => {
                    last_err = "rate limited".to_string();
                    std::thread::sleep(self.policy.rate_limit_wait(attempt));
                    continue;
                }
                Err(err) => last_err = format!("{err:#}"),
            }
            if attempt + 1 < self.policy.max_attempts {
                std::thread::sleep(self.policy.backoff(attempt));
            }
        }

        Err(PredictError::DataSourceUnavailable {
            endpoint: endpoint.to_string(),
            reason: last_err,
        })
    }
}

fn cache_key(endpoint: &str, sorted_params: &[(String, String)]) -> String {
    let query = sorted_params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{endpoint}?{query}")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            jitter: false,
        }
    }

    struct ScriptedTransport {
        calls: AtomicU32,
        failures_before_success: u32,
        rate_limit_first: bool,
    }

    impl ScriptedTransport {
        fn new(failures_before_success: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures_before_success,
                rate_limit_first: false,
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, _endpoint: &str, _params: &[(String, String)]) -> Result<TransportReply> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                if self.rate_limit_first && n == 0 {
                    return Ok(TransportReply::RateLimited);
                }
                return Err(anyhow::anyhow!("boom"));
            }
            Ok(TransportReply::Body(r#"{"response": [1, 2]}"#.to_string()))
        }
    }

    #[test]
    fn identical_calls_hit_cache_once() {
        let client = ApiClient::with_policy(Box::new(ScriptedTransport::new(0)), fast_policy(3));
        let params = [("team", "10".to_string()), ("season", "2024".to_string())];
        let a = client.call("/players", &params).unwrap();
        // Same parameters in a different order must hit the same cache slot.
        let params = [("season", "2024".to_string()), ("team", "10".to_string())];
        let b = client.call("/players", &params).unwrap();
        assert_eq!(a, b);
        assert_eq!(client.network_attempts(), 1);
    }

    #[test]
    fn transient_failures_are_retried() {
        let client = ApiClient::with_policy(Box::new(ScriptedTransport::new(2)), fast_policy(4));
        let doc = client.call("/fixtures", &[]).unwrap();
        assert!(doc.get("response").is_some());
        assert_eq!(client.network_attempts(), 3);
    }

    #[test]
    fn rate_limit_consumes_the_same_budget() {
        let transport = ScriptedTransport {
            calls: AtomicU32::new(0),
            failures_before_success: 1,
            rate_limit_first: true,
        };
        let client = ApiClient::with_policy(Box::new(transport), fast_policy(3));
        assert!(client.call("/injuries", &[]).is_ok());
        assert_eq!(client.network_attempts(), 2);
    }

    #[test]
    fn exhausted_budget_is_fatal() {
        let client = ApiClient::with_policy(Box::new(ScriptedTransport::new(99)), fast_policy(3));
        let err = client.call("/fixtures", &[]).unwrap_err();
        assert!(matches!(err, PredictError::DataSourceUnavailable { .. }));
        assert_eq!(client.network_attempts(), 3);
    }

    #[test]
    fn invalid_json_is_retried_not_cached() {
        struct BadThenGood(AtomicU32);
        impl Transport for BadThenGood {
            fn get(&self, _e: &str, _p: &[(String, String)]) -> Result<TransportReply> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(TransportReply::Body("not json".to_string()))
                } else {
                    Ok(TransportReply::Body("{}".to_string()))
                }
            }
        }
        let client =
            ApiClient::with_policy(Box::new(BadThenGood(AtomicU32::new(0))), fast_policy(3));
        assert!(client.call("/teams", &[]).is_ok());
        assert_eq!(client.network_attempts(), 2);
    }
}
