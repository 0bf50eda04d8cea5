//! Concurrency-limited HTTP access for scrapers.
//!
//! Every scraper talks to the network through one [`Http`] handle. The handle
//! wraps a [`Client`] (normally [`ReqwestClient`]) and a [`Gate`] that bounds
//! how many requests may be in flight at once.
//!
//! # Gate semantics
//!
//! - `max_concurrency = None` or `Some(0)`: no gate at all. Requests are
//!   forwarded immediately and can never wait on each other.
//! - `max_concurrency = Some(n)`: at most `n` requests are between submission
//!   and completion at any instant. The permit is an RAII guard, so it is
//!   returned on success, on error and on cancellation alike.
//!
//! The wrapper adds no retry or backoff. Transport errors, timeouts and
//! non-2xx responses reach the caller unchanged.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument};

use crate::config::HttpSettings;
use crate::error::{HttpError, ValidationError};
use crate::utils::truncate_for_log;

/// Request body encodings forwarded to the underlying client.
#[derive(Debug, Clone)]
pub enum Body {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Bytes(Vec<u8>),
}

/// Per-request parameters. Everything here is passed through opaquely.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn headers<'a>(mut self, headers: impl IntoIterator<Item = &'a (&'a str, &'a str)>) -> Self {
        for (k, v) in headers {
            self.headers.push((k.to_string(), v.to_string()));
        }
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub url: String,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body into `T`, reporting the short type name on failure.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ValidationError> {
        serde_json::from_slice(&self.body).map_err(|source| ValidationError::Json {
            kind: short_type_name::<T>(),
            source,
        })
    }

    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.is_success() {
            Ok(self)
        } else {
            debug!(
                url = %self.url,
                status = self.status,
                body = %truncate_for_log(&self.text(), 200),
                "Non-success response"
            );
            Err(HttpError::Status {
                url: self.url,
                status: self.status,
            })
        }
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// The raw async transport the [`Http`] wrapper gates.
#[async_trait]
pub trait Client: Send + Sync {
    async fn get(&self, url: &str, opts: RequestOptions) -> Result<Response, HttpError>;
    async fn post(&self, url: &str, opts: RequestOptions) -> Result<Response, HttpError>;
}

/// [`Client`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, HttpError> {
        let redirect = if settings.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };
        let mut builder = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .redirect(redirect)
            .gzip(true);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let inner = builder.build().map_err(HttpError::Build)?;
        Ok(Self { inner })
    }

    pub fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    async fn send(
        &self,
        mut builder: reqwest::RequestBuilder,
        url: &str,
        opts: RequestOptions,
    ) -> Result<Response, HttpError> {
        if !opts.params.is_empty() {
            builder = builder.query(&opts.params);
        }
        for (k, v) in &opts.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        if let Some(timeout) = opts.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match opts.body {
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Form(pairs)) => builder.form(&pairs),
            Some(Body::Bytes(bytes)) => builder.body(bytes),
            None => builder,
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?;
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let body = resp
            .bytes()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?
            .to_vec();
        debug!(%final_url, status, bytes = body.len(), "Response received");
        Ok(Response {
            status,
            url: final_url,
            body,
        })
    }
}

#[async_trait]
impl Client for ReqwestClient {
    async fn get(&self, url: &str, opts: RequestOptions) -> Result<Response, HttpError> {
        self.send(self.inner.get(url), url, opts).await
    }

    async fn post(&self, url: &str, opts: RequestOptions) -> Result<Response, HttpError> {
        self.send(self.inner.post(url), url, opts).await
    }
}

/// Counting gate over in-flight requests. `None` inside means unlimited.
#[derive(Debug, Clone)]
pub struct Gate {
    semaphore: Option<Arc<Semaphore>>,
    limit: Option<usize>,
}

/// Held while a request is in flight. Dropping it frees the slot.
#[derive(Debug)]
pub struct GatePermit {
    _slot: Option<OwnedSemaphorePermit>,
}

impl Gate {
    pub fn new(max_concurrency: Option<usize>) -> Self {
        match max_concurrency {
            Some(n) if n > 0 => Self {
                semaphore: Some(Arc::new(Semaphore::new(n))),
                limit: Some(n),
            },
            _ => Self::unlimited(),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            semaphore: None,
            limit: None,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Free slots right now, or `None` for an unlimited gate.
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    pub async fn acquire(&self) -> Result<GatePermit, HttpError> {
        match &self.semaphore {
            None => Ok(GatePermit { _slot: None }),
            Some(sem) => {
                let permit = Arc::clone(sem)
                    .acquire_owned()
                    .await
                    .map_err(|_| HttpError::GateClosed)?;
                Ok(GatePermit { _slot: Some(permit) })
            }
        }
    }
}

/// The handle every scraper receives. Cheap to clone; clones share one gate.
#[derive(Clone)]
pub struct Http {
    client: Arc<dyn Client>,
    gate: Gate,
}

impl std::fmt::Debug for Http {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Http")
            .field("max_concurrency", &self.gate.limit())
            .finish()
    }
}

impl Http {
    pub fn new(client: impl Client + 'static, max_concurrency: Option<usize>) -> Self {
        Self::from_arc(Arc::new(client), max_concurrency)
    }

    pub fn from_arc(client: Arc<dyn Client>, max_concurrency: Option<usize>) -> Self {
        Self {
            client,
            gate: Gate::new(max_concurrency),
        }
    }

    pub fn max_concurrency(&self) -> Option<usize> {
        self.gate.limit()
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Run `fut` while holding one gate slot.
    pub async fn limit_concurrency<F, T>(&self, fut: F) -> Result<T, HttpError>
    where
        F: Future<Output = Result<T, HttpError>>,
    {
        let _permit = self.gate.acquire().await?;
        fut.await
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn get(&self, url: &str, opts: RequestOptions) -> Result<Response, HttpError> {
        self.limit_concurrency(self.client.get(url, opts)).await
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn post(&self, url: &str, opts: RequestOptions) -> Result<Response, HttpError> {
        self.limit_concurrency(self.client.post(url, opts)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{Instant, sleep};

    /// Sleeps for `delay` per call and records the peak number of overlapping calls.
    struct SlowClient {
        delay: Duration,
        fail: bool,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SlowClient {
        fn new(delay: Duration, fail: bool) -> Self {
            Self {
                delay,
                fail,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        async fn call(&self, url: &str) -> Result<Response, HttpError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                return Err(HttpError::Unavailable {
                    url: url.to_string(),
                    reason: "connection reset".into(),
                });
            }
            Ok(Response {
                status: 200,
                url: url.to_string(),
                body: b"ok".to_vec(),
            })
        }
    }

    #[async_trait]
    impl Client for Arc<SlowClient> {
        async fn get(&self, url: &str, _opts: RequestOptions) -> Result<Response, HttpError> {
            self.call(url).await
        }

        async fn post(&self, url: &str, _opts: RequestOptions) -> Result<Response, HttpError> {
            self.call(url).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_gate_never_queues() {
        let client = Arc::new(SlowClient::new(Duration::from_millis(100), false));
        let http = Http::new(Arc::clone(&client), None);

        let t0 = Instant::now();
        let calls = (0..500).map(|i| {
            let http = http.clone();
            async move { http.get(&format!("https://example.com/{i}"), RequestOptions::new()).await }
        });
        let results = join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert!(t0.elapsed() < Duration::from_millis(150));
        assert_eq!(client.peak.load(Ordering::SeqCst), 500);
        assert_eq!(http.gate().available(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_limit_is_unlimited() {
        let client = Arc::new(SlowClient::new(Duration::from_millis(100), false));
        let http = Http::new(Arc::clone(&client), Some(0));
        assert_eq!(http.max_concurrency(), None);

        let t0 = Instant::now();
        join_all((0..50).map(|_| http.get("https://example.com", RequestOptions::new()))).await;
        assert!(t0.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_bounds_in_flight_requests() {
        let client = Arc::new(SlowClient::new(Duration::from_millis(10), false));
        let http = Http::new(Arc::clone(&client), Some(3));

        let t0 = Instant::now();
        let results = join_all((0..20).map(|_| http.post("https://example.com", RequestOptions::new()))).await;

        assert_eq!(results.len(), 20);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(client.peak.load(Ordering::SeqCst), 3);
        // ceil(20 / 3) rounds of 10ms each
        assert!(t0.elapsed() >= Duration::from_millis(70));
        assert_eq!(http.gate().available(), Some(3));
    }

    #[tokio::test]
    async fn test_gate_released_when_call_fails() {
        let client = Arc::new(SlowClient::new(Duration::from_millis(1), true));
        let http = Http::new(Arc::clone(&client), Some(2));
        let before = http.gate().available();

        let err = http.get("https://example.com/down", RequestOptions::new()).await;
        assert!(matches!(err, Err(HttpError::Unavailable { .. })));
        assert_eq!(http.gate().available(), before);

        // Gate still usable afterwards
        let results = join_all((0..4).map(|_| http.get("https://example.com", RequestOptions::new()))).await;
        assert_eq!(results.len(), 4);
        assert_eq!(http.gate().available(), Some(2));
    }

    #[tokio::test]
    async fn test_gate_released_when_caller_is_cancelled() {
        let client = Arc::new(SlowClient::new(Duration::from_secs(60), false));
        let http = Http::new(Arc::clone(&client), Some(1));

        let pending = http.get("https://example.com/slow", RequestOptions::new());
        let timed_out = tokio::time::timeout(Duration::from_millis(5), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(http.gate().available(), Some(1));
    }

    /// Keeps the last options it was called with.
    #[derive(Default)]
    struct RecordingClient {
        last: std::sync::Mutex<Option<RequestOptions>>,
    }

    #[async_trait]
    impl Client for Arc<RecordingClient> {
        async fn get(&self, url: &str, opts: RequestOptions) -> Result<Response, HttpError> {
            *self.last.lock().unwrap() = Some(opts);
            Ok(Response {
                status: 200,
                url: url.to_string(),
                body: Vec::new(),
            })
        }

        async fn post(&self, url: &str, opts: RequestOptions) -> Result<Response, HttpError> {
            self.get(url, opts).await
        }
    }

    #[tokio::test]
    async fn test_options_reach_client_unchanged() {
        let client = Arc::new(RecordingClient::default());
        let http = Http::new(Arc::clone(&client), Some(1));
        let opts = RequestOptions::new()
            .param("q", "suicide")
            .header("Referer", "https://example.com/")
            .json(serde_json::json!({"page": 2}))
            .timeout(Duration::from_secs(7));

        http.post("https://example.com/search", opts).await.unwrap();

        let seen = client.last.lock().unwrap().take().unwrap();
        assert_eq!(seen.params, vec![("q".to_string(), "suicide".to_string())]);
        assert_eq!(seen.headers, vec![("Referer".to_string(), "https://example.com/".to_string())]);
        assert!(matches!(seen.body, Some(Body::Json(ref v)) if v["page"] == 2));
        assert_eq!(seen.timeout, Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_response_helpers() {
        let resp = Response {
            status: 404,
            url: "https://example.com/missing".into(),
            body: br#"{"a": 1}"#.to_vec(),
        };
        assert!(!resp.is_success());
        let value: serde_json::Value = resp.json().unwrap();
        assert_eq!(value["a"], 1);
        match resp.error_for_status() {
            Err(HttpError::Status { status, .. }) => assert_eq!(status, 404),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_response_json_reports_type() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Payload {
            id: u32,
        }
        let resp = Response {
            status: 200,
            url: "https://example.com".into(),
            body: b"{}".to_vec(),
        };
        match resp.json::<Payload>() {
            Err(ValidationError::Json { kind, .. }) => assert_eq!(kind, "Payload"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
