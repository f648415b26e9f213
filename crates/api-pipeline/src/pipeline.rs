//! The authorized request pipeline.
//!
//! Every authenticated API call flows through [`ApiPipeline::request`]. On
//! an authorization-expired response the caller joins the single in-flight
//! refresh cycle (creating it if absent) and replays once with the rotated
//! token. The in-flight cycle is a shared future: late arrivals clone and
//! await it, so concurrent expiry victims can never start a second refresh.

use crate::bridge::SessionBridge;
use crate::error::{ApiError, ApiResult, GENERIC_ERROR_MESSAGE};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Method, TransportError};
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use session_types::TokenPair;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Refresh endpoint, relative to the API base URL.
const REFRESH_PATH: &str = "/sessions/refresh-token";

/// Backend markers for an expired/invalid access token on a 401 response.
const EXPIRY_MARKERS: [&str; 2] = ["token.expired", "token.invalid"];

/// Configuration for retry behavior during a refresh cycle.
///
/// Retries apply only to transient faults (connect failures, timeouts, 5xx)
/// inside the one in-flight cycle; a definitive rejection of the refresh
/// token fails the cycle immediately.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of attempts per cycle.
    pub max_retries: u32,
    /// Initial delay between attempts in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms.saturating_mul(2u64.pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// How a refresh cycle failed.
#[derive(Debug, Clone)]
enum RefreshFailure {
    /// The refresh token was rejected; the session has been torn down.
    Rejected,
    /// Transient faults exhausted the retry budget; the session is intact.
    Transient(String),
}

type RefreshOutcome = Result<TokenPair, RefreshFailure>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Single choke point for API calls.
pub struct ApiPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    transport: Arc<dyn HttpTransport>,
    bridge: Arc<dyn SessionBridge>,
    refresh_config: RefreshConfig,
    /// The one in-flight refresh cycle. Late arrivals clone the shared
    /// future instead of issuing a second refresh call.
    inflight: Mutex<Option<SharedRefresh>>,
}

impl ApiPipeline {
    /// Create a new pipeline over the given transport and session bridge.
    pub fn new(transport: Arc<dyn HttpTransport>, bridge: Arc<dyn SessionBridge>) -> Self {
        Self::with_refresh_config(transport, bridge, RefreshConfig::default())
    }

    /// Create a pipeline with custom refresh retry behavior.
    pub fn with_refresh_config(
        transport: Arc<dyn HttpTransport>,
        bridge: Arc<dyn SessionBridge>,
        refresh_config: RefreshConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                transport,
                bridge,
                refresh_config,
                inflight: Mutex::new(None),
            }),
        }
    }

    /// Issue a request without a bearer token (sign-in, sign-up, refresh are
    /// the backend's unauthenticated endpoints).
    ///
    /// Failures never trigger a refresh; they are typed and returned as-is.
    pub async fn request_public(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ApiResult<ApiResponse> {
        let mut request = ApiRequest::new(method, path);
        request.body = body;

        let response = self.inner.execute(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(typed_error(&response))
        }
    }

    /// Issue an authorized request, refreshing and replaying once if the
    /// access token has expired.
    ///
    /// Every call settles exactly once: success, a typed server error, a
    /// network error, or `SessionExpired` when refresh is impossible.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ApiResult<ApiResponse> {
        let mut token = self
            .inner
            .bridge
            .access_token()
            .ok_or(ApiError::NotAuthenticated)?;
        let mut replayed = false;

        loop {
            let mut request = ApiRequest::new(method, path);
            request.body = body.clone();
            request.bearer = Some(token.clone());

            let response = self.inner.execute(request).await?;
            if response.is_success() {
                return Ok(response);
            }

            if is_expiry_response(&response) {
                if replayed {
                    // The rotated token was rejected too; do not loop.
                    return Err(ApiError::SessionExpired);
                }
                debug!(path, "Access token expired, joining refresh cycle");
                token = self.inner.clone().refreshed_token(&token).await?;
                replayed = true;
                continue;
            }

            return Err(typed_error(&response));
        }
    }
}

impl PipelineInner {
    async fn execute(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        self.transport.execute(request).await.map_err(|e| match e {
            TransportError::Timeout => ApiError::Network("timed out".to_string()),
            TransportError::Network(detail) => ApiError::Network(detail),
        })
    }

    /// Obtain a usable access token after `stale` was rejected.
    ///
    /// Joins the in-flight refresh cycle, or starts one. The winner rotates
    /// the pair through the bridge before the slot is cleared, so checking
    /// the current token under the slot lock is enough to know whether a
    /// settled cycle already did the work.
    async fn refreshed_token(self: Arc<Self>, stale: &str) -> ApiResult<String> {
        let cycle = {
            let mut slot = self.inflight.lock().unwrap();

            match self.bridge.access_token() {
                None => return Err(ApiError::SessionExpired),
                Some(current) if current != stale => return Ok(current),
                Some(_) => {}
            }

            match slot.as_ref() {
                Some(cycle) => cycle.clone(),
                None => {
                    let cycle = Arc::clone(&self).run_refresh_cycle().boxed().shared();
                    *slot = Some(cycle.clone());
                    cycle
                }
            }
        };

        match cycle.await {
            Ok(pair) => Ok(pair.token),
            Err(RefreshFailure::Rejected) => Err(ApiError::SessionExpired),
            Err(RefreshFailure::Transient(detail)) => Err(ApiError::Network(detail)),
        }
    }

    /// The one in-flight refresh cycle.
    ///
    /// Rotates the pair through the bridge on success, tears the session
    /// down on definitive rejection, and leaves the session intact when
    /// transient faults exhaust the retry budget. Clears the in-flight slot
    /// last, after the outcome is fully applied.
    async fn run_refresh_cycle(self: Arc<Self>) -> RefreshOutcome {
        let outcome = self.drive_refresh_attempts().await;
        *self.inflight.lock().unwrap() = None;
        outcome
    }

    async fn drive_refresh_attempts(&self) -> RefreshOutcome {
        let refresh_token = match self.bridge.refresh_token() {
            Some(t) => t,
            None => {
                warn!("No refresh token available, tearing session down");
                self.bridge.session_expired().await;
                return Err(RefreshFailure::Rejected);
            }
        };

        let mut last_detail = String::new();
        for attempt in 0..self.refresh_config.max_retries {
            match self.try_refresh(&refresh_token).await {
                Ok(pair) => {
                    self.bridge.tokens_refreshed(pair.clone()).await;
                    info!("Token refreshed");
                    return Ok(pair);
                }
                Err(AttemptError::Rejected(status)) => {
                    warn!(status, "Refresh token rejected, tearing session down");
                    self.bridge.session_expired().await;
                    return Err(RefreshFailure::Rejected);
                }
                Err(AttemptError::Transient(detail)) => {
                    debug!(
                        attempt = attempt + 1,
                        max_retries = self.refresh_config.max_retries,
                        detail = %detail,
                        "Transient refresh failure"
                    );
                    last_detail = detail;
                    if attempt + 1 < self.refresh_config.max_retries {
                        tokio::time::sleep(self.refresh_config.delay_for_attempt(attempt)).await;
                    }
                }
            }
        }

        warn!(
            attempts = self.refresh_config.max_retries,
            "Refresh attempts exhausted, keeping session for a later retry"
        );
        Err(RefreshFailure::Transient(last_detail))
    }

    /// Single attempt against the refresh endpoint.
    async fn try_refresh(&self, refresh_token: &str) -> Result<TokenPair, AttemptError> {
        let request = ApiRequest::new(Method::Post, REFRESH_PATH)
            .with_body(serde_json::json!({ "refresh_token": refresh_token }));

        let response = match self.transport.execute(request).await {
            Ok(r) => r,
            Err(e) => return Err(AttemptError::Transient(e.to_string())),
        };

        if response.is_success() {
            return response
                .json::<TokenPair>()
                .map_err(|e| AttemptError::Transient(format!("invalid refresh response: {e}")));
        }

        if (500..600).contains(&response.status) {
            Err(AttemptError::Transient(format!(
                "refresh endpoint returned {}",
                response.status
            )))
        } else {
            Err(AttemptError::Rejected(response.status))
        }
    }
}

/// Failure of a single refresh attempt.
enum AttemptError {
    Rejected(u16),
    Transient(String),
}

/// Whether the response is the backend's authorization-expired signal.
fn is_expiry_response(response: &ApiResponse) -> bool {
    response.status == 401
        && response
            .server_message()
            .is_some_and(|m| EXPIRY_MARKERS.contains(&m.as_str()))
}

/// Translate an HTTP-level failure into the typed error surfaced to callers.
fn typed_error(response: &ApiResponse) -> ApiError {
    ApiError::Server {
        status: response.status,
        message: response
            .server_message()
            .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::RwLock;

    /// Scripted transport: a closure decides each response, every request
    /// is recorded.
    struct FakeTransport {
        requests: Mutex<Vec<ApiRequest>>,
        handler: Box<dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync>,
    }

    impl FakeTransport {
        fn new(
            handler: impl Fn(&ApiRequest) -> Result<ApiResponse, TransportError>
                + Send
                + Sync
                + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                handler: Box::new(handler),
            })
        }

        fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn calls_to(&self, path: &str) -> usize {
            self.requests().iter().filter(|r| r.path == path).count()
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            (self.handler)(&request)
        }
    }

    /// Session owner double mirroring the manager's rules: rotation is a
    /// no-op without a session, teardown drops the tokens.
    struct FakeBridge {
        tokens: RwLock<Option<TokenPair>>,
        rotations: AtomicUsize,
        torn_down: AtomicBool,
    }

    impl FakeBridge {
        fn authenticated(token: &str, refresh: &str) -> Arc<Self> {
            Arc::new(Self {
                tokens: RwLock::new(Some(TokenPair {
                    token: token.to_string(),
                    refresh_token: refresh.to_string(),
                })),
                rotations: AtomicUsize::new(0),
                torn_down: AtomicBool::new(false),
            })
        }

        fn signed_out() -> Arc<Self> {
            Arc::new(Self {
                tokens: RwLock::new(None),
                rotations: AtomicUsize::new(0),
                torn_down: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl SessionBridge for FakeBridge {
        fn access_token(&self) -> Option<String> {
            self.tokens.read().unwrap().as_ref().map(|t| t.token.clone())
        }

        fn refresh_token(&self) -> Option<String> {
            self.tokens
                .read()
                .unwrap()
                .as_ref()
                .map(|t| t.refresh_token.clone())
        }

        async fn tokens_refreshed(&self, tokens: TokenPair) {
            let mut slot = self.tokens.write().unwrap();
            if slot.is_some() {
                *slot = Some(tokens);
                self.rotations.fetch_add(1, Ordering::SeqCst);
            }
        }

        async fn session_expired(&self) {
            *self.tokens.write().unwrap() = None;
            self.torn_down.store(true, Ordering::SeqCst);
        }
    }

    fn json_response(status: u16, body: serde_json::Value) -> ApiResponse {
        ApiResponse {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    fn expired_response() -> ApiResponse {
        json_response(401, serde_json::json!({ "message": "token.expired" }))
    }

    fn fresh_pair_response() -> ApiResponse {
        json_response(
            200,
            serde_json::json!({ "token": "fresh-access", "refresh_token": "fresh-refresh" }),
        )
    }

    fn fast_refresh_config() -> RefreshConfig {
        RefreshConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    /// Expired bearer on protected paths, one working refresh endpoint.
    fn refreshable_backend(
    ) -> impl Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static {
        |request: &ApiRequest| {
            if request.path == REFRESH_PATH {
                return Ok(fresh_pair_response());
            }
            match request.bearer.as_deref() {
                Some("fresh-access") => Ok(json_response(200, serde_json::json!({ "ok": true }))),
                _ => Ok(expired_response()),
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_expired_requests_share_one_refresh() {
        let transport = FakeTransport::new(refreshable_backend());
        let bridge = FakeBridge::authenticated("stale-access", "valid-refresh");
        let pipeline = ApiPipeline::new(transport.clone(), bridge.clone());

        let calls = (0..8).map(|i| {
            let path = format!("/exercises/{i}");
            let pipeline = &pipeline;
            async move { pipeline.request(Method::Get, &path, None).await }
        });
        let results = join_all(calls).await;

        for result in results {
            assert!(result.unwrap().is_success());
        }
        assert_eq!(transport.calls_to(REFRESH_PATH), 1);
        assert_eq!(bridge.rotations.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.access_token().as_deref(), Some("fresh-access"));
    }

    #[tokio::test]
    async fn replay_carries_the_rotated_token() {
        let transport = FakeTransport::new(refreshable_backend());
        let bridge = FakeBridge::authenticated("stale-access", "valid-refresh");
        let pipeline = ApiPipeline::new(transport.clone(), bridge.clone());

        pipeline
            .request(Method::Get, "/groups", None)
            .await
            .unwrap();

        let bearers: Vec<Option<String>> = transport
            .requests()
            .iter()
            .filter(|r| r.path == "/groups")
            .map(|r| r.bearer.clone())
            .collect();
        assert_eq!(
            bearers,
            vec![
                Some("stale-access".to_string()),
                Some("fresh-access".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn refresh_rejection_fails_every_waiter_and_tears_down() {
        let transport = FakeTransport::new(|request: &ApiRequest| {
            if request.path == REFRESH_PATH {
                Ok(json_response(
                    401,
                    serde_json::json!({ "message": "token.invalid" }),
                ))
            } else {
                Ok(expired_response())
            }
        });
        let bridge = FakeBridge::authenticated("stale-access", "dead-refresh");
        let pipeline = ApiPipeline::new(transport.clone(), bridge.clone());

        let calls = (0..4).map(|i| {
            let path = format!("/history/{i}");
            let pipeline = &pipeline;
            async move { pipeline.request(Method::Get, &path, None).await }
        });
        let results = join_all(calls).await;

        for result in results {
            assert!(matches!(result, Err(ApiError::SessionExpired)));
        }
        assert_eq!(transport.calls_to(REFRESH_PATH), 1);
        assert!(bridge.torn_down.load(Ordering::SeqCst));
        assert!(bridge.access_token().is_none());
    }

    #[tokio::test]
    async fn transient_refresh_failures_retry_then_succeed() {
        let refresh_failures = Arc::new(AtomicUsize::new(0));
        let counter = refresh_failures.clone();
        let transport = FakeTransport::new(move |request: &ApiRequest| {
            if request.path == REFRESH_PATH {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    return Ok(ApiResponse { status: 503, body: vec![] });
                }
                return Ok(fresh_pair_response());
            }
            match request.bearer.as_deref() {
                Some("fresh-access") => Ok(json_response(200, serde_json::json!({ "ok": true }))),
                _ => Ok(expired_response()),
            }
        });
        let bridge = FakeBridge::authenticated("stale-access", "valid-refresh");
        let pipeline =
            ApiPipeline::with_refresh_config(transport.clone(), bridge.clone(), fast_refresh_config());

        let response = pipeline.request(Method::Get, "/groups", None).await.unwrap();

        assert!(response.is_success());
        assert_eq!(transport.calls_to(REFRESH_PATH), 3);
        assert!(!bridge.torn_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn transient_exhaustion_keeps_the_session() {
        let transport = FakeTransport::new(|request: &ApiRequest| {
            if request.path == REFRESH_PATH {
                Ok(ApiResponse { status: 503, body: vec![] })
            } else {
                Ok(expired_response())
            }
        });
        let bridge = FakeBridge::authenticated("stale-access", "valid-refresh");
        let pipeline =
            ApiPipeline::with_refresh_config(transport.clone(), bridge.clone(), fast_refresh_config());

        let result = pipeline.request(Method::Get, "/groups", None).await;

        assert!(matches!(result, Err(ApiError::Network(_))));
        assert_eq!(transport.calls_to(REFRESH_PATH), 3);
        assert!(!bridge.torn_down.load(Ordering::SeqCst));
        assert_eq!(bridge.access_token().as_deref(), Some("stale-access"));
    }

    #[tokio::test]
    async fn rotated_token_rejected_again_settles_as_session_expired() {
        // Backend refreshes successfully but keeps rejecting the new token;
        // the request must settle instead of looping.
        let transport = FakeTransport::new(|request: &ApiRequest| {
            if request.path == REFRESH_PATH {
                Ok(fresh_pair_response())
            } else {
                Ok(expired_response())
            }
        });
        let bridge = FakeBridge::authenticated("stale-access", "valid-refresh");
        let pipeline = ApiPipeline::new(transport.clone(), bridge.clone());

        let result = pipeline.request(Method::Get, "/groups", None).await;

        assert!(matches!(result, Err(ApiError::SessionExpired)));
        assert_eq!(transport.calls_to(REFRESH_PATH), 1);
    }

    #[tokio::test]
    async fn server_message_is_surfaced_verbatim() {
        let transport = FakeTransport::new(|_request: &ApiRequest| {
            Ok(json_response(
                400,
                serde_json::json!({ "message": "E-mail already in use." }),
            ))
        });
        let bridge = FakeBridge::signed_out();
        let pipeline = ApiPipeline::new(transport, bridge);

        let result = pipeline
            .request_public(Method::Post, "/users", Some(serde_json::json!({})))
            .await;

        match result {
            Err(ApiError::Server { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "E-mail already in use.");
            }
            other => panic!("Expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_server_message_falls_back_to_generic() {
        let transport = FakeTransport::new(|_request: &ApiRequest| {
            Ok(ApiResponse { status: 500, body: vec![] })
        });
        let bridge = FakeBridge::authenticated("access", "refresh");
        let pipeline = ApiPipeline::new(transport, bridge);

        let result = pipeline.request(Method::Get, "/groups", None).await;

        match result {
            Err(ApiError::Server { message, .. }) => {
                assert_eq!(message, GENERIC_ERROR_MESSAGE);
            }
            other => panic!("Expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_auth_failures_are_not_retried() {
        let transport = FakeTransport::new(|_request: &ApiRequest| {
            Ok(json_response(500, serde_json::json!({ "message": "boom" })))
        });
        let bridge = FakeBridge::authenticated("access", "refresh");
        let pipeline = ApiPipeline::new(transport.clone(), bridge);

        let result = pipeline.request(Method::Get, "/groups", None).await;

        assert!(matches!(result, Err(ApiError::Server { .. })));
        assert_eq!(transport.calls_to("/groups"), 1);
        assert_eq!(transport.calls_to(REFRESH_PATH), 0);
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_network_error() {
        let transport = FakeTransport::new(|_request: &ApiRequest| {
            Err(TransportError::Network("connection refused".to_string()))
        });
        let bridge = FakeBridge::authenticated("access", "refresh");
        let pipeline = ApiPipeline::new(transport.clone(), bridge);

        let result = pipeline.request(Method::Get, "/groups", None).await;

        assert!(matches!(result, Err(ApiError::Network(_))));
        assert_eq!(transport.calls_to("/groups"), 1);
    }

    #[tokio::test]
    async fn request_without_session_is_not_authenticated() {
        let transport = FakeTransport::new(|_request: &ApiRequest| {
            Ok(json_response(200, serde_json::json!({})))
        });
        let bridge = FakeBridge::signed_out();
        let pipeline = ApiPipeline::new(transport.clone(), bridge);

        let result = pipeline.request(Method::Get, "/groups", None).await;

        assert!(matches!(result, Err(ApiError::NotAuthenticated)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn plain_401_on_sign_in_does_not_refresh() {
        let transport = FakeTransport::new(|_request: &ApiRequest| {
            Ok(json_response(
                401,
                serde_json::json!({ "message": "Invalid credentials" }),
            ))
        });
        let bridge = FakeBridge::signed_out();
        let pipeline = ApiPipeline::new(transport.clone(), bridge);

        let result = pipeline
            .request_public(
                Method::Post,
                "/sessions",
                Some(serde_json::json!({ "email": "bad@x.com", "password": "wrong" })),
            )
            .await;

        match result {
            Err(ApiError::Server { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid credentials");
            }
            other => panic!("Expected server error, got {other:?}"),
        }
        assert_eq!(transport.calls_to(REFRESH_PATH), 0);
    }

    #[test]
    fn refresh_config_backoff_is_exponential_and_capped() {
        let config = RefreshConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(5000));
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(5000));
    }
}
