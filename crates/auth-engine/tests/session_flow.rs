//! End-to-end session lifecycle against a scripted backend: bootstrap,
//! sign-in, token expiry with single-flight refresh, forced teardown, and
//! sign-out.

use api_pipeline::{ApiError, ApiRequest, ApiResponse, HttpTransport, Method, TransportError};
use async_trait::async_trait;
use auth_engine::{AuthState, SessionManager};
use futures_util::future::join_all;
use secure_store::{SecureStorage, SessionVault, StorageResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory storage shareable between manager instances.
#[derive(Clone)]
struct SharedMemoryStorage {
    data: Arc<Mutex<HashMap<String, String>>>,
}

impl SharedMemoryStorage {
    fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn vault(&self) -> SessionVault {
        SessionVault::new(Box::new(self.clone()))
    }
}

impl SecureStorage for SharedMemoryStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().unwrap().remove(key).is_some())
    }
}

/// Backend double with a rotating access token.
///
/// Sign-in issues generation 1; each refresh rotates to the next
/// generation. Protected endpoints accept only the current generation.
struct TestBackend {
    generation: Mutex<u32>,
    refresh_calls: AtomicUsize,
    reject_refresh: bool,
}

impl TestBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            generation: Mutex::new(1),
            refresh_calls: AtomicUsize::new(0),
            reject_refresh: false,
        })
    }

    fn rejecting_refresh() -> Arc<Self> {
        Arc::new(Self {
            generation: Mutex::new(1),
            refresh_calls: AtomicUsize::new(0),
            reject_refresh: true,
        })
    }

    fn access_token(generation: u32) -> String {
        format!("access-{generation}")
    }

    fn refresh_token(generation: u32) -> String {
        format!("refresh-{generation}")
    }

    /// Invalidate the currently issued access token, as the server does
    /// when it expires.
    fn expire_current_token(&self) {
        *self.generation.lock().unwrap() += 1;
    }

    fn json(status: u16, body: serde_json::Value) -> ApiResponse {
        ApiResponse {
            status,
            body: body.to_string().into_bytes(),
        }
    }
}

#[async_trait]
impl HttpTransport for TestBackend {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        match request.path.as_str() {
            "/sessions" => {
                let generation = *self.generation.lock().unwrap();
                Ok(Self::json(
                    200,
                    serde_json::json!({
                        "user": { "id": "user-1", "name": "Ada", "email": "ada@example.com" },
                        "token": Self::access_token(generation),
                        "refresh_token": Self::refresh_token(generation),
                    }),
                ))
            }
            "/sessions/refresh-token" => {
                self.refresh_calls.fetch_add(1, Ordering::SeqCst);
                if self.reject_refresh {
                    return Ok(Self::json(
                        401,
                        serde_json::json!({ "message": "token.invalid" }),
                    ));
                }
                let generation = *self.generation.lock().unwrap();
                Ok(Self::json(
                    200,
                    serde_json::json!({
                        "token": Self::access_token(generation),
                        "refresh_token": Self::refresh_token(generation),
                    }),
                ))
            }
            _ => {
                let generation = *self.generation.lock().unwrap();
                if request.bearer.as_deref() == Some(Self::access_token(generation).as_str()) {
                    Ok(Self::json(200, serde_json::json!({ "ok": true })))
                } else {
                    Ok(Self::json(
                        401,
                        serde_json::json!({ "message": "token.expired" }),
                    ))
                }
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn expired_token_is_refreshed_once_across_concurrent_requests() {
    let storage = SharedMemoryStorage::new();
    let backend = TestBackend::new();
    let manager = SessionManager::new(storage.vault(), backend.clone());

    manager.bootstrap().await.unwrap();
    assert_eq!(manager.auth_state(), AuthState::Unauthenticated);

    manager.sign_in("ada@example.com", "secret123").await.unwrap();
    assert_eq!(manager.auth_state(), AuthState::Authenticated);

    // Server-side expiry: the issued access token stops working.
    backend.expire_current_token();

    let pipeline = manager.pipeline();
    let calls = (0..6).map(|i| {
        let pipeline = pipeline.clone();
        let path = format!("/exercises/{i}");
        async move { pipeline.request(Method::Get, &path, None).await }
    });
    let results = join_all(calls).await;

    for result in results {
        assert!(result.unwrap().is_success());
    }
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);

    // The rotated pair was persisted: a restart restores a session that
    // the backend still accepts.
    let restarted = SessionManager::new(storage.vault(), backend.clone());
    restarted.bootstrap().await.unwrap();
    assert_eq!(restarted.auth_state(), AuthState::Authenticated);
    let response = restarted
        .pipeline()
        .request(Method::Get, "/groups", None)
        .await
        .unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn rejected_refresh_forces_sign_out() {
    let storage = SharedMemoryStorage::new();
    let backend = TestBackend::rejecting_refresh();
    let manager = SessionManager::new(storage.vault(), backend.clone());

    manager.bootstrap().await.unwrap();
    manager.sign_in("ada@example.com", "secret123").await.unwrap();
    backend.expire_current_token();

    let result = manager
        .pipeline()
        .request(Method::Get, "/exercises/1", None)
        .await;

    assert!(matches!(result, Err(ApiError::SessionExpired)));
    assert_eq!(manager.auth_state(), AuthState::Unauthenticated);
    assert!(manager.user().is_none());
    assert!(storage.vault().load().is_none());
}

#[tokio::test]
async fn sign_out_is_durable_across_restart() {
    let storage = SharedMemoryStorage::new();
    let backend = TestBackend::new();
    let manager = SessionManager::new(storage.vault(), backend.clone());

    manager.bootstrap().await.unwrap();
    manager.sign_in("ada@example.com", "secret123").await.unwrap();
    manager.sign_out().await;

    let restarted = SessionManager::new(storage.vault(), backend);
    restarted.bootstrap().await.unwrap();
    assert_eq!(restarted.auth_state(), AuthState::Unauthenticated);
}
