//! Session manager: the single owner of the in-memory session.
//!
//! The FSM tracks transient states (bootstrapping, signing in, signing out)
//! while the session data itself lives in one slot guarded here. Every
//! state change is published on a watch channel; the navigation gate and
//! screens read that snapshot instead of poking at internals.

use crate::error::{AuthError, AuthResult};
use crate::session_fsm::{AuthState, SessionMachine, SessionMachineInput};
use api_pipeline::{ApiPipeline, HttpTransport, Method, RefreshConfig, SessionBridge};
use async_trait::async_trait;
use secure_store::SessionVault;
use session_types::{Session, SessionPayload, TokenPair, User, UserPatch};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Credential-exchange endpoint.
const SESSIONS_PATH: &str = "/sessions";
/// Account-creation endpoint.
const USERS_PATH: &str = "/users";

/// Point-in-time view of the session published to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Signed-in user, if any.
    pub user: Option<User>,
    /// True until the persisted session has been read at process start.
    pub is_loading_user_storage_data: bool,
    /// Current session state.
    pub state: AuthState,
}

impl SessionSnapshot {
    fn bootstrapping() -> Self {
        Self {
            user: None,
            is_loading_user_storage_data: true,
            state: AuthState::Bootstrapping,
        }
    }
}

/// Session manager for the client.
///
/// Owns the session slot, the FSM, the vault, and the API pipeline. One
/// instance per app; tests instantiate isolated instances over in-memory
/// storage and scripted transports.
pub struct SessionManager {
    core: Arc<SessionCore>,
    pipeline: Arc<ApiPipeline>,
}

pub(crate) struct SessionCore {
    vault: SessionVault,
    session: RwLock<Option<Session>>,
    fsm: Mutex<SessionMachine>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionManager {
    /// Create a new session manager over the given vault and transport.
    pub fn new(vault: SessionVault, transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_refresh_config(vault, transport, RefreshConfig::default())
    }

    /// Create a session manager with custom refresh retry behavior.
    pub fn with_refresh_config(
        vault: SessionVault,
        transport: Arc<dyn HttpTransport>,
        refresh_config: RefreshConfig,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::bootstrapping());
        let core = Arc::new(SessionCore {
            vault,
            session: RwLock::new(None),
            fsm: Mutex::new(SessionMachine::new()),
            snapshot_tx,
        });
        let bridge: Arc<dyn SessionBridge> = core.clone();
        let pipeline = Arc::new(ApiPipeline::with_refresh_config(
            transport,
            bridge,
            refresh_config,
        ));
        Self { core, pipeline }
    }

    /// The pipeline screens use for their own API calls.
    pub fn pipeline(&self) -> Arc<ApiPipeline> {
        self.pipeline.clone()
    }

    /// Subscribe to session snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.core.snapshot_tx.subscribe()
    }

    /// Current session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.core.snapshot_tx.borrow().clone()
    }

    /// Current session state.
    pub fn auth_state(&self) -> AuthState {
        self.core.auth_state()
    }

    /// Signed-in user, if any.
    pub fn user(&self) -> Option<User> {
        self.core.session.read().unwrap().as_ref().map(|s| s.user.clone())
    }

    /// Read the persisted session; runs once at process start.
    ///
    /// A vault hit adopts the stored session and lands `Authenticated`; a
    /// miss (including corrupt or partial records; the vault folds every
    /// failure mode into a miss) lands `Unauthenticated`. Either way the
    /// loading flag settles to false.
    pub async fn bootstrap(&self) -> AuthResult<()> {
        if !self.core.auth_state().is_bootstrapping() {
            return Err(AuthError::InvalidStateTransition(
                "bootstrap can only run once, at process start".to_string(),
            ));
        }

        match self.core.vault.load() {
            Some(session) => {
                info!(user_id = %session.user.id, "Restored persisted session");
                *self.core.session.write().unwrap() = Some(session);
                self.core.transition(&SessionMachineInput::RestoreHit)?;
            }
            None => {
                info!("No persisted session found");
                self.core.transition(&SessionMachineInput::RestoreMiss)?;
            }
        }
        Ok(())
    }

    /// Exchange credentials for a session.
    ///
    /// On success the returned session is persisted and adopted. On failure
    /// the typed error propagates untouched (no retry) and the state
    /// returns to `Unauthenticated`.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<()> {
        self.core
            .transition(&SessionMachineInput::CredentialExchange)?;

        let result = self
            .pipeline
            .request_public(
                Method::Post,
                SESSIONS_PATH,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;

        let payload = match result {
            Ok(response) => match response.json::<SessionPayload>() {
                Ok(payload) => payload,
                Err(e) => {
                    self.core.transition(&SessionMachineInput::SignInFailed)?;
                    return Err(AuthError::MalformedResponse(e.to_string()));
                }
            },
            Err(e) => {
                self.core.transition(&SessionMachineInput::SignInFailed)?;
                return Err(AuthError::Api(e));
            }
        };

        let session: Session = payload.into();
        if let Err(e) = self.core.vault.save(&session) {
            warn!(error = %e, "Failed to persist session after sign-in");
            self.core.transition(&SessionMachineInput::SignInFailed)?;
            return Err(AuthError::Storage(e));
        }

        let user_id = session.user.id.clone();
        *self.core.session.write().unwrap() = Some(session);
        self.core.transition(&SessionMachineInput::SignInSuccess)?;
        info!(user_id = %user_id, "Signed in");
        Ok(())
    }

    /// Create an account, then sign in with the same credentials.
    ///
    /// The partial-failure case (account created, sign-in failed) surfaces
    /// as [`AuthError::AccountCreatedSignInFailed`] so the UI can direct
    /// the user to sign in manually rather than retry account creation.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> AuthResult<()> {
        self.pipeline
            .request_public(
                Method::Post,
                USERS_PATH,
                Some(serde_json::json!({ "name": name, "email": email, "password": password })),
            )
            .await
            .map_err(AuthError::Api)?;

        info!(email = %email, "Account created, signing in");
        self.sign_in(email, password)
            .await
            .map_err(|e| AuthError::AccountCreatedSignInFailed { source: Box::new(e) })
    }

    /// Merge a partial update into the current user and re-persist.
    ///
    /// Fields the patch leaves unset keep their prior value; updating the
    /// avatar never regresses a name the client already knows.
    pub async fn update_profile(&self, patch: UserPatch) -> AuthResult<User> {
        let updated = {
            let mut guard = self.core.session.write().unwrap();
            let session = guard.as_mut().ok_or(AuthError::NotAuthenticated)?;
            session.user.apply(patch);
            session.user.clone()
        };
        self.core.publish_snapshot();

        self.core.vault.save_user(&updated)?;
        debug!(user_id = %updated.id, "Profile updated");
        Ok(updated)
    }

    /// Drop the session and clear the vault.
    ///
    /// Unconditionally succeeds from the caller's perspective: a storage
    /// fault during the clear is logged and swallowed.
    pub async fn sign_out(&self) {
        let _ = self.core.transition(&SessionMachineInput::SignOutRequested);

        if let Err(e) = self.core.vault.clear() {
            warn!(error = %e, "Failed to clear persisted session during sign-out");
        }
        *self.core.session.write().unwrap() = None;

        let _ = self.core.transition(&SessionMachineInput::SignOutComplete);
        self.core.publish_snapshot();
        info!("Signed out");
    }
}

impl SessionCore {
    fn auth_state(&self) -> AuthState {
        AuthState::from(self.fsm.lock().unwrap().state())
    }

    /// Transition the FSM and publish a snapshot if the state changed.
    fn transition(&self, input: &SessionMachineInput) -> AuthResult<AuthState> {
        let mut fsm = self.fsm.lock().unwrap();
        let old_state = AuthState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = AuthState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Session state transition"
            );
            self.publish_snapshot();
        }

        Ok(new_state)
    }

    fn publish_snapshot(&self) {
        let state = self.auth_state();
        let user = self.session.read().unwrap().as_ref().map(|s| s.user.clone());
        self.snapshot_tx.send_replace(SessionSnapshot {
            user,
            is_loading_user_storage_data: state.is_bootstrapping(),
            state,
        });
    }
}

#[async_trait]
impl SessionBridge for SessionCore {
    fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap()
            .as_ref()
            .map(|s| s.tokens.token.clone())
    }

    fn refresh_token(&self) -> Option<String> {
        self.session
            .read()
            .unwrap()
            .as_ref()
            .map(|s| s.tokens.refresh_token.clone())
    }

    async fn tokens_refreshed(&self, tokens: TokenPair) {
        {
            let mut guard = self.session.write().unwrap();
            match guard.as_mut() {
                Some(session) => session.tokens = tokens.clone(),
                None => {
                    // Signed out while the refresh was in flight; the
                    // teardown is authoritative.
                    debug!("Discarding rotated tokens after sign-out");
                    return;
                }
            }
        }
        if let Err(e) = self.vault.save_tokens(&tokens) {
            warn!(error = %e, "Failed to persist rotated tokens");
        }
    }

    async fn session_expired(&self) {
        warn!("Refresh token rejected, tearing session down");
        if let Err(e) = self.vault.clear() {
            warn!(error = %e, "Failed to clear persisted session during teardown");
        }
        *self.session.write().unwrap() = None;
        let _ = self.transition(&SessionMachineInput::RefreshRejected);
        self.publish_snapshot();
    }
}
