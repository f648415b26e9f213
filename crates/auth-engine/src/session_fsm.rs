//! Session state machine using rust-fsm.
//!
//! Session state is tracked explicitly rather than derived from storage
//! checks. `Bootstrapping` is the sole initial state and is never
//! re-entered.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │  Bootstrapping  │ (initial)
//! └────────┬────────┘
//!          │ RestoreHit / RestoreMiss
//!          ▼
//! ┌─────────────────┐  CredentialExchange  ┌─────────────────┐
//! │ Unauthenticated │ ───────────────────► │    SigningIn    │
//! └─────────────────┘                      └────────┬────────┘
//!          ▲                                        │
//!          │ SignInFailed                           │ SignInSuccess
//!          │◄───────────────────────────────────────┤
//!          │                                        ▼
//!          │ SignOutComplete              ┌─────────────────┐
//! ┌────────┴────────┐  SignOutRequested   │  Authenticated  │
//! │   SigningOut    │ ◄────────────────── └────────┬────────┘
//! └─────────────────┘                              │ RefreshRejected
//!                                                  ▼
//!                                           Unauthenticated
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Define the FSM using rust-fsm's declarative macro.
// This generates a module `session_machine` with:
// - session_machine::State (enum)
// - session_machine::Input (enum)
// - session_machine::StateMachine (type alias)
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Bootstrapping)

    Bootstrapping => {
        RestoreHit => Authenticated,
        RestoreMiss => Unauthenticated
    },
    Unauthenticated => {
        CredentialExchange => SigningIn
    },
    SigningIn => {
        SignInSuccess => Authenticated,
        SignInFailed => Unauthenticated
    },
    Authenticated => {
        SignOutRequested => SigningOut,
        RefreshRejected => Unauthenticated
    },
    SigningOut => {
        SignOutComplete => Unauthenticated
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session state for external consumption (UI, navigation gate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// Reading the persisted session at process start.
    Bootstrapping,
    /// Credential exchange in flight.
    SigningIn,
    /// Signed in with a session.
    Authenticated,
    /// Sign-out in flight.
    SigningOut,
    /// No session.
    Unauthenticated,
}

impl AuthState {
    /// True only for the `Authenticated` state.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    /// True while the persisted session is still being read.
    pub fn is_bootstrapping(&self) -> bool {
        matches!(self, AuthState::Bootstrapping)
    }
}

impl From<&SessionMachineState> for AuthState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Bootstrapping => AuthState::Bootstrapping,
            SessionMachineState::SigningIn => AuthState::SigningIn,
            SessionMachineState::Authenticated => AuthState::Authenticated,
            SessionMachineState::SigningOut => AuthState::SigningOut,
            SessionMachineState::Unauthenticated => AuthState::Unauthenticated,
        }
    }
}
