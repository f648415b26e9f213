//! Session lifecycle management for the Liftlog client.
//!
//! This crate provides:
//! - An explicit FSM for session state (bootstrapping, signing in, signed
//!   in, signing out)
//! - [`SessionManager`], the single owner of the in-memory session and the
//!   only writer to the session vault
//! - The [`api_pipeline::SessionBridge`] implementation the pipeline uses
//!   for token rotation and forced teardown

mod error;
mod manager;
mod session_fsm;

pub use error::{AuthError, AuthResult};
pub use manager::{SessionManager, SessionSnapshot};
pub use session_fsm::session_machine;
pub use session_fsm::{AuthState, SessionMachine, SessionMachineInput, SessionMachineState};
