//! Route graph selection and deep-link parsing.
//!
//! The gate is a pure read of the session snapshot: it holds no state and
//! is recomputed on every snapshot change.

mod deep_link;

pub use deep_link::DeepLink;

use auth_engine::SessionSnapshot;

/// Which route graph is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveGraph {
    /// Session restore still in flight: render neither graph.
    Loading,
    /// Authenticated route graph.
    App,
    /// Credential (sign-in / sign-up) route graph.
    Auth,
}

/// Select the active route graph for a session snapshot.
pub fn active_graph(snapshot: &SessionSnapshot) -> ActiveGraph {
    if snapshot.is_loading_user_storage_data {
        ActiveGraph::Loading
    } else if snapshot.state.is_authenticated() {
        ActiveGraph::App
    } else {
        ActiveGraph::Auth
    }
}
