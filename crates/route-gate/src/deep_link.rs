//! Deep-link parsing.
//!
//! The client registers two external schemes; the only mapped pattern is
//! `<scheme>://exercise/<exercise_id>`, which lands on the exercise screen
//! of the authenticated graph. Malformed links simply fail to match; the
//! router never errors on them.

use url::Url;

/// External schemes the client accepts.
const SCHEMES: [&str; 2] = ["liftlog", "com.liftlog.app"];

/// Host naming the exercise screen.
const EXERCISE_HOST: &str = "exercise";

/// An in-app target parsed from an external link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLink {
    /// The exercise detail screen.
    Exercise { exercise_id: String },
}

impl DeepLink {
    /// Parse an external link into an in-app target.
    ///
    /// Returns `None` for anything that does not match: unknown schemes,
    /// unknown screens, missing or extra path segments, unparseable URLs.
    pub fn parse(link: &str) -> Option<Self> {
        let url = Url::parse(link).ok()?;

        if !SCHEMES.contains(&url.scheme()) {
            return None;
        }
        if url.host_str() != Some(EXERCISE_HOST) {
            return None;
        }

        let mut segments = url.path_segments()?;
        let exercise_id = segments.next().filter(|s| !s.is_empty())?;
        if segments.next().is_some() {
            return None;
        }

        Some(DeepLink::Exercise {
            exercise_id: exercise_id.to_string(),
        })
    }
}
