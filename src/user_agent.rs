//! User-Agent string sent with every listing and content request.
//!
//! The GitHub API rejects requests without a User-Agent, so one is always set.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/repofetch";

/// Default User-Agent for remote requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("repofetch/{version} (+{PROJECT_UA_URL})")
}
