//! Constants for the remote module (timeouts, endpoints, rate limiting).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default base URL of the contents API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Media type requested on listing calls.
pub const GITHUB_JSON_ACCEPT: &str = "application/vnd.github+json";

/// Header carrying the remaining request quota on GitHub API responses.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Header carrying the quota reset time (UTC epoch seconds).
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Warning threshold for cumulative rate limit delay per host (30 seconds).
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Maximum server-mandated delay (1 hour) to prevent excessive waits.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);
