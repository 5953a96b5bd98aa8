// Core types for Docker Hub rate-limit checking

/// Registry manifest used purely to read rate-limit headers. HEAD requests
/// against it do not count towards the pull limit.
pub const PROBE_URL: &str = "https://registry-1.docker.io/v2/ratelimitpreview/test/manifests/latest";

/// Token endpoint scoped to pulling the probe repository.
pub const TOKEN_URL: &str =
    "https://auth.docker.io/token?service=registry.docker.io&scope=repository:ratelimitpreview/test:pull";

pub const HEADER_LIMIT_REMAINING: &str = "RateLimit-Remaining";
pub const HEADER_LIMIT_LIMIT: &str = "RateLimit-Limit";

/// Identity label used before any identity has been established
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Address family preference handed to IP lookup providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressFamily {
    /// Whatever the provider answers with (usually the preferred route)
    #[default]
    Auto,
    IPv4,
    IPv6,
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Auto => write!(f, "auto"),
            AddressFamily::IPv4 => write!(f, "ipv4"),
            AddressFamily::IPv6 => write!(f, "ipv6"),
        }
    }
}

/// IP lookup failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IpLookupError {
    #[error("IP lookup request failed: {0}")]
    Transport(String),
    #[error("bad HTTP response status from {url}: {status}")]
    BadStatus { url: String, status: u16 },
    #[error("unable to parse IP address: {body:?} - len={len}")]
    Unparsable { body: String, len: usize },
}

/// Rate-limit check errors
///
/// Every variant aborts the current check; none of them is fatal to the
/// process. Header parse problems never show up here, they degrade to zero.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
    #[error("HTTP request failed: {0}")]
    Transport(String),
    #[error("auth endpoint returned HTTP {0}")]
    TokenStatus(u16),
    #[error("unable to decode auth response: {0}")]
    TokenDecode(String),
    #[error("auth response did not contain a token")]
    EmptyToken,
    #[error(transparent)]
    IpLookup(#[from] IpLookupError),
}

impl From<serde_json::Error> for CheckError {
    fn from(error: serde_json::Error) -> Self {
        CheckError::TokenDecode(error.to_string())
    }
}
