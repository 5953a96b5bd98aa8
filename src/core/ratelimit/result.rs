//! Check results
//!
//! A check produces exactly one [`CheckResult`]. The variant is decided by
//! whether the checker holds credentials, never by the HTTP response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Fields shared by both result variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerResult {
    pub pull_limit: u64,
    pub pull_remaining: u64,
    pub checked_at: DateTime<Utc>,
    /// Length of the rate-limit window, whole seconds on the wire
    #[serde(rename = "window_seconds", with = "window_seconds")]
    pub window: Duration,
    pub authenticated: bool,
}

mod window_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(window: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(window.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Result of a check made with Docker Hub credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedResult {
    #[serde(flatten)]
    pub inner: InnerResult,
    pub username: String,
}

/// Result of an anonymous check, attributed to the caller's public IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "UnauthenticatedWire", from = "UnauthenticatedWire")]
pub struct UnauthenticatedResult {
    pub inner: InnerResult,
    pub ip_address: IpAddr,
}

#[derive(Serialize, Deserialize)]
struct UnauthenticatedWire {
    #[serde(flatten)]
    inner: InnerResult,
    ip_address: IpAddr,
    #[serde(default)]
    ip_family: IpFamily,
}

impl From<UnauthenticatedResult> for UnauthenticatedWire {
    fn from(result: UnauthenticatedResult) -> Self {
        Self {
            ip_family: IpFamily::of(&result.ip_address),
            inner: result.inner,
            ip_address: result.ip_address,
        }
    }
}

// ip_family is derived data, the address is authoritative
impl From<UnauthenticatedWire> for UnauthenticatedResult {
    fn from(wire: UnauthenticatedWire) -> Self {
        Self {
            inner: wire.inner,
            ip_address: wire.ip_address,
        }
    }
}

/// Address family label emitted next to an IP address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    Inet,
    Inet6,
    #[default]
    #[serde(other)]
    Unknown,
}

impl IpFamily {
    /// Classify by address type. IPv4-mapped IPv6 addresses count as IPv4.
    pub fn of(address: &IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => IpFamily::Inet,
            IpAddr::V6(v6) if v6.to_ipv4_mapped().is_some() => IpFamily::Inet,
            IpAddr::V6(_) => IpFamily::Inet6,
        }
    }
}

/// Outcome of one successful rate-limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckResult {
    Authenticated(AuthenticatedResult),
    Unauthenticated(UnauthenticatedResult),
}

impl CheckResult {
    pub fn inner(&self) -> &InnerResult {
        match self {
            CheckResult::Authenticated(result) => &result.inner,
            CheckResult::Unauthenticated(result) => &result.inner,
        }
    }

    pub fn limit(&self) -> u64 {
        self.inner().pull_limit
    }

    pub fn remaining(&self) -> u64 {
        self.inner().pull_remaining
    }

    pub fn window(&self) -> Duration {
        self.inner().window
    }

    /// Window length in seconds, the unit Docker Hub reports it in
    pub fn window_seconds(&self) -> u64 {
        self.inner().window.as_secs()
    }

    pub fn checked_at(&self) -> DateTime<Utc> {
        self.inner().checked_at
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, CheckResult::Authenticated(_))
    }

    /// Username for authenticated results, IP address otherwise
    pub fn identity(&self) -> String {
        match self {
            CheckResult::Authenticated(result) => result.username.clone(),
            CheckResult::Unauthenticated(result) => result.ip_address.to_string(),
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
