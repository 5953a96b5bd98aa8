/*!
Docker Hub rate-limit checker.

[`Checker`] is the long-lived session object behind every check: it caches
the bearer token between polls, remembers the public IP once it has been
resolved, and turns the probe's `RateLimit-*` headers into a [`CheckResult`].

## Check cycle

1. Reuse the cached token unless it has less than 30s left, otherwise fetch
   a new one (Basic auth when credentials are configured)
2. HEAD the probe manifest with `Authorization: Bearer <token>`
3. Parse `RateLimit-Remaining` / `RateLimit-Limit`
4. Wrap the numbers in the variant picked by [`Checker::has_credentials`]

Nothing is retried here. A failed check returns the error and leaves the
caches as they were; the poller decides when to try again.

## Concurrency

All methods take `&self`. The token cache sits behind a `tokio::sync::Mutex`
that is held across a refresh, so concurrent callers queue up instead of
fetching twice. The IP cache is a `OnceCell` that is only ever filled by a
successful lookup.
*/

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, OnceCell};

use crate::core::debug_logger::get_debug_logger;
use crate::core::ratelimit::extip::{HttpIpSource, IpProvider, IpSource};
use crate::core::ratelimit::header::split_ratelimit_header;
use crate::core::ratelimit::http_client::{
    ClockTrait, HttpClientTrait, HttpRequest, IsahcHttpClient, SystemClock,
};
use crate::core::ratelimit::result::{
    AuthenticatedResult, CheckResult, InnerResult, UnauthenticatedResult,
};
use crate::core::ratelimit::token::AuthToken;
use crate::core::ratelimit::types::*;

/// Builder for [`Checker`]
///
/// Mirrors the exporter's configuration surface: optional credentials and a
/// named IP provider. The HTTP client, clock, IP source and endpoints can be
/// swapped for tests.
pub struct CheckerBuilder {
    username: String,
    password: SecretString,
    ip_provider: IpProvider,
    http_client: Option<Arc<dyn HttpClientTrait>>,
    clock: Option<Box<dyn ClockTrait>>,
    ip_source: Option<Box<dyn IpSource>>,
    token_url: String,
    probe_url: String,
}

impl Default for CheckerBuilder {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: SecretString::new(String::new()),
            ip_provider: IpProvider::default(),
            http_client: None,
            clock: None,
            ip_source: None,
            token_url: TOKEN_URL.to_string(),
            probe_url: PROBE_URL.to_string(),
        }
    }
}

impl CheckerBuilder {
    /// Docker Hub account used for the token request. Empty strings mean
    /// "no credentials".
    pub fn credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.username = username.into();
        self.password = password;
        self
    }

    /// Select the IP lookup service by label (`icanhazip`, `ipify`, `myipio`)
    pub fn ip_provider_label(mut self, label: &str) -> Self {
        self.ip_provider = IpProvider::from_label(label);
        self
    }

    pub fn ip_provider(mut self, provider: IpProvider) -> Self {
        self.ip_provider = provider;
        self
    }

    /// Configure with custom HTTP client (for testing)
    pub fn http_client(mut self, client: Arc<dyn HttpClientTrait>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Configure with custom clock (for testing)
    pub fn clock(mut self, clock: Box<dyn ClockTrait>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the IP lookup entirely. Custom sources are used as given.
    pub fn ip_source(mut self, source: Box<dyn IpSource>) -> Self {
        self.ip_source = Some(source);
        self
    }

    /// Override token and probe endpoints
    pub fn endpoints(mut self, token_url: impl Into<String>, probe_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.probe_url = probe_url.into();
        self
    }

    /// Build the checker.
    ///
    /// Without credentials the only identity available is the public IP, so
    /// the lookup is pinned to icanhazip whatever provider was configured.
    ///
    /// # Errors
    ///
    /// Returns `CheckError::InvalidUrl` if an endpoint is not a valid URL.
    /// Returns `CheckError::HttpClient` if the default HTTP client cannot be created.
    pub fn build(self) -> Result<Checker, CheckError> {
        validate_url(&self.token_url)?;
        validate_url(&self.probe_url)?;

        let http_client: Arc<dyn HttpClientTrait> = match self.http_client {
            Some(client) => client,
            None => Arc::new(IsahcHttpClient::new()?),
        };

        let has_credentials =
            !self.username.is_empty() || !self.password.expose_secret().is_empty();

        let ip_source = match self.ip_source {
            Some(source) => source,
            None => {
                let provider = if has_credentials {
                    self.ip_provider
                } else {
                    if self.ip_provider != IpProvider::ICanHazIp {
                        get_debug_logger().debug(
                            "Checker",
                            "ip_provider_fallback",
                            &format!(
                                "No credentials configured, using {} instead of {} for identity lookup",
                                IpProvider::ICanHazIp,
                                self.ip_provider
                            ),
                        );
                    }
                    IpProvider::ICanHazIp
                };
                Box::new(HttpIpSource::new(provider, Arc::clone(&http_client)))
            }
        };

        Ok(Checker {
            http_client,
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
            ip_source,
            username: self.username,
            password: self.password,
            token_url: self.token_url,
            probe_url: self.probe_url,
            token: Mutex::new(None),
            cached_ip: OnceCell::new(),
        })
    }
}

fn validate_url(raw: &str) -> Result<(), CheckError> {
    url::Url::parse(raw)
        .map(|_| ())
        .map_err(|e| CheckError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Rate-limit checking session
pub struct Checker {
    http_client: Arc<dyn HttpClientTrait>,
    clock: Box<dyn ClockTrait>,
    ip_source: Box<dyn IpSource>,
    username: String,
    password: SecretString,
    token_url: String,
    probe_url: String,
    /// At most one bearer token, replaced wholesale on refresh
    token: Mutex<Option<AuthToken>>,
    /// Public IP, set by the first successful lookup
    cached_ip: OnceCell<IpAddr>,
}

impl Checker {
    pub fn builder() -> CheckerBuilder {
        CheckerBuilder::default()
    }

    /// Checker with no credentials and the default HTTP client
    pub fn new() -> Result<Self, CheckError> {
        Self::builder().build()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Name of the IP source in use
    pub fn ip_source_name(&self) -> &str {
        self.ip_source.name()
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() || !self.password.expose_secret().is_empty()
    }

    /// True once a label other than "unknown" can be produced
    pub fn has_identity(&self) -> bool {
        self.cached_ip.get().is_some() || self.has_credentials()
    }

    /// Stable identity label for metrics and logs.
    ///
    /// `"unknown"` until an identity exists, then `"auth:<username>"` or
    /// `"unauth:<ip>"`. Never performs a lookup.
    pub fn identity_string(&self) -> String {
        if self.has_credentials() {
            return format!("auth:{}", self.username);
        }
        match self.cached_ip.get() {
            Some(ip) => format!("unauth:{}", ip),
            None => UNKNOWN_IDENTITY.to_string(),
        }
    }

    /// Public IP of this host, resolved on first use and cached afterwards.
    ///
    /// The family only matters for the first successful lookup. Failures are
    /// returned and not cached, so the next call asks the provider again.
    pub async fn ip_address(&self, family: AddressFamily) -> Result<IpAddr, CheckError> {
        let ip = self
            .cached_ip
            .get_or_try_init(|| async {
                let ip = self.ip_source.resolve(family).await?;
                get_debug_logger().ip_resolved(self.ip_source.name(), &ip.to_string());
                Ok::<IpAddr, IpLookupError>(ip)
            })
            .await?;
        Ok(*ip)
    }

    /// Currently cached token, if any (no refresh)
    pub async fn cached_token(&self) -> Option<AuthToken> {
        self.token.lock().await.clone()
    }

    /// Return a token with at least 30s of validity, fetching one if needed.
    ///
    /// # Errors
    ///
    /// Returns `CheckError::Transport` when the token endpoint is unreachable,
    /// `CheckError::TokenStatus` on a non-2xx answer and
    /// `CheckError::TokenDecode` / `CheckError::EmptyToken` for unusable
    /// bodies. The cached token is left untouched in every error case.
    pub async fn get_auth_token(&self) -> Result<AuthToken, CheckError> {
        let mut cached = self.token.lock().await;
        let now = self.clock.now();

        if let Some(token) = cached.as_ref() {
            if !token.expires_soon(now) {
                return Ok(token.clone());
            }
        }

        let debug_logger = get_debug_logger();
        let mut request = HttpRequest::get(self.token_url.as_str());
        if self.has_credentials() {
            debug_logger.debug("Checker", "token_request", "Using Docker Hub auth credentials");
            request = request.with_basic_auth(&self.username, self.password.expose_secret());
        } else {
            debug_logger.debug("Checker", "token_request", "Using Docker Hub without credentials");
        }

        let response = self
            .http_client
            .execute_request(request)
            .await
            .map_err(CheckError::Transport)?;

        if !response.is_success() {
            return Err(CheckError::TokenStatus(response.status_code));
        }

        let token = AuthToken::from_json(&response.body, self.clock.now())?;
        debug_logger.token_refreshed(self.has_credentials(), &token.expires_at().to_rfc3339());

        *cached = Some(token.clone());
        Ok(token)
    }

    /// Run one rate-limit check.
    ///
    /// Dropping the returned future cancels the in-flight request; wrap it in
    /// `tokio::time::timeout` for a deadline.
    ///
    /// # Errors
    ///
    /// Token, transport and IP lookup failures abort the check. Malformed or
    /// missing rate-limit headers do not, they read as zero.
    pub async fn check(&self) -> Result<CheckResult, CheckError> {
        let started = Instant::now();
        let probe_id = format!("check_{}", uuid::Uuid::new_v4());

        let token = self.get_auth_token().await?;
        let request = HttpRequest::head(self.probe_url.as_str())
            .with_header("Authorization", token.bearer_header());

        let response = self
            .http_client
            .execute_request(request)
            .await
            .map_err(CheckError::Transport)?;

        if !response.is_success() {
            get_debug_logger().warn(
                "Checker",
                "probe_status",
                &format!("Rate-limit probe answered HTTP {}", response.status_code),
            );
        }

        let remaining = response
            .header(HEADER_LIMIT_REMAINING)
            .map(split_ratelimit_header);
        let limit = response.header(HEADER_LIMIT_LIMIT).map(split_ratelimit_header);

        let (pull_remaining, remaining_window) = remaining.unwrap_or_default();
        let (pull_limit, limit_window) = limit.unwrap_or_default();
        let window_secs = if limit.is_some() {
            limit_window
        } else {
            remaining_window
        };

        let authenticated = self.has_credentials();
        let inner = InnerResult {
            pull_limit,
            pull_remaining,
            checked_at: self.clock.now(),
            window: std::time::Duration::from_secs(window_secs),
            authenticated,
        };

        let result = if authenticated {
            CheckResult::Authenticated(AuthenticatedResult {
                inner,
                username: self.username.clone(),
            })
        } else {
            CheckResult::Unauthenticated(UnauthenticatedResult {
                inner,
                ip_address: self.ip_address(AddressFamily::IPv4).await?,
            })
        };

        get_debug_logger().probe_end(
            &self.identity_string(),
            response.status_code,
            result.limit(),
            result.remaining(),
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            probe_id,
        );

        Ok(result)
    }
}
