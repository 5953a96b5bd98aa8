/*!
HTTP and clock abstractions for the rate-limit checker.

The checker, the token cache and the IP providers all talk to the network
through [`HttpClientTrait`] so tests can script responses without sockets.
Production traffic goes through isahc.

## Dependencies

- `isahc`: async HTTP client (curl based), also handles Basic auth
- `chrono`: UTC timestamps for token expiry and check times
*/

use crate::core::ratelimit::types::CheckError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use isahc::auth::{Authentication, Credentials};
use isahc::config::Configurable;
use isahc::{AsyncReadResponseExt, HttpClient, Request};

/// HTTP methods used by the checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
}

/// Basic-auth pair attached to a request
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Outgoing request description
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub basic_auth: Option<BasicAuth>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, url)
    }

    fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            basic_auth: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }
}

/// Response data the checker cares about
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
    /// Response body (empty for HEAD)
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// HTTP client abstraction for dependency injection and testing
#[async_trait::async_trait]
pub trait HttpClientTrait: Send + Sync {
    /// Execute a request and return status, headers and body.
    ///
    /// Transport-level failures are returned as `Err(String)`; any HTTP status,
    /// including 4xx/5xx, is a successful response at this layer.
    async fn execute_request(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

/// Clock abstraction for dependency injection and testing
pub trait ClockTrait: Send + Sync {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock implementation using system time
#[derive(Debug, Default)]
pub struct SystemClock;

impl ClockTrait for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Production HTTP client implementation using isahc
pub struct IsahcHttpClient {
    client: HttpClient,
}

impl IsahcHttpClient {
    pub fn new() -> Result<Self, CheckError> {
        let client = HttpClient::new()
            .map_err(|e| CheckError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl HttpClientTrait for IsahcHttpClient {
    async fn execute_request(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let mut builder = match request.method {
            HttpMethod::Get => Request::get(&request.url),
            HttpMethod::Head => Request::head(&request.url),
        };

        if let Some(auth) = &request.basic_auth {
            builder = builder
                .authentication(Authentication::basic())
                .credentials(Credentials::new(
                    auth.username.as_str(),
                    auth.password.as_str(),
                ));
        }

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let http_request = builder
            .body(Vec::new())
            .map_err(|e| format!("Request creation failed: {}", e))?;

        let mut response = self
            .client
            .send_async(http_request)
            .await
            .map_err(|e| format!("Request failed: {}", e))?;

        let status_code = response.status().as_u16();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(value_str) = value.to_str() {
                headers.insert(key.as_str().to_ascii_lowercase(), value_str.to_string());
            }
        }

        let body = match request.method {
            HttpMethod::Head => Vec::new(),
            HttpMethod::Get => response
                .bytes()
                .await
                .map_err(|e| format!("Failed to read response body: {}", e))?
                .to_vec(),
        };

        Ok(HttpResponse {
            status_code,
            headers,
            body,
        })
    }
}
