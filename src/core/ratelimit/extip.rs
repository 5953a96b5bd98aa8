//! External IP lookup
//!
//! Anonymous Docker Hub pulls are counted per public IP, so unauthenticated
//! results are labelled with the address the outside world sees. The lookup
//! is delegated to one of a few plain-text "what is my IP" services.

use std::net::IpAddr;
use std::sync::Arc;

use crate::core::ratelimit::http_client::{HttpClientTrait, HttpRequest};
use crate::core::ratelimit::types::{AddressFamily, IpLookupError};

/// Pluggable public IP resolver
#[async_trait::async_trait]
pub trait IpSource: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    async fn resolve(&self, family: AddressFamily) -> Result<IpAddr, IpLookupError>;
}

/// Built-in lookup services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpProvider {
    #[default]
    ICanHazIp,
    Ipify,
    MyIpIo,
}

impl IpProvider {
    /// Map a configuration label to a provider; unknown labels use icanhazip.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "ipify" => IpProvider::Ipify,
            "myipio" => IpProvider::MyIpIo,
            _ => IpProvider::ICanHazIp,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IpProvider::ICanHazIp => "icanhazip",
            IpProvider::Ipify => "ipify",
            IpProvider::MyIpIo => "myipio",
        }
    }

    fn domain(&self) -> &'static str {
        match self {
            IpProvider::ICanHazIp => "icanhazip.com",
            IpProvider::Ipify => "ipify.org",
            IpProvider::MyIpIo => "my-ip.io",
        }
    }

    fn path(&self) -> &'static str {
        match self {
            IpProvider::MyIpIo => "ip",
            _ => "",
        }
    }

    fn subdomain(&self, family: AddressFamily) -> &'static str {
        match (self, family) {
            (IpProvider::ICanHazIp, AddressFamily::Auto) => "",
            (IpProvider::ICanHazIp, AddressFamily::IPv4) => "ipv4.",
            (IpProvider::ICanHazIp, AddressFamily::IPv6) => "ipv6.",
            (IpProvider::Ipify, AddressFamily::Auto) => "api64.",
            (IpProvider::Ipify, AddressFamily::IPv4) => "api.",
            (IpProvider::Ipify, AddressFamily::IPv6) => "api6.",
            (IpProvider::MyIpIo, AddressFamily::Auto) => "api4.",
            (IpProvider::MyIpIo, AddressFamily::IPv4) => "api.",
            (IpProvider::MyIpIo, AddressFamily::IPv6) => "api6.",
        }
    }

    /// Lookup URL for the requested address family
    pub fn endpoint(&self, family: AddressFamily) -> String {
        format!(
            "https://{}{}/{}",
            self.subdomain(family),
            self.domain(),
            self.path()
        )
    }
}

impl std::fmt::Display for IpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// [`IpSource`] backed by one of the built-in HTTP services
pub struct HttpIpSource {
    provider: IpProvider,
    client: Arc<dyn HttpClientTrait>,
}

impl HttpIpSource {
    pub fn new(provider: IpProvider, client: Arc<dyn HttpClientTrait>) -> Self {
        Self { provider, client }
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    fn name(&self) -> &str {
        self.provider.label()
    }

    async fn resolve(&self, family: AddressFamily) -> Result<IpAddr, IpLookupError> {
        let url = self.provider.endpoint(family);
        let response = self
            .client
            .execute_request(HttpRequest::get(url.clone()))
            .await
            .map_err(IpLookupError::Transport)?;

        if response.status_code != 200 {
            return Err(IpLookupError::BadStatus {
                url,
                status: response.status_code,
            });
        }

        parse_ip_body(&response.body)
    }
}

/// Parse a plain-text IP response, ignoring surrounding whitespace
pub fn parse_ip_body(body: &[u8]) -> Result<IpAddr, IpLookupError> {
    let text = String::from_utf8_lossy(body);
    text.trim()
        .parse::<IpAddr>()
        .map_err(|_| IpLookupError::Unparsable {
            body: text.to_string(),
            len: body.len(),
        })
}
