pub mod checker;
pub mod extip;
pub mod header;
pub mod http_client;
pub mod result;
pub mod token;
pub mod types;

// Re-export commonly used items
pub use checker::{Checker, CheckerBuilder};
pub use extip::{HttpIpSource, IpProvider, IpSource};
pub use header::split_ratelimit_header;
pub use http_client::{ClockTrait, HttpClientTrait, HttpMethod, HttpRequest, HttpResponse, SystemClock};
pub use result::{AuthenticatedResult, CheckResult, InnerResult, IpFamily, UnauthenticatedResult};
pub use token::AuthToken;
pub use types::*;
