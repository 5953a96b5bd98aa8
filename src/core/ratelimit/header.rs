//! Rate-limit header parsing
//!
//! Docker Hub reports limits as `RateLimit-Limit: 100;w=21600` and
//! `RateLimit-Remaining: 76;w=21600`, the count followed by the window length
//! in seconds. Anything unparsable degrades to zero instead of failing the
//! check.

const WINDOW_SEPARATOR: &str = ";w=";

/// Split a `"<count>;w=<window>"` header value into `(count, window_secs)`.
///
/// Never panics. A missing `;w=` part yields a zero window, a malformed
/// number yields zero for that number only.
pub fn split_ratelimit_header(value: &str) -> (u64, u64) {
    let mut parts = value.splitn(2, WINDOW_SEPARATOR);
    let count = parts.next().map(parse_or_zero).unwrap_or(0);
    let window = parts.next().map(parse_or_zero).unwrap_or(0);
    (count, window)
}

fn parse_or_zero(raw: &str) -> u64 {
    raw.trim().parse().unwrap_or(0)
}
