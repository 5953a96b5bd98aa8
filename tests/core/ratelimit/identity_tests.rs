use crate::common::*;
use dhub_ratelimit::core::ratelimit::*;
use secrecy::SecretString;

#[tokio::test]
async fn test_identity_string_progression_anonymous() {
    let client = healthy_client();
    let clock = MockClock::new();
    let checker = build_checker(&client, &clock, MockIpSource::returning("203.0.113.7"), None);

    assert_eq!(checker.identity_string(), "unknown");
    assert!(!checker.has_identity());

    checker.check().await.unwrap();

    assert_eq!(checker.identity_string(), "unauth:203.0.113.7");
    assert!(checker.has_identity());
}

#[test]
fn test_identity_string_with_credentials() {
    let client = MockHttpClient::new();
    let clock = MockClock::new();
    let checker = build_checker(
        &client,
        &clock,
        MockIpSource::returning("203.0.113.7"),
        Some(("alice", "s3cret")),
    );

    assert_eq!(checker.identity_string(), "auth:alice");
    assert!(checker.has_credentials());
    assert!(checker.has_identity());
}

#[test]
fn test_password_alone_counts_as_credentials() {
    let client = MockHttpClient::new();
    let clock = MockClock::new();
    let checker = build_checker(
        &client,
        &clock,
        MockIpSource::returning("203.0.113.7"),
        Some(("", "dckr_pat_abc")),
    );

    assert!(checker.has_credentials());
    assert_eq!(checker.identity_string(), "auth:");
}

#[test]
fn test_anonymous_checker_pins_icanhazip() {
    let checker = Checker::builder()
        .http_client(MockHttpClient::new())
        .ip_provider_label("ipify")
        .build()
        .unwrap();

    assert_eq!(checker.ip_source_name(), "icanhazip");
}

#[test]
fn test_authenticated_checker_keeps_configured_provider() {
    let checker = Checker::builder()
        .http_client(MockHttpClient::new())
        .credentials("alice", SecretString::new("s3cret".to_string()))
        .ip_provider(IpProvider::MyIpIo)
        .build()
        .unwrap();

    assert_eq!(checker.ip_source_name(), "myipio");
}

#[test]
fn test_custom_ip_source_is_used_as_given() {
    let checker = Checker::builder()
        .http_client(MockHttpClient::new())
        .ip_source(Box::new(MockIpSource::returning("203.0.113.7")))
        .build()
        .unwrap();

    assert_eq!(checker.ip_source_name(), "mock");
}
