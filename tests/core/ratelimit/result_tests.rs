use crate::common::*;
use dhub_ratelimit::core::ratelimit::*;
use serde_json::Value;

#[tokio::test]
async fn test_authenticated_json_round_trip() {
    let client = healthy_client();
    let clock = MockClock::new();
    let checker = build_checker(
        &client,
        &clock,
        MockIpSource::returning("203.0.113.7"),
        Some(("alice", "s3cret")),
    );
    let result = checker.check().await.unwrap();

    let bytes = result.to_json_bytes().unwrap();
    let decoded: CheckResult = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(decoded, result);
    assert_eq!(decoded.limit(), 100);
    assert_eq!(decoded.remaining(), 76);
    assert_eq!(decoded.window_seconds(), 21600);
    assert!(decoded.is_authenticated());
    assert_eq!(decoded.identity(), "alice");
}

#[tokio::test]
async fn test_authenticated_json_shape() {
    let client = healthy_client();
    let clock = MockClock::new();
    let checker = build_checker(
        &client,
        &clock,
        MockIpSource::returning("203.0.113.7"),
        Some(("alice", "s3cret")),
    );
    let result = checker.check().await.unwrap();

    let json: Value = serde_json::from_slice(&result.to_json_bytes().unwrap()).unwrap();

    assert_eq!(json["pull_limit"], 100);
    assert_eq!(json["pull_remaining"], 76);
    assert_eq!(json["window_seconds"], 21600);
    assert_eq!(json["authenticated"], true);
    assert_eq!(json["username"], "alice");
    assert!(json.get("ip_address").is_none());
    assert!(json.get("password").is_none());
}

#[tokio::test]
async fn test_unauthenticated_json_carries_address() {
    let client = healthy_client();
    let clock = MockClock::new();
    let checker = build_checker(&client, &clock, MockIpSource::returning("203.0.113.7"), None);
    let result = checker.check().await.unwrap();

    let json: Value = serde_json::from_slice(&result.to_json_bytes().unwrap()).unwrap();

    assert_eq!(json["ip_address"], "203.0.113.7");
    assert_eq!(json["ip_family"], "inet");
    assert_eq!(json["authenticated"], false);
    assert!(json.get("username").is_none());

    let decoded: CheckResult = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, result);
}

#[tokio::test]
async fn test_unauthenticated_ipv6_family() {
    let client = healthy_client();
    let clock = MockClock::new();
    let checker = build_checker(&client, &clock, MockIpSource::returning("2001:db8::1"), None);
    let result = checker.check().await.unwrap();

    let json: Value = serde_json::from_slice(&result.to_json_bytes().unwrap()).unwrap();

    assert_eq!(json["ip_address"], "2001:db8::1");
    assert_eq!(json["ip_family"], "inet6");
}
