//! # Scenario Tests
//!
//! The four page scenarios, end to end through the runtime: host and guest
//! views are compared as JSON exactly as the pages would render them.

use super::fixtures::{auth_json, runtime_config};
use bridge_runtime::{run_scenario, Scenario};
use serde_json::{json, Value};

fn host_view(report: &bridge_runtime::ScenarioReport, frame: &str) -> Value {
    let status = report
        .host
        .iter()
        .find(|(id, _)| id.as_str() == frame)
        .map(|(_, status)| status.clone())
        .unwrap();
    serde_json::to_value(status).unwrap()
}

fn guest_view(report: &bridge_runtime::ScenarioReport, name: &str) -> Value {
    serde_json::to_value(&report.guests[name]).unwrap()
}

fn expected_guest_view(name: &str) -> Value {
    json!({
        "auth": auth_json(),
        "myResponse": { "sum": 1, "sender": "host" },
        "foo": { "sender": "host", "value": format!("hello to my guest {name}") },
    })
}

// =============================================================================
// SCENARIO: none (default)
// =============================================================================

/// Handshake, auth exchange, request/reply and events in both directions.
#[tokio::test]
async fn test_default_scenario_full_exchange() {
    let report = run_scenario(&runtime_config(Scenario::None)).await.unwrap();

    assert_eq!(guest_view(&report, "alice"), expected_guest_view("alice"));
    assert_eq!(
        host_view(&report, "alice"),
        json!({
            "ready": true,
            "foo": { "sender": "alice", "value": "hello to my host" },
            "error": null,
        })
    );
}

// =============================================================================
// SCENARIO: no_hello
// =============================================================================

#[tokio::test]
async fn test_guest_without_hello_is_not_started() {
    let report = run_scenario(&runtime_config(Scenario::NoHello)).await.unwrap();

    assert_eq!(
        host_view(&report, "alice"),
        json!({
            "ready": false,
            "foo": null,
            "error": { "cause": "not_started" },
        })
    );
    // The guest side still completed its handshake and request
    assert_eq!(guest_view(&report, "alice"), expected_guest_view("alice"));
}

// =============================================================================
// SCENARIO: no_ready
// =============================================================================

#[tokio::test]
async fn test_guest_without_ready_is_not_ready() {
    let report = run_scenario(&runtime_config(Scenario::NoReady)).await.unwrap();

    assert_eq!(
        host_view(&report, "alice"),
        json!({
            "ready": false,
            "foo": { "sender": "alice", "value": "hello to my host" },
            "error": { "cause": "not_ready" },
        })
    );
}

// =============================================================================
// SCENARIO: two_guests
// =============================================================================

#[tokio::test]
async fn test_two_guests_have_independent_sessions() {
    let report = run_scenario(&runtime_config(Scenario::TwoGuests)).await.unwrap();

    assert_eq!(report.host.len(), 2);
    for name in ["alice", "bob"] {
        assert_eq!(guest_view(&report, name), expected_guest_view(name));
        assert_eq!(
            host_view(&report, name),
            json!({
                "ready": true,
                "foo": { "sender": name, "value": "hello to my host" },
                "error": null,
            })
        );
    }
}

#[tokio::test]
async fn test_report_serializes_scenario_name() {
    let report = run_scenario(&runtime_config(Scenario::NoReady)).await.unwrap();
    let rendered = serde_json::to_value(&report).unwrap();

    assert_eq!(rendered["scenario"], json!("no_ready"));
    assert!(rendered["host"]["alice"].is_object());
    assert!(rendered["guests"]["alice"]["auth"].is_object());
}
