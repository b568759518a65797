//! Invocation dispatch through a live tool-server.

mod common;

use std::path::Path;
use std::time::Duration;

use common::{echo_config, eventually, fast_settings, service};
use olb_core::{BridgeSettings, ErrorKind, InvocationRequest, ServerState};
use olb_mcp::BridgeService;
use serde_json::json;
use tempfile::TempDir;

async fn running_service(settings: BridgeSettings, log: &Path) -> BridgeService {
    let config = echo_config("word").with_env("OLB_ECHO_CALL_LOG", log.display().to_string());
    let service = service(settings, vec![config]);
    service.initialize().await.unwrap();
    let outcome = service.start_server("word").await.unwrap();
    assert!(outcome.success, "start failed: {:?}", outcome.message);
    service
}

fn logged_calls(log: &Path) -> Vec<String> {
    std::fs::read_to_string(log)
        .map(|s| s.lines().map(str::to_owned).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_unknown_tool_never_reaches_a_process() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("calls.log");
    let service = running_service(fast_settings(), &log).await;

    let result = service.invoke(InvocationRequest::new("frobnicate")).await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::ToolNotFound));
    assert!(logged_calls(&log).is_empty());

    service.shutdown().await;
}

#[tokio::test]
async fn test_echo_round_trip() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("calls.log");
    let service = running_service(fast_settings(), &log).await;

    let result = service
        .invoke(InvocationRequest::new("echo").with_argument("text", "hello"))
        .await;
    assert!(result.success, "{result:?}");
    assert_eq!(result.message, "hello");
    assert_eq!(result.data, Some(json!({"echo": "hello"})));
    assert_eq!(logged_calls(&log), vec!["echo"]);

    service.shutdown().await;
}

#[tokio::test]
async fn test_missing_required_argument_is_rejected_locally() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("calls.log");
    let service = running_service(fast_settings(), &log).await;

    let result = service.invoke(InvocationRequest::new("echo")).await;
    assert_eq!(result.error_kind, Some(ErrorKind::InvalidArguments));
    assert_eq!(result.data.unwrap()["missing"], json!(["text"]));
    assert!(logged_calls(&log).is_empty());

    service.shutdown().await;
}

#[tokio::test]
async fn test_unsupported_action_lists_supported_set() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("calls.log");
    let service = running_service(fast_settings(), &log).await;

    let result = service
        .invoke(InvocationRequest::new("content_control").with_action("frobnicate"))
        .await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::UnsupportedAction));
    assert_eq!(
        result.data.unwrap()["supportedActions"],
        json!(["insert", "list", "setValue", "getValue", "delete", "clear"])
    );
    assert!(logged_calls(&log).is_empty());

    service.shutdown().await;
}

#[tokio::test]
async fn test_content_control_resolves_body_before_header() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("calls.log");
    let service = running_service(fast_settings(), &log).await;
    let call = |action: &str| InvocationRequest::new("content_control").with_action(action);

    let header = service
        .invoke(
            call("insert")
                .with_argument("tag", "title")
                .with_argument("value", "Draft")
                .with_argument("scope", "header"),
        )
        .await;
    assert!(header.success, "{header:?}");
    let body = service
        .invoke(
            call("insert")
                .with_argument("tag", "title")
                .with_argument("value", "Final"),
        )
        .await;
    assert!(body.success);

    let value = service
        .invoke(call("getValue").with_argument("tag", "title"))
        .await;
    let data = value.data.unwrap();
    assert_eq!(data["value"], "Final");
    assert_eq!(data["scope"], "body");

    let deleted = service
        .invoke(call("delete").with_argument("tag", "title"))
        .await;
    assert!(deleted.success);
    let value = service
        .invoke(call("getValue").with_argument("tag", "title"))
        .await;
    assert_eq!(value.data.unwrap()["scope"], "header");

    // Action given as an argument instead of the request field.
    let listed = service
        .invoke(InvocationRequest::new("content_control").with_argument("action", "list"))
        .await;
    assert_eq!(listed.data.unwrap()["controls"].as_array().unwrap().len(), 1);

    let missing = service
        .invoke(call("setValue").with_argument("tag", "nope").with_argument("value", "x"))
        .await;
    assert_eq!(missing.error_kind, Some(ErrorKind::HandlerReportedLimitation));
    assert_eq!(missing.message, "Content control 'nope' not found");

    service.shutdown().await;
}

#[tokio::test]
async fn test_handler_limitation_keeps_payload() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("calls.log");
    let service = running_service(fast_settings(), &log).await;

    let result = service.invoke(InvocationRequest::new("legacy_feature")).await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::HandlerReportedLimitation));
    assert_eq!(result.message, "Operation not supported by this API version");
    assert_eq!(result.data, Some(json!({"requiredApiVersion": "1.4"})));
    // The server is healthy; only the operation was declined.
    assert_eq!(service.server_status("word").unwrap().status, ServerState::Running);

    service.shutdown().await;
}

#[tokio::test]
async fn test_timeout_does_not_block_other_calls() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("calls.log");
    let settings = BridgeSettings {
        invocation_timeout_ms: 500,
        ..fast_settings()
    };
    let service = running_service(settings, &log).await;

    let slow = service.invoke(
        InvocationRequest::new("slow_echo")
            .with_argument("text", "late")
            .with_argument("delayMs", 3_000),
    );
    let fast = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        service
            .invoke(InvocationRequest::new("echo").with_argument("text", "quick"))
            .await
    };
    let (slow, fast) = tokio::join!(slow, fast);

    assert_eq!(slow.error_kind, Some(ErrorKind::InvocationTimeout));
    assert!(fast.success);
    assert_eq!(fast.message, "quick");

    // The late reply is discarded and the connection stays usable.
    let after = service
        .invoke(InvocationRequest::new("echo").with_argument("text", "after"))
        .await;
    assert!(after.success);
    assert_eq!(after.message, "after");
    assert_eq!(service.server_status("word").unwrap().status, ServerState::Running);

    service.shutdown().await;
}

#[tokio::test]
async fn test_process_exit_mid_call_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("calls.log");
    let service = running_service(fast_settings(), &log).await;

    let result = service.invoke(InvocationRequest::new("exit_now")).await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::ServerUnavailable));

    // Health monitoring notices and the restart policy brings it back.
    assert!(
        eventually(Duration::from_secs(10), || async {
            service.server_status("word").unwrap().restart_count == 1
                && service.server_status("word").unwrap().status == ServerState::Running
        })
        .await
    );
    let result = service
        .invoke(InvocationRequest::new("echo").with_argument("text", "back"))
        .await;
    assert!(result.success);

    service.shutdown().await;
}

#[tokio::test]
async fn test_concurrency_limit_queues_calls_against_the_deadline() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("calls.log");
    let settings = BridgeSettings {
        max_concurrent_invocations: 1,
        invocation_timeout_ms: 600,
        ..fast_settings()
    };
    let service = running_service(settings, &log).await;

    let slow = |text: &str| {
        InvocationRequest::new("slow_echo")
            .with_argument("text", text)
            .with_argument("delayMs", 400)
    };
    let in_flight = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        logged_calls(&log).len()
    };
    let (first, second, third, in_flight) = tokio::join!(
        service.invoke(slow("one")),
        service.invoke(slow("two")),
        service.invoke(slow("three")),
        in_flight,
    );

    // Only the call holding the single slot has reached the process.
    assert_eq!(in_flight, 1);
    assert!(first.success, "{first:?}");
    assert_eq!(first.message, "one");
    assert_eq!(second.error_kind, Some(ErrorKind::InvocationTimeout));
    assert_eq!(third.error_kind, Some(ErrorKind::InvocationTimeout));
    assert!(logged_calls(&log).len() <= 2);
    assert_eq!(service.server_status("word").unwrap().status, ServerState::Running);

    service.shutdown().await;
}
