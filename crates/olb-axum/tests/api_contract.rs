//! Contract tests for the control surface.
//!
//! These drive the router in-process and check status codes and JSON shapes.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use olb_axum::{AxumContext, CorsConfig, create_router};
use olb_core::{BridgeSettings, MemoryServerStore, ServerConfig};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app_with(configs: Vec<ServerConfig>, settings: BridgeSettings) -> Router {
    let ctx = AxumContext::new(Arc::new(MemoryServerStore::with_servers(configs)), settings);
    create_router(ctx, &CorsConfig::AllowAll)
}

fn app() -> Router {
    app_with(Vec::new(), BridgeSettings::default())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn shell(id: &str) -> Value {
    json!({ "id": id, "name": format!("Shell {id}"), "command": "sh" })
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["servers"]["total"], 0);
}

#[tokio::test]
async fn test_config_crud() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/api/mcp/configs", Some(shell("a"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], "a");
    assert_eq!(body["data"]["enabled"], true);
    assert_eq!(body["data"]["autoStart"], false);

    let (status, body) = send(&app, Method::GET, "/api/mcp/configs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let mut renamed = shell("ignored");
    renamed["name"] = json!("Renamed");
    let (status, body) = send(&app, Method::PUT, "/api/mcp/configs/a", Some(renamed)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "a");
    assert_eq!(body["data"]["name"], "Renamed");

    let (status, body) = send(&app, Method::DELETE, "/api/mcp/configs/a", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, body) = send(&app, Method::DELETE, "/api/mcp/configs/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_add_rejects_duplicates_and_invalid_configs() {
    let app = app();
    send(&app, Method::POST, "/api/mcp/configs", Some(shell("a"))).await;

    let (status, body) = send(&app, Method::POST, "/api/mcp/configs", Some(shell("a"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);
    assert!(body["error"].as_str().unwrap().contains("already exists"));

    let invalid = json!({ "id": "b", "name": "B", "command": "sh -c true" });
    let (status, body) = send(&app, Method::POST, "/api/mcp/configs", Some(invalid)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "ConfigInvalid");
}

#[tokio::test]
async fn test_server_status_shape() {
    let app = app_with(
        vec![ServerConfig::new("word", "Word", "sh")],
        BridgeSettings::default(),
    );

    let (status, body) = send(&app, Method::GET, "/api/mcp/servers", None).await;
    assert_eq!(status, StatusCode::OK);
    let server = &body[0];
    assert_eq!(server["id"], "word");
    assert_eq!(server["status"], "stopped");
    assert_eq!(server["restartCount"], 0);
    assert_eq!(server["toolCount"], 0);
    assert_eq!(server["terminal"], false);
    assert!(server.get("pid").is_none());

    let (status, _) = send(&app, Method::GET, "/api/mcp/servers/word", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, Method::GET, "/api/mcp/servers/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_start_disabled_server_reports_failure_in_envelope() {
    let app = app_with(
        vec![ServerConfig::new("off", "Off", "sh").with_enabled(false)],
        BridgeSettings::default(),
    );

    let (status, body) = send(&app, Method::POST, "/api/mcp/servers/off/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["errorKind"], "ConfigInvalid");
    assert!(body["error"].as_str().unwrap().contains("disabled"));

    let (status, _) = send(&app, Method::POST, "/api/mcp/servers/nope/start", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[cfg(unix)]
#[tokio::test]
async fn test_silent_process_fails_with_startup_timeout() {
    let settings = BridgeSettings {
        startup_timeout_ms: 300,
        stop_grace_ms: 100,
        max_restarts_per_window: 0,
        ..BridgeSettings::default()
    };
    let config = ServerConfig::new("mute", "Mute", "sleep").with_args(["30"]);
    let app = app_with(vec![config], settings);

    let (status, body) = send(&app, Method::POST, "/api/mcp/servers/mute/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["state"], "crashed");
    assert_eq!(body["data"]["errorKind"], "StartupTimeout");

    let (_, body) = send(&app, Method::GET, "/api/mcp/servers/mute", None).await;
    assert_eq!(body["terminal"], true);
    assert!(body["lastError"].as_str().unwrap().contains("StartupTimeout"));
}

#[tokio::test]
async fn test_tools_and_invoke() {
    let app = app_with(
        vec![ServerConfig::new("word", "Word", "sh")],
        BridgeSettings::default(),
    );

    let (status, body) = send(&app, Method::GET, "/api/mcp/tools", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = send(&app, Method::GET, "/api/mcp/tools?server=word", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    let (status, _) = send(&app, Method::GET, "/api/mcp/tools?server=nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, "/api/mcp/servers/word/tools", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/api/mcp/tools/echo", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);

    let request = json!({ "tool": "echo", "arguments": { "text": "hi" } });
    let (status, body) = send(&app, Method::POST, "/api/mcp/invoke", Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["errorKind"], "ToolNotFound");
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn test_settings_are_exposed() {
    let (status, body) = send(&app(), Method::GET, "/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["port"], 3001);
    assert_eq!(body["toolNaming"], "shared");
}
