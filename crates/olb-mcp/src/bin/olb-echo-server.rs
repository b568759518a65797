//! Reference tool-server speaking MCP over stdio.
//!
//! Advertises a small set of tools that exercise the bridge end to end:
//! plain echo, a slow echo for timeout tests, a multi-action
//! `content_control` tool backed by an in-memory document, and a tool that
//! always reports an API limitation.
//!
//! Behaviour knobs (environment):
//! - `OLB_ECHO_STARTUP_DELAY_MS`: sleep before reading stdin
//! - `OLB_ECHO_BROKEN_DISCOVERY`: advertise a malformed tool list
//! - `OLB_ECHO_BREAK_DISCOVERY_FILE`: advertise a malformed tool list while
//!   this file exists
//! - `OLB_ECHO_FREEZE_FILE`: stop reading stdin for good once this file
//!   exists (checked after each handled message)
//! - `OLB_ECHO_TOOL_PREFIX`: prefix every advertised tool name
//! - `OLB_ECHO_CALL_LOG`: append one line per `tools/call` to this file

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use olb_core::{ResolutionOrder, ToolAction};
use olb_mcp::protocol::{
    CallToolParams, CallToolResult, IncomingMessage, JsonRpcResponse, METHOD_CANCELLED,
    METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_PING, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
    PROTOCOL_VERSION, codes,
};
use serde_json::{Map, Value, json};
use strum::{Display, EnumString, VariantNames};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Operations behind the `content_control` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, VariantNames, Display)]
#[strum(serialize_all = "camelCase")]
enum ContentControlAction {
    Insert,
    List,
    SetValue,
    GetValue,
    Delete,
    Clear,
}

impl ToolAction for ContentControlAction {}

/// Document part a content control lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, VariantNames, Display)]
#[strum(serialize_all = "lowercase")]
enum Scope {
    Body,
    Header,
    Footer,
}

/// Where a tag lookup searches, in order.
const TAG_LOOKUP: ResolutionOrder<Scope> =
    ResolutionOrder::new(&[Scope::Body, Scope::Header, Scope::Footer]);

#[derive(Debug, Clone)]
struct ContentControl {
    id: u64,
    tag: String,
    value: String,
}

#[derive(Debug, Default)]
struct Document {
    next_id: u64,
    parts: HashMap<Scope, Vec<ContentControl>>,
}

impl Document {
    fn find(&self, scope: Scope, tag: &str) -> Option<usize> {
        self.parts
            .get(&scope)
            .and_then(|controls| controls.iter().position(|c| c.tag == tag))
    }

    /// First control tagged `tag`, searching parts in lookup order.
    fn locate(&self, tag: &str) -> Option<(Scope, usize)> {
        TAG_LOOKUP.resolve(|scope| self.find(scope, tag))
    }
}

#[derive(Debug, Clone, Default)]
struct Options {
    startup_delay: Option<Duration>,
    broken_discovery: bool,
    break_discovery_file: Option<PathBuf>,
    freeze_file: Option<PathBuf>,
    prefix: String,
    call_log: Option<PathBuf>,
}

impl Options {
    fn from_env() -> Self {
        Self {
            startup_delay: std::env::var("OLB_ECHO_STARTUP_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis),
            broken_discovery: std::env::var_os("OLB_ECHO_BROKEN_DISCOVERY").is_some(),
            break_discovery_file: std::env::var_os("OLB_ECHO_BREAK_DISCOVERY_FILE")
                .map(PathBuf::from),
            freeze_file: std::env::var_os("OLB_ECHO_FREEZE_FILE").map(PathBuf::from),
            prefix: std::env::var("OLB_ECHO_TOOL_PREFIX").unwrap_or_default(),
            call_log: std::env::var_os("OLB_ECHO_CALL_LOG").map(PathBuf::from),
        }
    }

    fn discovery_broken(&self) -> bool {
        self.broken_discovery
            || self
                .break_discovery_file
                .as_deref()
                .is_some_and(|path| path.exists())
    }

    fn frozen(&self) -> bool {
        self.freeze_file.as_deref().is_some_and(|path| path.exists())
    }
}

struct EchoServer {
    options: Options,
    stdout: tokio::sync::Mutex<Stdout>,
    document: Mutex<Document>,
    in_flight: Mutex<HashMap<String, AbortHandle>>,
}

impl EchoServer {
    async fn send(&self, response: &JsonRpcResponse) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(response)?;
        line.push('\n');
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }

    fn tools(&self) -> Vec<Value> {
        let name = |tool: &str| format!("{}{tool}", self.options.prefix);
        if self.options.discovery_broken() {
            return vec![json!({ "name": name("echo"), "inputSchema": "not a schema" })];
        }
        vec![
            json!({
                "name": name("echo"),
                "description": "Echo the given text back",
                "inputSchema": {
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }
            }),
            json!({
                "name": name("slow_echo"),
                "description": "Echo after a delay",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "text": { "type": "string" },
                        "delayMs": { "type": "integer", "minimum": 0 }
                    },
                    "required": ["text"]
                }
            }),
            json!({
                "name": name("content_control"),
                "description": "Manage tagged content controls in the active document",
                "category": "word",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "action": ContentControlAction::schema(),
                        "tag": { "type": "string" },
                        "value": { "type": "string" },
                        "scope": { "type": "string", "enum": Scope::VARIANTS }
                    },
                    "required": ["action"]
                }
            }),
            json!({
                "name": name("legacy_feature"),
                "description": "Feature that needs a newer host API",
                "annotations": { "category": "excel" },
                "inputSchema": { "type": "object" }
            }),
            json!({
                "name": name("exit_now"),
                "description": "Terminate the server process",
                "inputSchema": { "type": "object" }
            }),
        ]
    }

    async fn call(&self, params: CallToolParams) -> Result<CallToolResult, (i64, String)> {
        self.log_call(&params.name).await;
        let Some(tool) = params.name.strip_prefix(self.options.prefix.as_str()) else {
            return Err((codes::INVALID_PARAMS, format!("Unknown tool: {}", params.name)));
        };
        let args = params.arguments;
        let payload = match tool {
            "echo" => echo(&args),
            "slow_echo" => {
                let delay = args.get("delayMs").and_then(Value::as_u64).unwrap_or(1_000);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                echo(&args)
            }
            "content_control" => {
                let mut document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
                content_control(&mut document, &args)
            }
            "legacy_feature" => json!({
                "success": false,
                "message": "Operation not supported by this API version",
                "data": { "requiredApiVersion": "1.4" }
            }),
            "exit_now" => {
                warn!("exit requested by tool call");
                std::process::exit(3);
            }
            _ => return Err((codes::INVALID_PARAMS, format!("Unknown tool: {}", params.name))),
        };
        Ok(CallToolResult::from_payload(payload))
    }

    async fn log_call(&self, tool: &str) {
        let Some(path) = &self.options.call_log else {
            return;
        };
        let written = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(format!("{tool}\n").as_bytes()).await
        };
        if let Err(e) = written.await {
            warn!(path = %path.display(), error = %e, "failed to append call log");
        }
    }

    fn untrack(&self, key: &str) -> Option<AbortHandle> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}

fn echo(args: &Map<String, Value>) -> Value {
    let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
    json!({ "success": true, "message": text, "echo": text })
}

fn content_control(document: &mut Document, args: &Map<String, Value>) -> Value {
    let action = match ContentControlAction::parse_action(args.get("action").and_then(Value::as_str))
    {
        Ok(action) => action,
        Err(e) => {
            return json!({
                "success": false,
                "message": e.to_string(),
                "supportedActions": e.supported,
            });
        }
    };
    let tag = args.get("tag").and_then(Value::as_str);
    let value = args.get("value").and_then(Value::as_str).unwrap_or_default();

    match action {
        ContentControlAction::Insert => {
            let Some(tag) = tag else {
                return missing("tag");
            };
            let scope = match args.get("scope").and_then(Value::as_str) {
                None => Scope::Body,
                Some(raw) => match Scope::from_str(raw) {
                    Ok(scope) => scope,
                    Err(_) => {
                        return json!({
                            "success": false,
                            "message": format!("Unknown scope '{raw}'"),
                        });
                    }
                },
            };
            document.next_id += 1;
            let id = document.next_id;
            document.parts.entry(scope).or_default().push(ContentControl {
                id,
                tag: tag.to_string(),
                value: value.to_string(),
            });
            json!({
                "success": true,
                "message": format!("Inserted content control '{tag}'"),
                "id": id,
                "scope": scope.to_string(),
            })
        }
        ContentControlAction::List => {
            let controls: Vec<Value> = TAG_LOOKUP
                .scopes()
                .iter()
                .flat_map(|scope| {
                    document
                        .parts
                        .get(scope)
                        .into_iter()
                        .flatten()
                        .map(move |c| {
                            json!({ "id": c.id, "tag": c.tag, "value": c.value, "scope": scope.to_string() })
                        })
                })
                .collect();
            json!({
                "success": true,
                "message": format!("{} content control(s)", controls.len()),
                "controls": controls,
            })
        }
        ContentControlAction::SetValue | ContentControlAction::GetValue | ContentControlAction::Delete => {
            let Some(tag) = tag else {
                return missing("tag");
            };
            let Some((scope, index)) = document.locate(tag) else {
                return json!({
                    "success": false,
                    "message": format!("Content control '{tag}' not found"),
                });
            };
            let Some(controls) = document.parts.get_mut(&scope) else {
                return missing("tag");
            };
            match action {
                ContentControlAction::SetValue => {
                    controls[index].value = value.to_string();
                    json!({
                        "success": true,
                        "message": format!("Updated content control '{tag}'"),
                        "scope": scope.to_string(),
                    })
                }
                ContentControlAction::GetValue => json!({
                    "success": true,
                    "message": format!("Read content control '{tag}'"),
                    "value": controls[index].value,
                    "scope": scope.to_string(),
                }),
                _ => {
                    let removed = controls.remove(index);
                    json!({
                        "success": true,
                        "message": format!("Deleted content control '{tag}'"),
                        "id": removed.id,
                        "scope": scope.to_string(),
                    })
                }
            }
        }
        ContentControlAction::Clear => {
            let removed: usize = document.parts.values().map(Vec::len).sum();
            document.parts.clear();
            json!({
                "success": true,
                "message": format!("Removed {removed} content control(s)"),
                "removed": removed,
            })
        }
    }
}

fn missing(field: &str) -> Value {
    json!({ "success": false, "message": format!("Missing required argument '{field}'") })
}

async fn handle(server: Arc<EchoServer>, message: IncomingMessage) -> anyhow::Result<()> {
    let Some(method) = message.method.as_deref() else {
        // Responses to anything we sent; nothing to do.
        return Ok(());
    };
    let Some(id) = message.id.clone() else {
        match method {
            METHOD_INITIALIZED => debug!("client initialized"),
            METHOD_CANCELLED => {
                let request_id = message
                    .params
                    .as_ref()
                    .and_then(|p| p.get("requestId"))
                    .map(Value::to_string);
                if let Some(handle) = request_id.and_then(|key| server.untrack(&key)) {
                    handle.abort();
                    info!("cancelled in-flight call");
                }
            }
            other => debug!(method = other, "ignoring notification"),
        }
        return Ok(());
    };

    let response = match method {
        METHOD_INITIALIZE => JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": { "name": "olb-echo-server", "version": env!("CARGO_PKG_VERSION") },
                "capabilities": { "tools": { "listChanged": true } }
            }),
        ),
        METHOD_PING => JsonRpcResponse::success(id, json!({})),
        METHOD_TOOLS_LIST => JsonRpcResponse::success(id, json!({ "tools": server.tools() })),
        METHOD_TOOLS_CALL => {
            let params: CallToolParams =
                match serde_json::from_value(message.params.unwrap_or(Value::Null)) {
                    Ok(params) => params,
                    Err(e) => {
                        let response = JsonRpcResponse::error(id, codes::INVALID_PARAMS, e.to_string());
                        return server.send(&response).await;
                    }
                };
            let key = id.to_string();
            let worker = Arc::clone(&server);
            // Registered under the lock so a fast call cannot untrack first.
            let mut in_flight = server.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            let task = tokio::spawn(async move {
                let response = match worker.call(params).await {
                    Ok(result) => JsonRpcResponse::success(id, serde_json::to_value(result)?),
                    Err((code, message)) => JsonRpcResponse::error(id, code, message),
                };
                worker.untrack(&key);
                worker.send(&response).await
            });
            in_flight.insert(id_key(message.id.as_ref()), task.abort_handle());
            return Ok(());
        }
        other => JsonRpcResponse::error(
            id,
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        ),
    };
    server.send(&response).await
}

fn id_key(id: Option<&Value>) -> String {
    id.map(Value::to_string).unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("OLB_ECHO_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(false)
        .init();

    let options = Options::from_env();
    if let Some(delay) = options.startup_delay {
        info!(delay_ms = delay.as_millis(), "delaying startup");
        tokio::time::sleep(delay).await;
    }

    let server = Arc::new(EchoServer {
        options,
        stdout: tokio::sync::Mutex::new(tokio::io::stdout()),
        document: Mutex::new(Document::default()),
        in_flight: Mutex::new(HashMap::new()),
    });
    info!(pid = std::process::id(), "olb-echo-server ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let message: IncomingMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "unparseable line");
                server
                    .send(&JsonRpcResponse::error(Value::Null, codes::PARSE_ERROR, e.to_string()))
                    .await?;
                continue;
            }
        };
        handle(Arc::clone(&server), message).await?;
        if server.options.frozen() {
            warn!("freeze file present; no longer reading stdin");
            std::future::pending::<()>().await;
        }
    }
    info!("stdin closed, exiting");
    Ok(())
}
