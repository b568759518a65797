//! Multiplexed MCP client over a tool-server's stdio.
//!
//! Any number of requests may be in flight. Each registers a oneshot slot
//! keyed by its JSON-RPC id; a single reader task routes responses to their
//! slots. A request that times out frees only its own slot and tells the
//! server to cancel it, so other callers never notice.
//!
//! Writes go through one writer task fed by a bounded queue. A child that
//! stops reading stdin stalls that task, never a caller: each request's
//! deadline covers queueing, writing, and waiting for the reply.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use olb_runtime::ProcessIo;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::protocol::{
    CallToolParams, CallToolResult, IncomingMessage, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, METHOD_CANCELLED, METHOD_INITIALIZE, METHOD_INITIALIZED,
    METHOD_PING, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, ToolListResult, WireTool, codes,
    initialize_params,
};

/// Upper bound on `tools/list` pages followed for one discovery.
const MAX_TOOL_PAGES: usize = 32;

/// Longest stdout line accepted from a server. Longer output closes the
/// connection.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Messages queued for the writer task.
const OUTBOX_CAPACITY: usize = 64;

/// Errors that can occur during MCP client operations.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("Failed to communicate with tool-server: {0}")]
    Io(String),

    #[error("JSON serialization error: {0}")]
    Json(String),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("No response within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Tool-server returned error: code={code}, message={message}")]
    Server { code: i64, message: String },

    #[error("Connection to tool-server closed")]
    ConnectionClosed,
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

type Reply = Result<Value, ClientError>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// One line for the writer task. `written` fires once it is flushed.
struct Outgoing {
    line: String,
    written: Option<oneshot::Sender<()>>,
}

/// Notification pushed by the server outside any request.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerNotification {
    pub method: String,
    pub params: Option<Value>,
}

/// Client for one tool-server connection.
pub struct ToolServerClient {
    server_id: String,
    outbox: mpsc::Sender<Outgoing>,
    pending: PendingMap,
    next_id: AtomicU64,
    /// Unix millis of the last inbound message; 0 until one arrives.
    last_activity_ms: Arc<AtomicI64>,
    closed: CancellationToken,
    notifications: Mutex<Option<mpsc::UnboundedReceiver<ServerNotification>>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl std::fmt::Debug for ToolServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolServerClient")
            .field("server_id", &self.server_id)
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ToolServerClient {
    /// Attach to a spawned process's pipes.
    pub fn from_process(server_id: impl Into<String>, io: ProcessIo) -> Self {
        Self::new(server_id, io.stdout, io.stdin)
    }

    /// Attach to arbitrary streams. `reader` carries server output.
    pub fn new<R, W>(server_id: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let server_id = server_id.into();
        let (outbox, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let last_activity_ms = Arc::new(AtomicI64::new(0));
        let closed = CancellationToken::new();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(write_loop(server_id.clone(), Box::new(writer), outbox_rx));
        let reader = tokio::spawn(read_loop(ReadLoop {
            server_id: server_id.clone(),
            reader: Box::new(reader),
            outbox: outbox.clone(),
            pending: Arc::clone(&pending),
            last_activity_ms: Arc::clone(&last_activity_ms),
            closed: closed.clone(),
            notifications: notify_tx,
        }));

        Self {
            server_id,
            outbox,
            pending,
            next_id: AtomicU64::new(1),
            last_activity_ms,
            closed,
            notifications: Mutex::new(Some(notify_rx)),
            reader,
            writer,
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Perform the MCP handshake.
    pub async fn initialize(&self) -> Result<InitializeResult, ClientError> {
        let params = initialize_params("office-local-bridge", env!("CARGO_PKG_VERSION"));
        let result = self.request(METHOD_INITIALIZE, Some(params)).await?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| ClientError::Protocol(format!("Invalid initialize result: {e}")))?;
        self.notify(METHOD_INITIALIZED, None).await?;
        debug!(
            server_id = %self.server_id,
            server = %init.server_info.name,
            protocol = %init.protocol_version,
            "tool-server initialized"
        );
        Ok(init)
    }

    /// Every tool the server advertises, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<WireTool>, ClientError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self.request(METHOD_TOOLS_LIST, params).await?;
            let page: ToolListResult = serde_json::from_value(result)
                .map_err(|e| ClientError::Protocol(format!("Invalid tools/list result: {e}")))?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }
        Err(ClientError::Protocol(format!(
            "tools/list did not finish within {MAX_TOOL_PAGES} pages"
        )))
    }

    /// Call a tool, giving up after `limit`.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        limit: Duration,
    ) -> Result<CallToolResult, ClientError> {
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        let result = self
            .request_with_timeout(METHOD_TOOLS_CALL, Some(params), limit)
            .await?;
        serde_json::from_value(result)
            .map_err(|e| ClientError::Protocol(format!("Invalid tools/call result: {e}")))
    }

    pub async fn ping(&self, limit: Duration) -> Result<(), ClientError> {
        self.request_with_timeout(METHOD_PING, None, limit)
            .await
            .map(|_| ())
    }

    /// Send a request and wait for its response with no deadline.
    ///
    /// Dropping the returned future frees the pending slot.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ClientError> {
        let (id, rx, _guard) = self.register();
        let mut delivered = false;
        self.exchange(method, id, params, rx, &mut delivered).await
    }

    /// Send a request; on timeout free its slot and ask the server to cancel.
    ///
    /// `limit` covers the whole exchange, including a stalled stdin. The
    /// cancel notification goes out only if the request itself was written.
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        limit: Duration,
    ) -> Result<Value, ClientError> {
        let (id, rx, _guard) = self.register();
        let mut delivered = false;
        let exchange = timeout(
            limit,
            self.exchange(method, id, params, rx, &mut delivered),
        )
        .await;

        match exchange {
            Ok(reply) => reply,
            Err(_) => {
                self.forget(id);
                if delivered {
                    debug!(server_id = %self.server_id, id, method, "request timed out, cancelling");
                    let cancel = json!({ "requestId": id, "reason": "timeout" });
                    self.try_notify(METHOD_CANCELLED, Some(cancel));
                } else {
                    debug!(server_id = %self.server_id, id, method, "request timed out before it was written");
                }
                Err(ClientError::Timeout(limit))
            }
        }
    }

    /// Write one request and wait for its reply.
    async fn exchange(
        &self,
        method: &str,
        id: u64,
        params: Option<Value>,
        reply: oneshot::Receiver<Reply>,
        delivered: &mut bool,
    ) -> Reply {
        let written = self.send(method, id, params).await?;
        written.await.map_err(|_| ClientError::ConnectionClosed)?;
        *delivered = true;
        reply.await.unwrap_or(Err(ClientError::ConnectionClosed))
    }

    /// Fire-and-forget notification. Waits for queue space, not the write.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ClientError> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))?;
        self.outbox
            .send(Outgoing {
                line,
                written: None,
            })
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Queue a notification only if there is room right now.
    fn try_notify(&self, method: &str, params: Option<Value>) {
        let Ok(line) = serde_json::to_string(&JsonRpcNotification::new(method, params)) else {
            return;
        };
        if let Err(e) = self.outbox.try_send(Outgoing {
            line,
            written: None,
        }) {
            debug!(server_id = %self.server_id, error = %e, method, "notification dropped");
        }
    }

    /// Time of the last message received from the server.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        match self.last_activity_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    /// Server-initiated notifications. Can be taken once.
    pub fn take_notifications(&self) -> Option<mpsc::UnboundedReceiver<ServerNotification>> {
        self.notifications.lock().ok().and_then(|mut rx| rx.take())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the server's output stream ends.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Requests awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn register(&self) -> (u64, oneshot::Receiver<Reply>, PendingGuard) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(id, tx);
        }
        let guard = PendingGuard {
            id,
            pending: Arc::clone(&self.pending),
        };
        (id, rx, guard)
    }

    fn forget(&self, id: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&id);
        }
    }

    /// Queue a request. The receiver fires once it has been written.
    async fn send(
        &self,
        method: &str,
        id: u64,
        params: Option<Value>,
    ) -> Result<oneshot::Receiver<()>, ClientError> {
        if self.is_closed() {
            return Err(ClientError::ConnectionClosed);
        }
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        trace!(server_id = %self.server_id, id, method, "sending request");
        let (written_tx, written_rx) = oneshot::channel();
        self.outbox
            .send(Outgoing {
                line,
                written: Some(written_tx),
            })
            .await
            .map_err(|_| ClientError::ConnectionClosed)?;
        Ok(written_rx)
    }
}

impl Drop for ToolServerClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Removes a request's slot however its caller finishes.
struct PendingGuard {
    id: u64,
    pending: PendingMap,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.id);
        }
    }
}

/// Owns the server's stdin. Lines are written whole, in queue order.
async fn write_loop(
    server_id: String,
    mut writer: Box<dyn AsyncWrite + Send + Unpin>,
    mut outbox: mpsc::Receiver<Outgoing>,
) {
    while let Some(Outgoing { mut line, written }) = outbox.recv().await {
        line.push('\n');
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = result {
            debug!(server_id = %server_id, error = %e, "stdin write failed");
            break;
        }
        if let Some(written) = written {
            let _ = written.send(());
        }
    }
    // Dropping the receiver fails queued and future sends.
    debug!(server_id = %server_id, "stdin writer task exiting");
}

struct ReadLoop {
    server_id: String,
    reader: Box<dyn AsyncRead + Send + Unpin>,
    outbox: mpsc::Sender<Outgoing>,
    pending: PendingMap,
    last_activity_ms: Arc<AtomicI64>,
    closed: CancellationToken,
    notifications: mpsc::UnboundedSender<ServerNotification>,
}

async fn read_loop(state: ReadLoop) {
    let ReadLoop {
        server_id,
        reader,
        outbox,
        pending,
        last_activity_ms,
        closed,
        notifications,
    } = state;
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    while let Some(next) = lines.next().await {
        let line = match next {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(server_id = %server_id, limit = MAX_LINE_BYTES, "stdout line too long, closing connection");
                break;
            }
            Err(LinesCodecError::Io(e)) => {
                debug!(server_id = %server_id, error = %e, "stdout read failed");
                break;
            }
        };
        last_activity_ms.store(Utc::now().timestamp_millis(), Ordering::Release);

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // Servers sometimes log to stdout; anything that isn't JSON-RPC is noise.
        let message: IncomingMessage = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(_) => {
                debug!(server_id = %server_id, line = %line, "ignoring non-JSON stdout line");
                continue;
            }
        };

        if message.is_response() {
            let Some(id) = message.response_id() else {
                warn!(server_id = %server_id, "response without a numeric id");
                continue;
            };
            let slot = pending.lock().ok().and_then(|mut p| p.remove(&id));
            let Some(slot) = slot else {
                debug!(server_id = %server_id, id, "late response ignored");
                continue;
            };
            let reply = match (message.result, message.error) {
                (_, Some(error)) => Err(ClientError::Server {
                    code: error.code,
                    message: error.message,
                }),
                (Some(result), None) => Ok(result),
                (None, None) => Ok(Value::Null),
            };
            let _ = slot.send(reply);
            continue;
        }

        let Some(method) = message.method else {
            debug!(server_id = %server_id, "ignoring message without method or result");
            continue;
        };
        match message.id {
            // Server-to-client request. Only ping is supported.
            Some(id) => {
                let response = if method == METHOD_PING {
                    JsonRpcResponse::success(id, json!({}))
                } else {
                    JsonRpcResponse::error(id, codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
                };
                if let Ok(line) = serde_json::to_string(&response) {
                    // Never block the reader on a stalled stdin.
                    if let Err(e) = outbox.try_send(Outgoing {
                        line,
                        written: None,
                    }) {
                        debug!(server_id = %server_id, error = %e, "failed to answer server request");
                    }
                }
            }
            None => {
                trace!(server_id = %server_id, method = %method, "server notification");
                let _ = notifications.send(ServerNotification {
                    method,
                    params: message.params,
                });
            }
        }
    }

    closed.cancel();
    let orphans: Vec<_> = pending
        .lock()
        .map(|mut p| p.drain().map(|(_, tx)| tx).collect())
        .unwrap_or_default();
    if !orphans.is_empty() {
        debug!(server_id = %server_id, count = orphans.len(), "failing in-flight requests");
    }
    for slot in orphans {
        let _ = slot.send(Err(ClientError::ConnectionClosed));
    }
    debug!(server_id = %server_id, "stdout reader task exiting");
}
