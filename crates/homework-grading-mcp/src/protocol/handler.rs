//! Request dispatcher. Routes JSON-RPC messages to the lifecycle and tool handlers.

use std::sync::Arc;
use tokio::sync::Mutex;

use serde_json::Value;

use homework_grading::GradingService;

use crate::tools::ToolRegistry;
use crate::types::*;

use super::negotiation::NegotiatedCapabilities;
use super::validator::validate_request;

/// Dispatches incoming JSON-RPC messages to the lifecycle and tool handlers.
pub struct ProtocolHandler {
    service: Arc<GradingService>,
    server_info: Implementation,
    capabilities: Arc<Mutex<NegotiatedCapabilities>>,
}

impl ProtocolHandler {
    pub fn new(service: Arc<GradingService>, server_info: Implementation) -> Self {
        Self {
            service,
            server_info,
            capabilities: Arc::new(Mutex::new(NegotiatedCapabilities::default())),
        }
    }

    pub async fn handle_message(&self, msg: JsonRpcMessage) -> Option<Value> {
        match msg {
            JsonRpcMessage::Request(req) => Some(self.handle_request(req).await),
            JsonRpcMessage::Notification(notif) => {
                self.handle_notification(notif).await;
                None
            }
            _ => {
                tracing::warn!("Received unexpected message type from client");
                None
            }
        }
    }

    /// Whether the client has sent `initialized`.
    pub async fn is_initialized(&self) -> bool {
        self.capabilities.lock().await.initialized
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Value {
        if let Err(e) = validate_request(&request) {
            return serde_json::to_value(e.to_json_rpc_error(request.id)).unwrap_or_default();
        }

        let id = request.id.clone();
        let result = self.dispatch_request(&request).await;

        match result {
            Ok(value) => serde_json::to_value(JsonRpcResponse::new(id, value)).unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Request {id} ({}) failed: {e}", request.method);
                serde_json::to_value(e.to_json_rpc_error(id)).unwrap_or_default()
            }
        }
    }

    async fn dispatch_request(&self, request: &JsonRpcRequest) -> McpResult<Value> {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params.clone()).await,
            "shutdown" => Ok(self.handle_shutdown()),
            "ping" => Ok(Value::Object(serde_json::Map::new())),

            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params.clone()).await,

            _ => Err(McpError::MethodNotFound(request.method.clone())),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "initialized" | "notifications/initialized" => {
                let mut caps = self.capabilities.lock().await;
                if let Err(e) = caps.mark_initialized() {
                    tracing::error!("Failed to mark initialized: {e}");
                }
            }
            "notifications/cancelled" | "$/cancelRequest" => {
                let target = notification
                    .params
                    .and_then(|p| serde_json::from_value::<CancelRequestParams>(p).ok());
                match target {
                    Some(p) => tracing::info!(
                        "Client cancelled request {} ({})",
                        p.request_id,
                        p.reason.as_deref().unwrap_or("no reason")
                    ),
                    None => tracing::info!("Received cancellation notification"),
                }
            }
            _ => {
                tracing::debug!("Unknown notification: {}", notification.method);
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let init_params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?
            .ok_or_else(|| McpError::InvalidParams("Initialize params required".to_string()))?;

        let mut caps = self.capabilities.lock().await;
        let result = caps.negotiate(init_params, self.server_info.clone())?;

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    fn handle_shutdown(&self) -> Value {
        tracing::info!("Shutdown requested");
        Value::Object(serde_json::Map::new())
    }

    fn handle_tools_list(&self) -> McpResult<Value> {
        tracing::debug!("收到工具列表请求");
        let result = ToolListResult {
            tools: ToolRegistry::list_tools(),
            next_cursor: None,
        };
        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> McpResult<Value> {
        let call_params: ToolCallParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::InvalidParams(e.to_string()))?
            .ok_or_else(|| McpError::InvalidParams("Tool call params required".to_string()))?;

        tracing::info!("收到工具调用请求: {}", call_params.name);
        tracing::debug!("工具参数字段: {:?}", argument_keys(call_params.arguments.as_ref()));

        let result =
            ToolRegistry::call(&call_params.name, call_params.arguments, &self.service).await?;

        serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
    }
}

/// Argument names only; image payloads stay out of the log.
fn argument_keys(arguments: Option<&Value>) -> Vec<&str> {
    arguments
        .and_then(Value::as_object)
        .map(|obj| obj.keys().map(String::as_str).collect())
        .unwrap_or_default()
}
