//! Tool registration and dispatch.

use serde_json::Value;

use homework_grading::GradingService;

use crate::types::{McpError, McpResult, ToolCallResult, ToolDefinition};

use super::grade_homework;

pub struct ToolRegistry;

impl ToolRegistry {
    pub fn list_tools() -> Vec<ToolDefinition> {
        vec![grade_homework::definition()]
    }

    pub async fn call(
        name: &str,
        arguments: Option<Value>,
        service: &GradingService,
    ) -> McpResult<ToolCallResult> {
        let args = arguments.unwrap_or(Value::Object(serde_json::Map::new()));

        match name {
            grade_homework::TOOL_NAME => grade_homework::execute(args, service).await,
            _ => Err(McpError::ToolNotFound(name.to_string())),
        }
    }
}
