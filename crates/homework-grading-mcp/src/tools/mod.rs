//! MCP tool implementations.

pub mod grade_homework;
pub mod registry;

pub use registry::ToolRegistry;
