//! Homework grading MCP server. Exposes `grade_homework` to LLM hosts over stdio.

pub mod config;
pub mod protocol;
pub mod tools;
pub mod transport;
pub mod types;

pub use config::ServerConfig;
pub use protocol::ProtocolHandler;
pub use transport::StdioTransport;
