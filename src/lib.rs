//! Fallback web search tool backed by the Tavily MCP endpoint.
//!
//! This crate provides [`WebSearchFallbackTool`], a web search tool meant to
//! sit next to a primary search tool and take over when that tool is
//! unavailable. It speaks the hosted Tavily MCP dialect: a single JSON-RPC
//! `tools/call` POST, a server-sent-events response body, and the first
//! textual result wins.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use websearch_fallback::{FallbackSearchConfig, Tool, WebSearchFallbackTool};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FallbackSearchConfig::new().with_api_key("your-api-key");
//! let tool = WebSearchFallbackTool::new(config);
//!
//! let result = tool.call(json!({"query": "Rust programming language"})).await?;
//! println!("{}", result);
//! # Ok(())
//! # }
//! ```
//!
//! Without [`FallbackSearchConfig::with_api_key`] the key is read from the
//! `TAVILY_API_KEY` environment variable on every call; an unset variable is
//! tolerated (the request goes out unauthenticated) but logged as a warning.

mod error;
mod search;
mod tool;

pub use error::SearchError;
pub use search::{FallbackSearchConfig, WebSearchFallbackTool};
pub use tool::{Tool, ToolContext, ToolDefinition};
