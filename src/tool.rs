use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::SearchError;

/// Call-scoped context handed to a tool by its caller.
///
/// The default context carries a token that is never cancelled, so
/// [`Tool::call`] behaves like a plain invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Cooperative cancellation signal owned by the caller. Cancelling it
    /// aborts an in-flight call at its next suspension point.
    pub abort: CancellationToken,
}

/// Description of a tool in the shape agent runtimes expect.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the accepted arguments.
    pub parameters: Value,
}

/// A callable tool exposed to an agent.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &'static str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &'static str;

    /// JSON Schema fragment describing the accepted arguments.
    fn parameters(&self) -> Option<Value> {
        None
    }

    /// Invoke the tool without an external cancellation signal.
    async fn call(&self, args: Value) -> Result<Value, SearchError> {
        self.call_with_context(args, &ToolContext::default()).await
    }

    /// Invoke the tool; `context.abort` cancels the call when the caller
    /// gives up on it.
    async fn call_with_context(
        &self,
        args: Value,
        context: &ToolContext,
    ) -> Result<Value, SearchError>;

    /// Bundle name, description, and parameter schema into a definition.
    fn as_tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self
                .parameters()
                .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
        }
    }
}
