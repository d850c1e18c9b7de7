use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::SearchError;
use crate::tool::{Tool, ToolContext};

/// Hosted Tavily MCP endpoint.
const DEFAULT_ENDPOINT: &str = "https://mcp.tavily.com/mcp";
/// Environment variable consulted when no explicit API key is configured.
const DEFAULT_API_KEY_ENV: &str = "TAVILY_API_KEY";
/// Name of the remote tool invoked through the MCP endpoint.
const REMOTE_TOOL: &str = "tavily_search";
/// Value of the `X-Client-Source` header on every request.
const CLIENT_SOURCE: &str = "websearch-fallback";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);
const DEFAULT_MAX_RESULTS: u64 = 10;
const MAX_RESULTS_CEILING: u64 = 20;
const MAX_QUERY_CHARS: usize = 400;

/// Returned as a normal value when the response carries no usable result.
const NO_RESULTS_MESSAGE: &str = "No search results found. Please try a different query.";

const SEARCH_DEPTHS: &[&str] = &["ultra-fast", "fast", "basic", "advanced"];
const TIME_RANGES: &[&str] = &["day", "week", "month", "year"];

/// Configuration for [`WebSearchFallbackTool`].
#[derive(Debug, Clone)]
pub struct FallbackSearchConfig {
    /// Explicit API key; overrides the environment lookup when set.
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Endpoint receiving the JSON-RPC `tools/call` request.
    pub endpoint: String,
    /// Upper bound on the time a request may stay in flight.
    pub timeout: Duration,
}

impl Default for FallbackSearchConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackSearchConfig {
    pub fn new() -> Self {
        Self {
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a fixed API key instead of reading the environment.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Read the API key from a different environment variable.
    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = var.into();
        self
    }

    /// Send requests to a different endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the bearer token for one request.
    ///
    /// The environment is consulted on every call; nothing is cached. A
    /// missing key is tolerated (the request goes out unauthenticated) but
    /// logged, so the condition stays observable.
    pub fn resolve_api_key(&self) -> String {
        let key = match &self.api_key {
            Some(key) => key.clone(),
            None => std::env::var(&self.api_key_env).unwrap_or_default(),
        };
        if key.is_empty() {
            tracing::warn!(
                "{} is not set; sending unauthenticated search request",
                self.api_key_env
            );
        }
        key
    }
}

/// Arguments forwarded to the remote `tavily_search` tool, under its own
/// snake_case parameter names. Absent optionals are omitted from the wire.
#[derive(Debug, Serialize)]
struct RemoteArguments {
    query: String,
    max_results: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_depth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_date: Option<String>,
}

/// Web search tool backed by the hosted Tavily MCP endpoint.
///
/// Intended as a fallback when the primary web search tool is unavailable.
/// Each call issues exactly one HTTP POST; there are no retries, no caching,
/// and no state shared between calls.
pub struct WebSearchFallbackTool {
    config: FallbackSearchConfig,
    client: reqwest::Client,
}

impl WebSearchFallbackTool {
    pub fn new(config: FallbackSearchConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn search(
        &self,
        arguments: RemoteArguments,
        context: &ToolContext,
    ) -> Result<String, SearchError> {
        let api_key = self.config.resolve_api_key();
        let envelope = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": REMOTE_TOOL, "arguments": arguments },
        });

        tracing::debug!("dispatching fallback search to {}", self.config.endpoint);
        let send = self
            .client
            .post(&self.config.endpoint)
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .header("X-Client-Source", CLIENT_SOURCE)
            .bearer_auth(&api_key)
            .json(&envelope)
            .send();

        // The deadline and the caller's signal race the request; whichever
        // fires first wins, and dropping the select disarms the others.
        let response = tokio::select! {
            result = send => result?,
            _ = tokio::time::sleep(self.config.timeout) => return Err(SearchError::Timeout),
            _ = context.abort.cancelled() => return Err(SearchError::Cancelled),
        };

        let status = response.status();
        // The deadline is disarmed once the response settles; only the caller
        // can still cancel the body read.
        let body = tokio::select! {
            result = response.text() => result?,
            _ = context.abort.cancelled() => return Err(SearchError::Cancelled),
        };

        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        match first_result_text(&body)? {
            Some(text) => Ok(text),
            None => {
                tracing::debug!("fallback search returned no results");
                Ok(NO_RESULTS_MESSAGE.to_string())
            }
        }
    }
}

#[async_trait]
impl Tool for WebSearchFallbackTool {
    fn name(&self) -> &'static str {
        "websearch_fallback"
    }

    fn description(&self) -> &'static str {
        "Search the web via the Tavily MCP endpoint. \
         Use this tool if the primary web search tool is not working."
    }

    fn parameters(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "maxLength": 400,
                    "description": "Search query"
                },
                "maxResults": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 20,
                    "description": "Number of search results to return (default 10)"
                },
                "searchDepth": {
                    "type": "string",
                    "enum": ["ultra-fast", "fast", "basic", "advanced"],
                    "description": "Search depth for the search"
                },
                "timeRange": {
                    "type": "string",
                    "enum": ["day", "week", "month", "year"],
                    "description": "Time range for the search"
                },
                "startDate": {
                    "type": "string",
                    "pattern": "^\\d{4}-\\d{2}-\\d{2}$",
                    "description": "Start date in YYYY-MM-DD format"
                },
                "endDate": {
                    "type": "string",
                    "pattern": "^\\d{4}-\\d{2}-\\d{2}$",
                    "description": "End date in YYYY-MM-DD format"
                }
            },
            "required": ["query"]
        }))
    }

    async fn call_with_context(
        &self,
        args: Value,
        context: &ToolContext,
    ) -> Result<Value, SearchError> {
        let arguments = parse_arguments(&args)?;
        let text = self.search(arguments, context).await?;
        Ok(Value::String(text))
    }
}

/// Validate the tool arguments and remap them to the remote parameter names.
///
/// Every violation fails before any network activity.
fn parse_arguments(args: &Value) -> Result<RemoteArguments, SearchError> {
    let query = args
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| SearchError::InvalidArguments("missing 'query'".to_string()))?;
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(SearchError::InvalidArguments(format!(
            "'query' longer than {MAX_QUERY_CHARS} characters"
        )));
    }

    let max_results = match args.get("maxResults") {
        None | Some(Value::Null) => DEFAULT_MAX_RESULTS,
        Some(value) => {
            let n = value.as_u64().ok_or_else(|| {
                SearchError::InvalidArguments("'maxResults' must be an integer".to_string())
            })?;
            if !(1..=MAX_RESULTS_CEILING).contains(&n) {
                return Err(SearchError::InvalidArguments(format!(
                    "'maxResults' must be between 1 and {MAX_RESULTS_CEILING}"
                )));
            }
            n
        }
    };

    Ok(RemoteArguments {
        query: query.to_string(),
        max_results,
        search_depth: optional_enum(args, "searchDepth", SEARCH_DEPTHS)?,
        time_range: optional_enum(args, "timeRange", TIME_RANGES)?,
        start_date: optional_date(args, "startDate")?,
        end_date: optional_date(args, "endDate")?,
    })
}

fn optional_enum(
    args: &Value,
    field: &str,
    allowed: &[&str],
) -> Result<Option<String>, SearchError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let s = value.as_str().ok_or_else(|| {
                SearchError::InvalidArguments(format!("'{field}' must be a string"))
            })?;
            if !allowed.contains(&s) {
                return Err(SearchError::InvalidArguments(format!(
                    "'{field}' must be one of: {}",
                    allowed.join(" | ")
                )));
            }
            Ok(Some(s.to_string()))
        }
    }
}

fn optional_date(args: &Value, field: &str) -> Result<Option<String>, SearchError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let s = value.as_str().ok_or_else(|| {
                SearchError::InvalidArguments(format!("'{field}' must be a string"))
            })?;
            let re = Regex::new(r"^\d{4}-\d{2}-\d{2}$")
                .map_err(|e| SearchError::InvalidArguments(format!("date pattern: {e}")))?;
            if !re.is_match(s) {
                return Err(SearchError::InvalidArguments(format!(
                    "'{field}' must match YYYY-MM-DD"
                )));
            }
            Ok(Some(s.to_string()))
        }
    }
}

/// Scan an event-stream body for the first `data: ` line whose payload has a
/// non-empty `result.content` list; return that first item's text.
///
/// A qualifying line that is not valid JSON aborts the scan. A payload
/// without usable content is skipped and scanning continues.
fn first_result_text(body: &str) -> Result<Option<String>, SearchError> {
    for line in body.lines() {
        if let Some(payload) = line.strip_prefix("data: ") {
            let data: Value = serde_json::from_str(payload)?;
            match data["result"]["content"].as_array() {
                Some(items) if !items.is_empty() => {
                    let text = items[0]
                        .get("text")
                        .and_then(Value::as_str)
                        .ok_or(SearchError::MissingText)?;
                    return Ok(Some(text.to_string()));
                }
                _ => continue,
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_apply_defaults() {
        let args = parse_arguments(&json!({"query": "rust"})).unwrap();
        assert_eq!(args.query, "rust");
        assert_eq!(args.max_results, 10);
        assert!(args.search_depth.is_none());
        assert!(args.time_range.is_none());
        assert!(args.start_date.is_none());
        assert!(args.end_date.is_none());
    }

    #[test]
    fn arguments_pass_through_optionals() {
        let args = parse_arguments(&json!({
            "query": "rust",
            "maxResults": 3,
            "searchDepth": "advanced",
            "timeRange": "week",
            "startDate": "2024-01-01",
            "endDate": "2024-02-01",
        }))
        .unwrap();
        assert_eq!(args.max_results, 3);
        assert_eq!(args.search_depth.as_deref(), Some("advanced"));
        assert_eq!(args.time_range.as_deref(), Some("week"));
        assert_eq!(args.start_date.as_deref(), Some("2024-01-01"));
        assert_eq!(args.end_date.as_deref(), Some("2024-02-01"));
    }

    #[test]
    fn arguments_reject_long_query() {
        let query = "q".repeat(401);
        let err = parse_arguments(&json!({"query": query})).unwrap_err();
        assert!(err.to_string().contains("query"), "{err}");
    }

    #[test]
    fn arguments_reject_max_results_out_of_range() {
        for bad in [0, 21] {
            let result = parse_arguments(&json!({"query": "rust", "maxResults": bad}));
            assert!(result.is_err(), "maxResults={bad} should be rejected");
        }
    }

    #[test]
    fn arguments_reject_unknown_enums() {
        assert!(parse_arguments(&json!({"query": "q", "searchDepth": "deep"})).is_err());
        assert!(parse_arguments(&json!({"query": "q", "timeRange": "decade"})).is_err());
    }

    #[test]
    fn arguments_reject_bad_dates() {
        for bad in ["2024/01/01", "01-01-2024", "2024-1-1", "yesterday"] {
            let result = parse_arguments(&json!({"query": "q", "startDate": bad}));
            assert!(result.is_err(), "startDate={bad} should be rejected");
        }
    }

    #[test]
    fn remote_arguments_omit_absent_optionals() {
        let args = parse_arguments(&json!({"query": "rust"})).unwrap();
        let wire = serde_json::to_value(&args).unwrap();
        assert_eq!(wire, json!({"query": "rust", "max_results": 10}));
    }

    #[test]
    fn scanner_returns_first_matching_line() {
        let body = "event: message\n\
                    data: {\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"first\"}]}}\n\
                    data: {\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"second\"}]}}\n";
        assert_eq!(first_result_text(body).unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn scanner_skips_empty_content_then_matches() {
        let body = "data: {\"result\":{\"content\":[]}}\n\
                    data: {\"result\":{\"content\":[{\"text\":\"later\"}]}}\n";
        assert_eq!(first_result_text(body).unwrap().as_deref(), Some("later"));
    }

    #[test]
    fn scanner_ignores_non_data_lines() {
        let body = ": keepalive\nevent: message\nid: 1\n\n";
        assert_eq!(first_result_text(body).unwrap(), None);
    }

    #[test]
    fn scanner_requires_exact_prefix() {
        // No space after the colon, so the line does not qualify.
        let body = "data:{\"result\":{\"content\":[{\"text\":\"x\"}]}}\n";
        assert_eq!(first_result_text(body).unwrap(), None);
    }

    #[test]
    fn scanner_fails_on_malformed_payload() {
        let body = "data: {not json\n";
        let err = first_result_text(body).unwrap_err();
        assert!(matches!(err, SearchError::Payload(_)), "{err}");
    }

    #[test]
    fn scanner_fails_on_missing_text() {
        let body = "data: {\"result\":{\"content\":[{\"type\":\"image\"}]}}\n";
        let err = first_result_text(body).unwrap_err();
        assert!(matches!(err, SearchError::MissingText), "{err}");
    }

    #[test]
    fn scanner_handles_crlf_lines() {
        let body = "data: {\"result\":{\"content\":[{\"text\":\"crlf\"}]}}\r\n\r\n";
        assert_eq!(first_result_text(body).unwrap().as_deref(), Some("crlf"));
    }
}
