//! Web fetch tool — GET a URL and return the body as text.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use steward_core::error::ToolError;
use steward_core::schema::{ParamType, Parameter, ParameterSchema};
use steward_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};
use tracing::debug;

use crate::truncate_bytes;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MIN_TIMEOUT_SECS: u64 = 5;
pub const MAX_TIMEOUT_SECS: u64 = 120;
const MAX_CONTENT_BYTES: usize = 100 * 1024;

pub struct WebFetchTool;

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch content from a URL. Returns the response body as text"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Network
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .param(
                Parameter::new("url", ParamType::String)
                    .required()
                    .describe("URL to fetch (must be http:// or https://)"),
            )
            .param(
                Parameter::new("timeout", ParamType::Integer)
                    .describe("Request timeout in seconds (default: 30)")
                    .default_value(json!(DEFAULT_TIMEOUT_SECS))
                    .range(MIN_TIMEOUT_SECS as f64, MAX_TIMEOUT_SECS as f64),
            )
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let url = invocation
            .str_param("url")
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        match reqwest::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Ok(ToolResult::failure("Url must be http:// or https://")),
        }

        let timeout_secs = invocation
            .u64_param("timeout")
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_fetch".into(),
                reason: e.to_string(),
            })?;

        debug!(url = %url, timeout_secs, "Fetching URL");

        let mut response = match client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::failure(format!("Request failed: {e}"))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::failure(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ))
            .with_metadata("status_code", json!(status.as_u16())));
        }

        // Stop reading once past the cap; the rest of the body is never buffered.
        let declared_length = response.content_length();
        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    body.extend_from_slice(&chunk);
                    if body.len() > MAX_CONTENT_BYTES {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => return Ok(ToolResult::failure(format!("Request failed: {e}"))),
            }
        }
        let content_length = declared_length.unwrap_or(body.len() as u64);
        let text = String::from_utf8_lossy(&body);
        let (kept, truncated) = truncate_bytes(&text, MAX_CONTENT_BYTES);
        let mut output = kept.to_string();
        if truncated {
            output.push_str("\n... [content truncated]");
        }

        Ok(ToolResult::success(output)
            .with_truncated(truncated)
            .with_metadata("status_code", json!(status.as_u16()))
            .with_metadata("content_length", json!(content_length)))
    }
}
