//! Read file tool — line-numbered file contents.

use async_trait::async_trait;
use serde_json::json;
use steward_core::error::ToolError;
use steward_core::schema::{ParamType, Parameter, ParameterSchema};
use steward_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};

const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const MAX_OUTPUT_TOKENS: usize = 25_000;
/// Rough chars-per-token ratio used to cap output size.
const CHARS_PER_TOKEN: usize = 4;
const BINARY_SNIFF_BYTES: usize = 8192;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file. Returns lines prefixed with their line numbers. \
         Use offset and limit to read part of a large file."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .param(
                Parameter::new("path", ParamType::String)
                    .required()
                    .describe("Path to the file, absolute or relative to the working directory"),
            )
            .param(
                Parameter::new("offset", ParamType::Integer)
                    .describe("Line number to start reading from (1-based)")
                    .default_value(json!(1))
                    .min(1.0),
            )
            .param(
                Parameter::new("limit", ParamType::Integer)
                    .describe("Maximum number of lines to read")
                    .min(1.0),
            )
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let raw_path = invocation
            .str_param("path")
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let path = invocation.resolve_path(raw_path);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(_) => {
                return Ok(ToolResult::failure(format!(
                    "File not found: {}",
                    path.display()
                )));
            }
        };
        if metadata.is_dir() {
            return Ok(ToolResult::failure(format!(
                "Path is a directory: {}",
                path.display()
            )));
        }
        if metadata.len() > MAX_FILE_SIZE {
            return Ok(ToolResult::failure(format!(
                "File too large ({} bytes, max {MAX_FILE_SIZE})",
                metadata.len()
            )));
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) => return Ok(ToolResult::failure(format!("Failed to read file: {e}"))),
        };
        if bytes[..bytes.len().min(BINARY_SNIFF_BYTES)].contains(&0) {
            return Ok(ToolResult::failure(format!(
                "Cannot read binary file: {}",
                path.display()
            )));
        }

        let content = String::from_utf8_lossy(&bytes);
        let total_lines = content.lines().count();
        let offset = invocation.u64_param("offset").unwrap_or(1).max(1) as usize;
        let limit = invocation
            .u64_param("limit")
            .map_or(usize::MAX, |l| l as usize);

        let max_chars = MAX_OUTPUT_TOKENS * CHARS_PER_TOKEN;
        let mut output = String::new();
        let mut shown = 0;
        let mut truncated = false;
        for (index, line) in content.lines().enumerate().skip(offset - 1).take(limit) {
            let numbered = format!("{:>6}|{line}\n", index + 1);
            if output.len() + numbered.len() > max_chars {
                truncated = true;
                break;
            }
            output.push_str(&numbered);
            shown += 1;
        }

        if truncated {
            output.push_str(&format!(
                "... [output truncated after {shown} lines; use offset/limit to read more]"
            ));
        } else if offset > 1 && offset > total_lines && total_lines > 0 {
            return Ok(ToolResult::failure(format!(
                "Offset {offset} is past the end of the file ({total_lines} lines)"
            )));
        }

        Ok(ToolResult::success(output.trim_end_matches('\n'))
            .with_truncated(truncated)
            .with_metadata("path", json!(path.display().to_string()))
            .with_metadata("total_lines", json!(total_lines))
            .with_metadata("shown_lines", json!(shown)))
    }
}
