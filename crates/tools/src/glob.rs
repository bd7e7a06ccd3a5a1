//! Glob tool — find files by pattern.

use async_trait::async_trait;
use glob::MatchOptions;
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use steward_core::error::ToolError;
use steward_core::schema::{ParamType, Parameter, ParameterSchema};
use steward_core::tool::{Tool, ToolInvocation, ToolKind, ToolResult};

use crate::DIR_SCAN_EXCLUDES;

pub const MAX_RESULTS: usize = 1000;

pub struct GlobTool;

fn in_excluded_dir(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| matches!(c, Component::Normal(name) if DIR_SCAN_EXCLUDES.iter().any(|ex| name == *ex)))
}

/// Files under `root` matching `pattern`, in lexical order.
fn find_matches(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, glob::PatternError> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        pattern.trim_start_matches("./")
    );
    let paths = glob::glob_with(&full, MatchOptions::new())?;
    Ok(paths
        .filter_map(Result::ok)
        .filter(|p| p.is_file() && !in_excluded_dir(p, root))
        .collect())
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern. Supports ** for recursive matching."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Read
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .param(
                Parameter::new("pattern", ParamType::String)
                    .required()
                    .describe("Glob pattern to match"),
            )
            .param(
                Parameter::new("path", ParamType::String)
                    .describe("Directory to search in (default: current directory)")
                    .default_value(json!(".")),
            )
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let pattern = invocation
            .str_param("pattern")
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'pattern' argument".into()))?
            .to_string();
        let search_path = invocation.resolve_path(invocation.str_param("path").unwrap_or("."));

        if !search_path.is_dir() {
            return Ok(ToolResult::failure(format!(
                "Directory does not exist: {}",
                search_path.display()
            )));
        }

        let root = search_path.clone();
        let matches = tokio::task::spawn_blocking(move || find_matches(&root, &pattern))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "glob".into(),
                reason: e.to_string(),
            })?;
        let matches = match matches {
            Ok(m) => m,
            Err(e) => return Ok(ToolResult::failure(format!("Error searching: {e}"))),
        };

        let mut lines: Vec<String> = matches
            .iter()
            .take(MAX_RESULTS)
            .map(|p| {
                p.strip_prefix(&invocation.cwd)
                    .unwrap_or(p)
                    .display()
                    .to_string()
            })
            .collect();
        let truncated = matches.len() > MAX_RESULTS;
        if truncated {
            lines.push(format!("...(limited to {MAX_RESULTS} results)"));
        }

        Ok(ToolResult::success(lines.join("\n"))
            .with_truncated(truncated)
            .with_metadata("path", json!(search_path.display().to_string()))
            .with_metadata("matches", json!(matches.len())))
    }
}
