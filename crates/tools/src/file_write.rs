//! Write file tool — create or overwrite files.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::PathBuf;
use steward_core::error::ToolError;
use steward_core::schema::{ParamType, Parameter, ParameterSchema};
use steward_core::tool::{Tool, ToolConfirmation, ToolInvocation, ToolKind, ToolResult};
use tracing::debug;

pub struct WriteFileTool;

impl WriteFileTool {
    fn target(invocation: &ToolInvocation) -> Option<PathBuf> {
        invocation.str_param("path").map(|p| invocation.resolve_path(p))
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates the file if it doesn't exist, overwrites if it does."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Write
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .param(
                Parameter::new("path", ParamType::String)
                    .required()
                    .describe("Path to the file, absolute or relative to the working directory"),
            )
            .param(
                Parameter::new("content", ParamType::String)
                    .required()
                    .describe("The full content to write"),
            )
            .param(
                Parameter::new("create_directories", ParamType::Boolean)
                    .describe("Create missing parent directories")
                    .default_value(json!(true)),
            )
    }

    fn affected_paths(&self, invocation: &ToolInvocation) -> Vec<PathBuf> {
        Self::target(invocation).into_iter().collect()
    }

    fn confirmation(&self, invocation: &ToolInvocation) -> ToolConfirmation {
        let target = Self::target(invocation);
        let bytes = invocation.str_param("content").map_or(0, str::len);
        let description = match &target {
            Some(path) if path.exists() => format!("Overwrite {} ({bytes} bytes)", path.display()),
            Some(path) => format!("Create {} ({bytes} bytes)", path.display()),
            None => "Write file".to_string(),
        };
        ToolConfirmation {
            tool_name: self.name().to_string(),
            params: invocation.params.clone(),
            description,
            affected_paths: target.into_iter().collect(),
            command: None,
        }
    }

    async fn execute(&self, invocation: ToolInvocation) -> Result<ToolResult, ToolError> {
        let path = Self::target(&invocation)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let content = invocation
            .str_param("content")
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;
        let create_directories = invocation.bool_param("create_directories").unwrap_or(true);

        if path.is_dir() {
            return Ok(ToolResult::failure(format!(
                "Path is a directory: {}",
                path.display()
            )));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            if !create_directories {
                return Ok(ToolResult::failure(format!(
                    "Parent directory does not exist: {}",
                    parent.display()
                )));
            }
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(ToolResult::failure(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                )));
            }
        }

        let is_new_file = !path.exists();
        if let Err(e) = tokio::fs::write(&path, content).await {
            return Ok(ToolResult::failure(format!("Failed to write file: {e}")));
        }

        debug!(path = %path.display(), bytes = content.len(), "Wrote file");
        let verb = if is_new_file { "Created" } else { "Updated" };
        Ok(ToolResult::success(format!(
            "{verb} {} ({} bytes)",
            path.display(),
            content.len()
        ))
        .with_metadata("path", Value::String(path.display().to_string()))
        .with_metadata("bytes", json!(content.len()))
        .with_metadata("is_new_file", json!(is_new_file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_new_file_creating_directories() {
        let dir = tempfile::tempdir().unwrap();
        let result = WriteFileTool
            .execute(ToolInvocation::new(
                json!({"path": "src/deep/out.txt", "content": "hello"}),
                dir.path(),
            ))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.starts_with("Created"));
        assert_eq!(result.metadata["is_new_file"], json!(true));
        let written = std::fs::read_to_string(dir.path().join("src/deep/out.txt")).unwrap();
        assert_eq!(written, "hello");
    }

    #[tokio::test]
    async fn overwrite_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old").unwrap();
        let result = WriteFileTool
            .execute(ToolInvocation::new(
                json!({"path": "a.txt", "content": "new"}),
                dir.path(),
            ))
            .await
            .unwrap();
        assert!(result.output.starts_with("Updated"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn missing_parent_without_create() {
        let dir = tempfile::tempdir().unwrap();
        let result = WriteFileTool
            .execute(ToolInvocation::new(
                json!({"path": "nope/a.txt", "content": "x", "create_directories": false}),
                dir.path(),
            ))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Parent directory does not exist"));
    }

    #[test]
    fn affected_paths_are_resolved() {
        let invocation = ToolInvocation::new(json!({"path": "out.txt", "content": ""}), "/work");
        assert_eq!(
            WriteFileTool.affected_paths(&invocation),
            vec![PathBuf::from("/work/out.txt")]
        );
    }

    #[test]
    fn confirmation_describes_write() {
        let invocation =
            ToolInvocation::new(json!({"path": "/nonexistent/x.txt", "content": "abc"}), "/");
        let confirmation = WriteFileTool.confirmation(&invocation);
        assert_eq!(confirmation.description, "Create /nonexistent/x.txt (3 bytes)");
        assert_eq!(confirmation.affected_paths, vec![PathBuf::from("/nonexistent/x.txt")]);
    }
}
