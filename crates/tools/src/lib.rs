//! Built-in tool implementations for Steward.
//!
//! Tools give the agent the ability to interact with the world:
//! read and write files, find files by pattern, run shell commands, and
//! fetch web pages. Each one is a thin adapter over the
//! [`steward_core::Tool`] protocol; approval and parameter validation
//! happen before `execute` is ever called.

pub mod file_read;
pub mod file_write;
pub mod glob;
pub mod shell;
pub mod web_fetch;

use steward_config::ShellEnvironmentPolicy;
use steward_core::tool::ToolRegistry;

pub use file_read::ReadFileTool;
pub use file_write::WriteFileTool;
pub use glob::GlobTool;
pub use shell::ShellTool;
pub use web_fetch::WebFetchTool;

/// Directories never descended into when listing files.
pub const DIR_SCAN_EXCLUDES: &[&str] = &["node_modules", "__pycache__", ".git", ".venv", "venv"];

/// Create a registry holding every built-in tool.
pub fn default_registry(shell_environment: &ShellEnvironmentPolicy) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ReadFileTool));
    registry.register(Box::new(WriteFileTool));
    registry.register(Box::new(GlobTool));
    registry.register(Box::new(ShellTool::new(shell_environment.clone())));
    registry.register(Box::new(WebFetchTool));
    registry
}

/// Cut `text` to at most `max_bytes`, backing off to a char boundary.
/// Returns the kept prefix and whether anything was dropped.
pub(crate) fn truncate_bytes(text: &str, max_bytes: usize) -> (&str, bool) {
    if text.len() <= max_bytes {
        return (text, false);
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    (&text[..end], true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_all_tools() {
        let registry = default_registry(&ShellEnvironmentPolicy::default());
        assert_eq!(
            registry.names(),
            vec!["glob", "read_file", "shell", "web_fetch", "write_file"]
        );
    }

    #[test]
    fn mutation_classes_of_builtins() {
        let registry = default_registry(&ShellEnvironmentPolicy::default());
        let params = serde_json::json!({});
        assert!(registry.get("write_file").unwrap().is_mutating(&params));
        assert!(registry.get("shell").unwrap().is_mutating(&params));
        assert!(!registry.get("read_file").unwrap().is_mutating(&params));
        assert!(!registry.get("glob").unwrap().is_mutating(&params));
        assert!(!registry.get("web_fetch").unwrap().is_mutating(&params));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_bytes("hello", 10), ("hello", false));
        assert_eq!(truncate_bytes("hello", 3), ("hel", true));
        // "é" is two bytes; cutting inside it backs off.
        assert_eq!(truncate_bytes("aé", 2), ("a", true));
    }
}
