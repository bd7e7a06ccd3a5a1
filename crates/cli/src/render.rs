//! Terminal rendering of the agent event stream.
//!
//! Model text goes to stdout so it can be piped; tool activity and errors
//! go to stderr.

use serde_json::Value;
use std::io::Write;
use steward_agent::AgentEvent;
use tokio::sync::mpsc;

const MAX_ARG_CHARS: usize = 80;

/// Argument keys shown first for each tool, in this order.
fn preferred_order(tool: &str) -> &'static [&'static str] {
    match tool {
        "read_file" => &["path", "offset", "limit"],
        "write_file" => &["path", "create_directories", "content"],
        "shell" => &["command", "timeout", "cwd"],
        "glob" => &["path", "pattern"],
        "web_fetch" => &["url", "timeout"],
        _ => &[],
    }
}

fn short_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let single_line = text.replace('\n', "\\n");
    match single_line.char_indices().nth(MAX_ARG_CHARS) {
        Some((end, _)) => format!("{}…", &single_line[..end]),
        None => single_line,
    }
}

/// One-line `key=value` summary of tool arguments.
pub fn format_arguments(tool: &str, arguments: &Value) -> String {
    let Value::Object(map) = arguments else {
        return short_value(arguments);
    };
    let preferred = preferred_order(tool);
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort_by_key(|k| {
        (
            preferred
                .iter()
                .position(|p| *p == k.as_str())
                .unwrap_or(preferred.len()),
            k.to_string(),
        )
    });
    keys.iter()
        .map(|k| format!("{k}={}", short_value(&map[k.as_str()])))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Summary of a finished run.
#[derive(Debug, Default, PartialEq)]
pub struct RenderOutcome {
    pub had_error: bool,
}

/// Print events until the stream closes.
pub async fn render_events(mut events: mpsc::Receiver<AgentEvent>) -> RenderOutcome {
    let mut outcome = RenderOutcome::default();
    let mut mid_line = false;

    while let Some(event) = events.recv().await {
        match event {
            AgentEvent::Start { .. } | AgentEvent::End { .. } => {}
            AgentEvent::TextDelta { content } => {
                print!("{content}");
                let _ = std::io::stdout().flush();
                mid_line = !content.ends_with('\n');
            }
            AgentEvent::TextComplete { .. } => {
                if mid_line {
                    println!();
                    mid_line = false;
                }
            }
            AgentEvent::ToolCallStart {
                name, arguments, ..
            } => {
                eprintln!("  ⚙ {name} {}", format_arguments(&name, &arguments));
            }
            AgentEvent::ToolCallComplete {
                name,
                success,
                output,
                error,
                truncated,
                ..
            } => {
                if success {
                    let lines = output.lines().count();
                    let note = if truncated { ", truncated" } else { "" };
                    eprintln!("  ✓ {name} ({lines} lines{note})");
                } else {
                    eprintln!("  ✗ {name}: {}", error.unwrap_or_default());
                }
            }
            AgentEvent::Error { message } => {
                if mid_line {
                    println!();
                    mid_line = false;
                }
                outcome.had_error = true;
                eprintln!("  [Error] {message}");
            }
        }
    }

    if mid_line {
        println!();
    }
    outcome
}
