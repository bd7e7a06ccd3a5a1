//! Detection of unproductive repetition in the agent's actions.
//!
//! Every tool call and every text response is reduced to a signature
//! string and appended to a bounded history. Two patterns are reported:
//! the same signature N times in a row, and a block of L signatures
//! repeated back to back.

use serde_json::Value;
use std::collections::VecDeque;

pub const DEFAULT_MAX_EXACT_REPEATS: usize = 3;
pub const DEFAULT_MAX_CYCLE_LENGTH: usize = 4;
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

#[derive(Debug, Clone)]
pub struct LoopDetector {
    max_exact_repeats: usize,
    max_cycle_length: usize,
    capacity: usize,
    history: VecDeque<String>,
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::with_limits(
            DEFAULT_MAX_EXACT_REPEATS,
            DEFAULT_MAX_CYCLE_LENGTH,
            DEFAULT_HISTORY_CAPACITY,
        )
    }
}

impl LoopDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_exact_repeats: usize, max_cycle_length: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            max_exact_repeats: max_exact_repeats.max(1),
            max_cycle_length,
            capacity,
            history: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a tool call. Argument keys are sorted so the signature does
    /// not depend on the order the model emitted them in.
    pub fn record_tool_call(&mut self, name: &str, args: &Value) {
        let mut parts = vec!["tool_call".to_string(), name.to_string()];
        if let Value::Object(map) = args {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                let rendered = match &map[key] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                parts.push(format!("{key}={rendered}"));
            }
        }
        self.push(parts.join("|"));
    }

    pub fn record_response(&mut self, text: &str) {
        self.push(format!("response|{text}"));
    }

    fn push(&mut self, signature: String) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(signature);
    }

    /// Describe the loop the recent history is stuck in, if any.
    pub fn check_for_loop(&self) -> Option<String> {
        let len = self.history.len();
        if len < 2 {
            return None;
        }

        let n = self.max_exact_repeats;
        if len >= n {
            let last = &self.history[len - 1];
            if self.history.iter().skip(len - n).all(|s| s == last) {
                return Some(format!("Same action repeated {n} times"));
            }
        }

        if self.max_cycle_length >= 2 && len >= self.max_cycle_length * 2 {
            for cycle in 2..=self.max_cycle_length {
                let start = len - cycle * 2;
                let repeated = (0..cycle)
                    .all(|i| self.history[start + i] == self.history[start + cycle + i]);
                if repeated {
                    return Some(format!("Detected repeating cycle of length {cycle}"));
                }
            }
        }

        None
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fewer_than_two_actions_is_never_a_loop() {
        let mut detector = LoopDetector::with_limits(1, 4, 20);
        assert_eq!(detector.check_for_loop(), None);
        detector.record_response("hi");
        assert_eq!(detector.check_for_loop(), None);
    }

    #[test]
    fn exact_repetition() {
        let mut detector = LoopDetector::with_limits(4, 4, 20);
        for _ in 0..3 {
            detector.record_tool_call("read_file", &json!({"path": "a.txt"}));
        }
        assert_eq!(detector.check_for_loop(), None);
        detector.record_tool_call("read_file", &json!({"path": "a.txt"}));
        assert_eq!(
            detector.check_for_loop().as_deref(),
            Some("Same action repeated 4 times")
        );
    }

    #[test]
    fn argument_order_does_not_matter() {
        let mut detector = LoopDetector::new();
        detector.record_tool_call("shell", &json!({"command": "ls", "timeout": 5}));
        detector.record_tool_call("shell", &json!({"timeout": 5, "command": "ls"}));
        detector.record_tool_call("shell", &json!({"command": "ls", "timeout": 5}));
        assert_eq!(
            detector.check_for_loop().as_deref(),
            Some("Same action repeated 3 times")
        );
    }

    #[test]
    fn different_arguments_are_different_actions() {
        let mut detector = LoopDetector::new();
        for i in 0..5 {
            detector.record_tool_call("read_file", &json!({"path": format!("{i}.txt")}));
        }
        assert_eq!(detector.check_for_loop(), None);
    }

    #[test]
    fn two_step_cycle() {
        let mut detector = LoopDetector::with_limits(3, 2, 20);
        detector.record_tool_call("a", &json!({}));
        detector.record_tool_call("b", &json!({}));
        detector.record_tool_call("a", &json!({}));
        detector.record_tool_call("b", &json!({}));
        assert_eq!(
            detector.check_for_loop().as_deref(),
            Some("Detected repeating cycle of length 2")
        );
    }

    #[test]
    fn cycle_needs_twice_max_length_of_history() {
        // With the default max cycle length of 4, eight entries are needed.
        let mut detector = LoopDetector::new();
        for name in ["a", "b", "a", "b"] {
            detector.record_tool_call(name, &json!({}));
        }
        assert_eq!(detector.check_for_loop(), None);
        for name in ["a", "b", "a", "b"] {
            detector.record_tool_call(name, &json!({}));
        }
        assert_eq!(
            detector.check_for_loop().as_deref(),
            Some("Detected repeating cycle of length 2")
        );
    }

    #[test]
    fn three_step_cycle() {
        let mut detector = LoopDetector::with_limits(3, 3, 20);
        for name in ["a", "b", "c", "a", "b", "c"] {
            detector.record_tool_call(name, &json!({}));
        }
        assert_eq!(
            detector.check_for_loop().as_deref(),
            Some("Detected repeating cycle of length 3")
        );
    }

    #[test]
    fn responses_participate() {
        let mut detector = LoopDetector::new();
        for _ in 0..3 {
            detector.record_response("I will try again.");
        }
        assert!(detector.check_for_loop().is_some());
    }

    #[test]
    fn history_is_bounded() {
        let mut detector = LoopDetector::with_limits(3, 4, 5);
        for i in 0..10 {
            detector.record_response(&i.to_string());
        }
        assert_eq!(detector.len(), 5);
    }

    #[test]
    fn clear_resets_history() {
        let mut detector = LoopDetector::new();
        for _ in 0..3 {
            detector.record_response("same");
        }
        detector.clear();
        assert!(detector.is_empty());
        detector.record_response("same");
        assert_eq!(detector.check_for_loop(), None);
    }
}
