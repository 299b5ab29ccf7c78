//! Declarative per-run tool policy.
//!
//! Generalizes the teacher's stuck-loop counter/threshold shape in
//! `agent/loop_guard.rs` from ad hoc repetition detection into a declarative
//! rule set: which tool must start a run, which tools end it, which tools
//! may only be followed by a fixed set of children, and per-tool call caps.

use crate::config::Profile;
use std::collections::HashMap;

/// One declarative rule governing tool dispatch over the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRule {
    /// The run must begin with a call to this tool.
    Initial(String),
    /// Calling this tool ends the run immediately after its result is captured.
    Terminal(String),
    /// After calling this tool, the next call must be one of the listed tools.
    Child(String, Vec<String>),
    /// This tool may be called at most `n` times per run.
    MaxCount(String, u32),
    /// This tool never terminates the run, even if also declared `Terminal`.
    ContinueAfter(String),
}

/// Evaluates `ToolRule`s against the calls made so far in a single run.
/// Owned exclusively by the `AgentLoop` driving that run; `reset()` between
/// runs rather than reconstructing.
#[derive(Debug, Clone)]
pub struct ToolRuleEngine {
    rules: Vec<ToolRule>,
    call_counts: HashMap<String, u32>,
    calls_made: u32,
}

impl ToolRuleEngine {
    pub fn new(rules: Vec<ToolRule>) -> Self {
        ToolRuleEngine {
            rules,
            call_counts: HashMap::new(),
            calls_made: 0,
        }
    }

    /// The default rule set for a profile (§4.2): general callers get
    /// conservative budgets, web/coder profiles raise the budgets for the
    /// tool families they lean on most.
    pub fn for_profile(profile: Profile) -> Self {
        let rules = match profile {
            Profile::General => vec![
                ToolRule::MaxCount("shell".to_string(), 20),
                ToolRule::MaxCount("browser".to_string(), 5),
                ToolRule::MaxCount("core_memory_read".to_string(), 10),
            ],
            Profile::Web => vec![
                ToolRule::MaxCount("browser".to_string(), 20),
                ToolRule::MaxCount("http".to_string(), 20),
                ToolRule::MaxCount("core_memory_read".to_string(), 10),
            ],
            Profile::Coder => vec![
                ToolRule::MaxCount("file".to_string(), 40),
                ToolRule::MaxCount("shell".to_string(), 40),
                ToolRule::MaxCount("core_memory_read".to_string(), 10),
            ],
        };
        ToolRuleEngine::new(rules)
    }

    /// Whether the run must open with a specific tool, and if so, which one.
    /// The loop checks this before its very first dispatch.
    pub fn required_initial(&self) -> Option<&str> {
        self.rules.iter().find_map(|r| match r {
            ToolRule::Initial(t) => Some(t.as_str()),
            _ => None,
        })
    }

    /// Whether the run should end after `after` completes. A `ContinueAfter`
    /// rule for the same tool always overrides a matching `Terminal`.
    pub fn should_terminate(&self, after: &str) -> bool {
        let continues = self
            .rules
            .iter()
            .any(|r| matches!(r, ToolRule::ContinueAfter(t) if t == after));
        if continues {
            return false;
        }
        self.rules
            .iter()
            .any(|r| matches!(r, ToolRule::Terminal(t) if t == after))
    }

    /// Whether `tool` has already been called as many times as its
    /// `MaxCount` rule allows (no rule means no limit).
    pub fn is_at_limit(&self, tool: &str) -> bool {
        let count = self.call_counts.get(tool).copied().unwrap_or(0);
        self.rules.iter().any(|r| match r {
            ToolRule::MaxCount(t, n) => t == tool && count >= *n,
            _ => false,
        })
    }

    /// The restricted set of tools allowed to follow `after`, if a `Child`
    /// rule constrains it.
    pub fn required_next(&self, after: &str) -> Option<&[String]> {
        self.rules.iter().find_map(|r| match r {
            ToolRule::Child(t, children) if t == after => Some(children.as_slice()),
            _ => None,
        })
    }

    /// Record a dispatched call, incrementing its counter.
    pub fn record(&mut self, tool: &str) {
        self.calls_made += 1;
        *self.call_counts.entry(tool.to_string()).or_insert(0) += 1;
    }

    /// Number of calls recorded so far this run.
    pub fn calls_made(&self) -> u32 {
        self.calls_made
    }

    /// Reset all per-run counters without discarding the rule set, so the
    /// same engine can be reused across runs in a warm worker.
    pub fn reset(&mut self) {
        self.call_counts.clear();
        self.calls_made = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_count_limits_are_enforced() {
        let mut engine = ToolRuleEngine::new(vec![ToolRule::MaxCount("shell".to_string(), 2)]);
        assert!(!engine.is_at_limit("shell"));
        engine.record("shell");
        assert!(!engine.is_at_limit("shell"));
        engine.record("shell");
        assert!(engine.is_at_limit("shell"));
    }

    #[test]
    fn unrestricted_tools_never_hit_a_limit() {
        let engine = ToolRuleEngine::new(vec![ToolRule::MaxCount("shell".to_string(), 1)]);
        assert!(!engine.is_at_limit("browser"));
    }

    #[test]
    fn terminal_rule_ends_the_run() {
        let engine = ToolRuleEngine::new(vec![ToolRule::Terminal("finish".to_string())]);
        assert!(engine.should_terminate("finish"));
        assert!(!engine.should_terminate("shell"));
    }

    #[test]
    fn continue_after_overrides_terminal() {
        let engine = ToolRuleEngine::new(vec![
            ToolRule::Terminal("browser".to_string()),
            ToolRule::ContinueAfter("browser".to_string()),
        ]);
        assert!(!engine.should_terminate("browser"));
    }

    #[test]
    fn child_rule_restricts_next_call() {
        let engine = ToolRuleEngine::new(vec![ToolRule::Child(
            "plan".to_string(),
            vec!["shell".to_string(), "file".to_string()],
        )]);
        assert_eq!(
            engine.required_next("plan"),
            Some(&["shell".to_string(), "file".to_string()][..])
        );
        assert_eq!(engine.required_next("shell"), None);
    }

    #[test]
    fn initial_rule_is_reported() {
        let engine = ToolRuleEngine::new(vec![ToolRule::Initial("core_memory_read".to_string())]);
        assert_eq!(engine.required_initial(), Some("core_memory_read"));
    }

    #[test]
    fn reset_clears_counters_not_rules() {
        let mut engine = ToolRuleEngine::new(vec![ToolRule::MaxCount("shell".to_string(), 1)]);
        engine.record("shell");
        assert!(engine.is_at_limit("shell"));
        engine.reset();
        assert!(!engine.is_at_limit("shell"));
        assert_eq!(engine.calls_made(), 0);
    }

    #[test]
    fn profile_defaults_match_spec_budgets() {
        let general = ToolRuleEngine::for_profile(Profile::General);
        assert!(general
            .rules
            .contains(&ToolRule::MaxCount("shell".to_string(), 20)));

        let web = ToolRuleEngine::for_profile(Profile::Web);
        assert!(web
            .rules
            .contains(&ToolRule::MaxCount("browser".to_string(), 20)));

        let coder = ToolRuleEngine::for_profile(Profile::Coder);
        assert!(coder
            .rules
            .contains(&ToolRule::MaxCount("file".to_string(), 40)));
    }
}
