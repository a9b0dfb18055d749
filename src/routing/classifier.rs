//! Rule-based request classification.
//!
//! Maps free-form request text to a task kind, priority, and duration
//! estimate using an ordered table of scoring rules. Classification is a
//! pure function of the input text and the static rule table: identical
//! input always yields an identical result.
//!
//! ## Scoring
//!
//! Each rule accumulates +3.0 for a whole-text pattern match, +0.5 per
//! matched keyword, and +0.5 when the request exceeds the length
//! threshold. The highest-scoring rule wins; ties keep the earliest rule
//! in the table, so rule order is part of the contract. A zero score
//! falls back to planning at medium priority.

use crate::core::task::{TaskKind, TaskPriority};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Requests longer than this many words earn a complexity score bonus.
const LONG_REQUEST_WORDS: usize = 10;

/// Score contribution of a whole-text pattern match.
const PATTERN_SCORE: f64 = 3.0;
/// Score contribution per matched keyword.
const KEYWORD_SCORE: f64 = 0.5;
/// Score contribution of a long request.
const LENGTH_SCORE: f64 = 0.5;

/// Duration estimate in seconds when no rule matches.
const FALLBACK_DURATION: f64 = 3.0;

/// A single routing rule: pattern, keywords, and the classification it
/// produces when it wins.
struct RoutingRule {
    pattern: Regex,
    kind: TaskKind,
    priority: TaskPriority,
    keywords: &'static [&'static str],
    complexity_factor: f64,
}

static ROUTING_RULES: LazyLock<Vec<RoutingRule>> = LazyLock::new(|| {
    vec![
        RoutingRule {
            pattern: Regex::new(r"(screenshot|capture|analyze.*screen|what.*see|visual|image)")
                .unwrap(),
            kind: TaskKind::Analysis,
            priority: TaskPriority::High,
            keywords: &[
                "screenshot", "analyze", "visual", "see", "screen", "image", "detect",
            ],
            complexity_factor: 0.8,
        },
        RoutingRule {
            pattern: Regex::new(
                r"(write.*code|create.*function|implement|generate.*script|code.*for)",
            )
            .unwrap(),
            kind: TaskKind::CodeGen,
            priority: TaskPriority::High,
            keywords: &[
                "write", "create", "implement", "generate", "code", "function", "script",
            ],
            complexity_factor: 1.2,
        },
        RoutingRule {
            pattern: Regex::new(
                r"(create.*file|edit.*file|delete.*file|move.*file|copy.*file|read.*file)",
            )
            .unwrap(),
            kind: TaskKind::FileOps,
            priority: TaskPriority::Medium,
            keywords: &["create", "edit", "delete", "move", "copy", "read", "file"],
            complexity_factor: 0.6,
        },
        RoutingRule {
            pattern: Regex::new(r"(run.*command|execute|terminal|bash|shell|install|pip|npm)")
                .unwrap(),
            kind: TaskKind::Terminal,
            priority: TaskPriority::Medium,
            keywords: &[
                "run", "execute", "terminal", "command", "bash", "shell", "install",
            ],
            complexity_factor: 0.7,
        },
        RoutingRule {
            pattern: Regex::new(r"(open.*browser|navigate.*to|click.*button|fill.*form|scrape|web)")
                .unwrap(),
            kind: TaskKind::Browser,
            priority: TaskPriority::Medium,
            keywords: &["browser", "navigate", "click", "fill", "scrape", "web", "url"],
            complexity_factor: 1.0,
        },
        RoutingRule {
            pattern: Regex::new(r"(plan|strategy|how.*to|steps.*for|break.*down|analyze.*task)")
                .unwrap(),
            kind: TaskKind::Planning,
            priority: TaskPriority::High,
            keywords: &[
                "plan", "strategy", "how", "steps", "break", "analyze", "approach",
            ],
            complexity_factor: 1.5,
        },
        RoutingRule {
            pattern: Regex::new(r"(test|verify|check|validate|debug|error|fix)").unwrap(),
            kind: TaskKind::Testing,
            priority: TaskPriority::High,
            keywords: &["test", "verify", "check", "validate", "debug", "error", "fix"],
            complexity_factor: 1.1,
        },
        RoutingRule {
            pattern: Regex::new(r"(optimize|improve|performance|faster|efficient|reduce)").unwrap(),
            kind: TaskKind::Optimization,
            priority: TaskPriority::Low,
            keywords: &[
                "optimize", "improve", "performance", "faster", "efficient", "reduce",
            ],
            complexity_factor: 1.8,
        },
    ]
});

/// Result of classifying a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub kind: TaskKind,
    pub priority: TaskPriority,
    pub complexity_factor: f64,
    /// Estimated duration in seconds: the kind's base duration scaled by
    /// the rule's complexity factor.
    pub estimated_duration: f64,
}

/// Routing table statistics for status output.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingStats {
    pub total_rules: usize,
    pub rule_kinds: Vec<TaskKind>,
}

/// Classifies request text against the static routing rule table.
pub struct Classifier {
    rules: &'static [RoutingRule],
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            rules: ROUTING_RULES.as_slice(),
        }
    }

    /// Number of rules in the routing table.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// The kinds produced by the routing table, in rule order.
    pub fn rule_kinds(&self) -> Vec<TaskKind> {
        self.rules.iter().map(|r| r.kind).collect()
    }

    /// Summary of the routing table.
    pub fn stats(&self) -> RoutingStats {
        RoutingStats {
            total_rules: self.rule_count(),
            rule_kinds: self.rule_kinds(),
        }
    }

    /// Classify request text into a kind, priority, and duration estimate.
    pub fn classify(&self, text: &str) -> Classification {
        let lowered = text.to_lowercase();
        let long_request = text.split_whitespace().count() > LONG_REQUEST_WORDS;

        let mut best: Option<&RoutingRule> = None;
        let mut best_score = 0.0;

        for rule in self.rules {
            let mut score = 0.0;
            if rule.pattern.is_match(&lowered) {
                score += PATTERN_SCORE;
            }
            let keyword_matches = rule
                .keywords
                .iter()
                .filter(|keyword| lowered.contains(*keyword))
                .count();
            score += keyword_matches as f64 * KEYWORD_SCORE;
            if long_request {
                score += LENGTH_SCORE;
            }

            // Strictly greater: ties keep the earliest rule.
            if score > best_score {
                best_score = score;
                best = Some(rule);
            }
        }

        match best {
            Some(rule) => Classification {
                kind: rule.kind,
                priority: rule.priority,
                complexity_factor: rule.complexity_factor,
                estimated_duration: rule.kind.base_duration() * rule.complexity_factor,
            },
            None => Classification {
                kind: TaskKind::Planning,
                priority: TaskPriority::Medium,
                complexity_factor: 1.0,
                estimated_duration: FALLBACK_DURATION,
            },
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
