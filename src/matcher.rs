//! Finds the pattern rule, if any, that starts at a given text position.

use crate::error::RuleError;
use crate::rules::{self, PatternRule};
use regex::{Regex, RegexBuilder};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// A successful lookup. Pauses are in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched_text: String,
    /// Length of `matched_text` in characters.
    pub length: usize,
    pub category: String,
    pub speed_multiplier: f64,
    pub pause_before: f64,
    pub pause_after: f64,
}

struct CompiledRule {
    rule: PatternRule,
    regex: Regex,
}

/// The ordered rule list for one language.
///
/// Rules are sorted by descending token length, ties keeping table order, so
/// the first rule that matches at a position is also the longest one.
pub struct CompiledMatcher {
    language: String,
    rules: Vec<CompiledRule>,
}

impl CompiledMatcher {
    /// Compile every rule that applies to `language`.
    ///
    /// Unknown languages compile to the universal operator and punctuation
    /// rules only.
    pub fn compile(language: &str) -> Self {
        Self::from_rules(language, rules::rules_for(language))
    }

    /// Compile an explicit rule list, e.g. a custom table.
    pub fn from_rules(language: &str, rules: Vec<PatternRule>) -> Self {
        let mut compiled: Vec<CompiledRule> = rules
            .into_iter()
            .filter_map(|rule| match token_regex(rule.token()) {
                Ok(regex) => Some(CompiledRule { rule, regex }),
                Err(err) => {
                    warn!(%err, "skipping uncompilable rule");
                    None
                }
            })
            .collect();
        compiled.sort_by(|a, b| b.rule.char_len().cmp(&a.rule.char_len()));

        debug!(language, rules = compiled.len(), "compiled pattern matcher");
        Self {
            language: language.trim().to_lowercase(),
            rules: compiled,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rules in match order.
    pub fn rules(&self) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// First rule, in match order, whose token starts exactly at byte offset
    /// `position` in `text`.
    ///
    /// Returns `None` past the end of `text` or off a character boundary.
    pub fn find_at(&self, text: &str, position: usize) -> Option<MatchResult> {
        if position >= text.len() || !text.is_char_boundary(position) {
            return None;
        }
        let rest = &text[position..];

        for compiled in &self.rules {
            let token = compiled.rule.token();
            if !rest.starts_with(token) {
                continue;
            }
            // Keep the preceding text for the leading `\b` and one character
            // past the token for the trailing one.
            let end = position + token.len();
            let limit = text[end..].chars().next().map_or(end, |c| end + c.len_utf8());
            let Some(m) = compiled.regex.find_at(&text[..limit], position) else {
                continue;
            };
            if m.start() != position {
                continue;
            }

            let rule = &compiled.rule;
            return Some(MatchResult {
                matched_text: m.as_str().to_string(),
                length: m.as_str().chars().count(),
                category: rule.category().to_string(),
                speed_multiplier: rule.speed_multiplier(),
                pause_before: rule.pause_before(),
                pause_after: rule.pause_after(),
            });
        }
        None
    }
}

/// Compiled size allowed for one token's regex.
const TOKEN_SIZE_LIMIT: usize = 1 << 16;

/// Escape `token` and anchor alphanumeric ends to word boundaries so `int`
/// does not match inside `interest`. Symbolic ends match exactly.
fn token_regex(token: &str) -> Result<Regex, RuleError> {
    let escaped = regex::escape(token);
    let lead = match token.chars().next() {
        Some(c) if c.is_alphanumeric() => r"\b",
        _ => "",
    };
    let trail = match token.chars().last() {
        Some(c) if c.is_alphanumeric() => r"\b",
        _ => "",
    };
    RegexBuilder::new(&format!("{lead}{escaped}{trail}"))
        .size_limit(TOKEN_SIZE_LIMIT)
        .build()
        .map_err(|source| RuleError::Regex {
            token: token.to_string(),
            source,
        })
}

/// Shared, swappable matcher.
///
/// Lookups take a snapshot of the current [`CompiledMatcher`], so a
/// concurrent [`set_language`](Self::set_language) is seen either entirely
/// or not at all.
pub struct PatternMatcher {
    current: RwLock<Arc<CompiledMatcher>>,
}

impl PatternMatcher {
    pub fn new(language: &str) -> Self {
        Self {
            current: RwLock::new(Arc::new(CompiledMatcher::compile(language))),
        }
    }

    /// Compile `language` and replace the active matcher wholesale.
    pub fn set_language(&self, language: &str) {
        let compiled = Arc::new(CompiledMatcher::compile(language));
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = compiled;
    }

    /// The matcher currently in effect.
    pub fn snapshot(&self) -> Arc<CompiledMatcher> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn language(&self) -> String {
        self.snapshot().language().to_string()
    }

    pub fn find_pattern_at(&self, text: &str, position: usize) -> Option<MatchResult> {
        self.snapshot().find_at(text, position)
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new("java")
    }
}
