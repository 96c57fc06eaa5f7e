//! Pause directives: `{{PAUSE:<seconds>}}` embedded in the text to type.
//!
//! A directive is consumed by the scheduler instead of being typed. The
//! grammar is strict: the keyword is case-sensitive, there is no internal
//! whitespace, and the number is ASCII digits with at most one fractional
//! part. Anything else is ordinary text.

use crate::error::BoundsError;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

pub const MIN_PAUSE_SECS: f64 = 0.0;
pub const MAX_PAUSE_SECS: f64 = 60.0;

const PATTERN: &str = r"\{\{PAUSE:([0-9]+(?:\.[0-9]+)?)\}\}";
const PREFIX: &str = "{{PAUSE:";

static DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PATTERN).expect("directive pattern is valid"));
static ANCHORED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{PATTERN}")).expect("directive pattern is valid"));

/// A directive found in a text. Positions are byte offsets; `end` is
/// exclusive and covers the whole directive.
#[derive(Debug, Clone, PartialEq)]
pub struct PauseDirective {
    pub start: usize,
    pub end: usize,
    /// Already clamped into the parser's bounds.
    pub duration_secs: f64,
    pub raw_text: String,
}

impl PauseDirective {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs)
    }
}

/// Finds directives and clamps their durations into `[min, max]` seconds.
#[derive(Debug, Clone)]
pub struct PauseDirectiveParser {
    min_secs: f64,
    max_secs: f64,
}

impl Default for PauseDirectiveParser {
    fn default() -> Self {
        Self {
            min_secs: MIN_PAUSE_SECS,
            max_secs: MAX_PAUSE_SECS,
        }
    }
}

impl PauseDirectiveParser {
    /// Parser with custom bounds. Requires `0 <= min <= max`, both finite.
    pub fn with_bounds(min_secs: f64, max_secs: f64) -> Result<Self, BoundsError> {
        let valid = min_secs.is_finite()
            && max_secs.is_finite()
            && min_secs >= 0.0
            && min_secs <= max_secs;
        if !valid {
            return Err(BoundsError {
                min: min_secs,
                max: max_secs,
            });
        }
        Ok(Self { min_secs, max_secs })
    }

    pub fn min_secs(&self) -> f64 {
        self.min_secs
    }

    pub fn max_secs(&self) -> f64 {
        self.max_secs
    }

    /// The directive starting exactly at byte offset `position`, if any.
    ///
    /// Never searches forward: a position inside a directive finds nothing.
    pub fn find_directive_at(&self, text: &str, position: usize) -> Option<PauseDirective> {
        let rest = text.get(position..)?;
        if !rest.starts_with(PREFIX) {
            return None;
        }
        let caps = ANCHORED.captures(rest)?;
        let whole = caps.get(0)?;
        let number = caps.get(1)?;
        Some(self.build(position, whole.as_str(), number.as_str()))
    }

    /// Every non-overlapping directive, left to right.
    pub fn find_all_directives(&self, text: &str) -> Vec<PauseDirective> {
        DIRECTIVE
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let number = caps.get(1)?;
                Some(self.build(whole.start(), whole.as_str(), number.as_str()))
            })
            .collect()
    }

    fn build(&self, start: usize, raw: &str, number: &str) -> PauseDirective {
        // The grammar only admits digits, so parsing can at worst overflow to
        // infinity, which clamps to the maximum.
        let requested = number.parse::<f64>().unwrap_or(f64::INFINITY);
        let directive = PauseDirective {
            start,
            end: start + raw.len(),
            duration_secs: self.validate_duration(requested),
            raw_text: raw.to_string(),
        };
        debug!(
            position = directive.start,
            raw = %directive.raw_text,
            secs = directive.duration_secs,
            "found pause directive"
        );
        directive
    }

    /// Clamp `secs` into `[min, max]`. NaN is treated as the minimum.
    pub fn validate_duration(&self, secs: f64) -> f64 {
        if secs.is_nan() || secs < self.min_secs {
            warn!(
                requested = secs,
                clamped = self.min_secs,
                "pause duration below minimum, clamping"
            );
            return self.min_secs;
        }
        if secs > self.max_secs {
            warn!(
                requested = secs,
                clamped = self.max_secs,
                "pause duration exceeds maximum, clamping"
            );
            return self.max_secs;
        }
        secs
    }

    /// `text` with every directive deleted, e.g. for previewing the output.
    pub fn remove_all_directives(&self, text: &str) -> String {
        DIRECTIVE.replace_all(text, "").into_owned()
    }

    /// Sum of all clamped directive durations, in seconds.
    pub fn total_pause_secs(&self, text: &str) -> f64 {
        self.find_all_directives(text)
            .iter()
            .map(|d| d.duration_secs)
            .sum()
    }

    pub fn directive_count(&self, text: &str) -> usize {
        DIRECTIVE.find_iter(text).count()
    }
}

/// Whether `text` contains at least one well-formed directive.
pub fn has_pause_directives(text: &str) -> bool {
    DIRECTIVE.is_match(text)
}
