//! The state of one typing run: text snapshot, cursor and speed range.

use crate::error::SpeedError;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Standard typing-test assumption used to turn WPM into a per-character delay.
pub const CHARS_PER_WORD: f64 = 5.0;

pub const MIN_ALLOWED_WPM: f64 = 1.0;
pub const MAX_ALLOWED_WPM: f64 = 2000.0;

pub const DEFAULT_MIN_WPM: f64 = 100.0;
pub const DEFAULT_MAX_WPM: f64 = 250.0;

/// Inclusive words-per-minute range a delay is sampled from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WpmRange {
    min: f64,
    max: f64,
}

impl Default for WpmRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_WPM,
            max: DEFAULT_MAX_WPM,
        }
    }
}

impl WpmRange {
    pub fn new(min: f64, max: f64) -> Result<Self, SpeedError> {
        check_bounds("min", min)?;
        check_bounds("max", max)?;
        if min > max {
            return Err(SpeedError::Inverted { min, max });
        }
        Ok(Self { min, max })
    }

    /// Parse the two values as typed into a form field.
    pub fn parse(min: &str, max: &str) -> Result<Self, SpeedError> {
        Self::new(parse_field("min", min)?, parse_field("max", max)?)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Delay before the next keystroke at a freshly sampled speed.
    pub fn sample_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let wpm = if self.min < self.max {
            rng.gen_range(self.min..=self.max)
        } else {
            self.min
        };
        delay_for_wpm(wpm)
    }
}

/// `60 / (wpm * CHARS_PER_WORD)` seconds.
pub fn delay_for_wpm(wpm: f64) -> Duration {
    Duration::from_secs_f64(60.0 / (wpm * CHARS_PER_WORD))
}

fn check_bounds(field: &'static str, value: f64) -> Result<(), SpeedError> {
    if !(MIN_ALLOWED_WPM..=MAX_ALLOWED_WPM).contains(&value) {
        return Err(SpeedError::OutOfRange {
            field,
            value,
            min: MIN_ALLOWED_WPM,
            max: MAX_ALLOWED_WPM,
        });
    }
    Ok(())
}

fn parse_field(field: &'static str, value: &str) -> Result<f64, SpeedError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SpeedError::NotANumber {
            field,
            value: value.to_string(),
        })
}

/// Whether `ch` counts as leading indentation.
pub fn is_indent(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

/// One run over an immutable text snapshot.
///
/// `position` is a byte offset that always sits on a character boundary.
#[derive(Debug, Clone)]
pub struct TypingSession {
    text: Arc<str>,
    position: usize,
    at_line_start: bool,
    pub wpm: WpmRange,
    pub ignore_leading_whitespace: bool,
    pub language: String,
}

impl TypingSession {
    pub fn new(text: impl Into<Arc<str>>, wpm: WpmRange) -> Self {
        Self {
            text: text.into(),
            position: 0,
            at_line_start: true,
            wpm,
            ignore_leading_whitespace: false,
            language: String::new(),
        }
    }

    pub fn with_ignore_leading_whitespace(mut self, ignore: bool) -> Self {
        self.ignore_leading_whitespace = ignore;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn at_line_start(&self) -> bool {
        self.at_line_start
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.text.len()
    }

    /// Character under the cursor.
    pub fn current_char(&self) -> Option<char> {
        self.text[self.position..].chars().next()
    }

    /// Share of the text already consumed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.text.is_empty() {
            1.0
        } else {
            self.position as f64 / self.text.len() as f64
        }
    }

    /// Jump to `position` (clamped to the text, snapped back to a character
    /// boundary) and rebuild the line-start flag from the text.
    pub fn set_position(&mut self, position: usize) {
        let mut position = position.min(self.text.len());
        while !self.text.is_char_boundary(position) {
            position -= 1;
        }
        self.position = position;
        self.recompute_line_start();
    }

    /// The cursor is at line start when nothing but indentation sits between
    /// it and the previous newline (or the start of the text).
    pub fn recompute_line_start(&mut self) {
        let before = &self.text[..self.position];
        let line = before.rfind('\n').map_or(before, |nl| &before[nl + 1..]);
        self.at_line_start = line.chars().all(is_indent);
    }

    /// Move past the character under the cursor without typing it.
    pub(crate) fn skip_char(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += ch.len_utf8();
        }
    }

    pub(crate) fn leave_line_start(&mut self) {
        self.at_line_start = false;
    }

    /// Record that `ch` (the character under the cursor) was typed.
    pub(crate) fn advance(&mut self, ch: char) {
        self.position = (self.position + ch.len_utf8()).min(self.text.len());
        if ch == '\n' {
            self.at_line_start = true;
        }
    }
}
