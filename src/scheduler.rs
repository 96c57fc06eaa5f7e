//! The scan step: decides what happens at the session's cursor.
//!
//! [`Scheduler::next_step`] is a pure decision plus cursor bookkeeping. It
//! never sleeps and never emits; drivers (the async [`Typist`](crate::Typist)
//! task, or [`Scheduler::dry_run`]) carry out the returned [`Step`].

use crate::directive::{PauseDirective, PauseDirectiveParser};
use crate::matcher::{MatchResult, PatternMatcher};
use crate::session::{TypingSession, is_indent};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// One character to type and the delay that follows it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keystroke {
    pub ch: char,
    pub delay_after: Duration,
}

/// A run of keystrokes typed as a unit: a matched pattern or a single
/// unmatched character.
#[derive(Debug, Clone, PartialEq)]
pub struct Burst {
    pub keys: Vec<Keystroke>,
    pub pause_before: Duration,
    pub pause_after: Duration,
    pub pattern: Option<MatchResult>,
}

/// What to do at the current cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Sleep for the directive; the cursor is already past it.
    Pause(PauseDirective),
    /// Leading indentation skipped; the cursor is already past it.
    Skip(char),
    /// Type these keys. The cursor has not moved: the driver calls
    /// [`TypingSession::advance`] after each emitted key.
    Type(Burst),
    /// Cursor at the end of the text.
    Finished,
}

/// Where a recorded pause came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseKind {
    Directive,
    BeforePattern,
    AfterPattern,
}

/// Everything a full run would do, without doing it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub typed: String,
    pub pauses: Vec<(PauseKind, Duration)>,
    pub total: Duration,
}

impl Transcript {
    pub fn directive_pauses(&self) -> Vec<Duration> {
        self.pauses
            .iter()
            .filter(|(kind, _)| *kind == PauseKind::Directive)
            .map(|(_, d)| *d)
            .collect()
    }
}

/// Combines the directive parser and pattern matcher into scan steps.
#[derive(Clone)]
pub struct Scheduler {
    parser: PauseDirectiveParser,
    matcher: Arc<PatternMatcher>,
}

impl Scheduler {
    pub fn new(parser: PauseDirectiveParser, matcher: Arc<PatternMatcher>) -> Self {
        Self { parser, matcher }
    }

    pub fn parser(&self) -> &PauseDirectiveParser {
        &self.parser
    }

    pub fn matcher(&self) -> &Arc<PatternMatcher> {
        &self.matcher
    }

    /// Decide the next step at `session`'s cursor.
    ///
    /// Directives take absolute priority, then leading-whitespace skipping,
    /// then pattern matches, then a plain character.
    pub fn next_step<R: Rng + ?Sized>(&self, session: &mut TypingSession, rng: &mut R) -> Step {
        let position = session.position();
        let Some(current) = session.current_char() else {
            return Step::Finished;
        };

        if let Some(directive) = self.parser.find_directive_at(session.text(), position) {
            session.set_position(directive.end);
            return Step::Pause(directive);
        }

        if session.ignore_leading_whitespace && session.at_line_start() && is_indent(current) {
            trace!(position, "skipping leading whitespace");
            session.skip_char();
            return Step::Skip(current);
        }

        if !is_indent(current) {
            session.leave_line_start();
        }

        if let Some(found) = self.matcher.find_pattern_at(session.text(), position) {
            let last = found.length.saturating_sub(1);
            let keys = found
                .matched_text
                .chars()
                .enumerate()
                .map(|(i, ch)| Keystroke {
                    ch,
                    delay_after: if i < last {
                        session.wpm.sample_delay(rng).div_f64(found.speed_multiplier)
                    } else {
                        Duration::ZERO
                    },
                })
                .collect();
            debug!(
                matched = %found.matched_text,
                category = %found.category,
                multiplier = found.speed_multiplier,
                "typing pattern"
            );
            return Step::Type(Burst {
                keys,
                pause_before: Duration::from_secs_f64(found.pause_before),
                pause_after: Duration::from_secs_f64(found.pause_after),
                pattern: Some(found),
            });
        }

        Step::Type(Burst {
            keys: vec![Keystroke {
                ch: current,
                delay_after: session.wpm.sample_delay(rng),
            }],
            pause_before: Duration::ZERO,
            pause_after: Duration::ZERO,
            pattern: None,
        })
    }

    /// Drive `session` to the end, recording instead of sleeping or emitting.
    pub fn dry_run<R: Rng + ?Sized>(&self, session: &mut TypingSession, rng: &mut R) -> Transcript {
        fn record(transcript: &mut Transcript, kind: PauseKind, d: Duration) {
            if !d.is_zero() {
                transcript.pauses.push((kind, d));
                transcript.total += d;
            }
        }

        let mut transcript = Transcript::default();

        loop {
            match self.next_step(session, rng) {
                Step::Finished => break,
                Step::Skip(_) => {}
                Step::Pause(directive) => {
                    let d = directive.duration();
                    transcript.pauses.push((PauseKind::Directive, d));
                    transcript.total += d;
                }
                Step::Type(burst) => {
                    record(&mut transcript, PauseKind::BeforePattern, burst.pause_before);
                    for key in &burst.keys {
                        transcript.typed.push(key.ch);
                        transcript.total += key.delay_after;
                        session.advance(key.ch);
                    }
                    record(&mut transcript, PauseKind::AfterPattern, burst.pause_after);
                }
            }
        }
        transcript
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(
            PauseDirectiveParser::default(),
            Arc::new(PatternMatcher::default()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{WpmRange, delay_for_wpm};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn scheduler(language: &str) -> Scheduler {
        Scheduler::new(
            PauseDirectiveParser::default(),
            Arc::new(PatternMatcher::new(language)),
        )
    }

    fn session(text: &str) -> TypingSession {
        TypingSession::new(text, WpmRange::new(120.0, 120.0).unwrap())
    }

    fn run(language: &str, text: &str, ignore: bool) -> Transcript {
        let mut s = session(text).with_ignore_leading_whitespace(ignore);
        scheduler(language).dry_run(&mut s, &mut StdRng::seed_from_u64(0))
    }

    #[test]
    fn test_directive_is_not_typed() {
        let t = run("java", "Hello {{PAUSE:2}} World", false);
        assert_eq!(t.typed, "Hello  World");
        assert_eq!(t.directive_pauses(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn test_malformed_directive_is_typed() {
        let t = run("unknown", "{{PAUSE:abc}}", false);
        assert_eq!(t.typed, "{{PAUSE:abc}}");
        assert_eq!(t.typed.chars().count(), 13);
        assert!(t.directive_pauses().is_empty());
    }

    #[test]
    fn test_directive_clamped() {
        let t = run("java", "{{PAUSE:999}}", false);
        assert_eq!(t.typed, "");
        assert_eq!(t.directive_pauses(), vec![Duration::from_secs(60)]);
    }

    #[test]
    fn test_leading_whitespace() {
        assert_eq!(run("java", "a\n    b", true).typed, "a\nb");
        assert_eq!(run("java", "a\n    b", false).typed, "a\n    b");
        assert_eq!(run("java", "\t\tx = 1", true).typed, "x = 1");
    }

    #[test]
    fn test_inline_whitespace_is_kept() {
        assert_eq!(run("java", "  a  b\n\t c  d", true).typed, "a  b\nc  d");
    }

    #[test]
    fn test_line_start_after_directive() {
        let t = run("java", "a\n  {{PAUSE:1}}\n  b", true);
        assert_eq!(t.typed, "a\n\nb");
        // The directive itself is line content once skipped.
        let t = run("java", "a\n{{PAUSE:1}}  b", true);
        assert_eq!(t.typed, "a\n  b");
    }

    #[test]
    fn test_pattern_burst() {
        let mut s = session("public x");
        let mut rng = StdRng::seed_from_u64(0);
        let Step::Type(burst) = scheduler("java").next_step(&mut s, &mut rng) else {
            panic!("expected a burst");
        };
        let typed: String = burst.keys.iter().map(|k| k.ch).collect();
        assert_eq!(typed, "public");
        assert_eq!(burst.pause_before, Duration::ZERO);
        assert_eq!(burst.pause_after, Duration::from_millis(100));

        let expected = delay_for_wpm(120.0).div_f64(1.8);
        for key in &burst.keys[..5] {
            assert_eq!(key.delay_after, expected);
        }
        assert_eq!(burst.keys[5].delay_after, Duration::ZERO);
        // The driver moves the cursor.
        assert_eq!(s.position(), 0);
        assert!(!s.at_line_start());
    }

    #[test]
    fn test_plain_character_step() {
        let mut s = session("z");
        let mut rng = StdRng::seed_from_u64(0);
        let step = scheduler("java").next_step(&mut s, &mut rng);
        assert_eq!(
            step,
            Step::Type(Burst {
                keys: vec![Keystroke {
                    ch: 'z',
                    delay_after: delay_for_wpm(120.0),
                }],
                pause_before: Duration::ZERO,
                pause_after: Duration::ZERO,
                pattern: None,
            })
        );
    }

    #[test]
    fn test_pattern_pauses_recorded() {
        let t = run("java", "a;", false);
        assert_eq!(t.typed, "a;");
        assert_eq!(
            t.pauses,
            vec![(PauseKind::AfterPattern, Duration::from_millis(200))]
        );
    }

    #[test]
    fn test_finished() {
        let mut s = session("");
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(scheduler("java").next_step(&mut s, &mut rng), Step::Finished);
    }

    #[test]
    fn test_multibyte_text() {
        let t = run("java", "héllo {{PAUSE:0.5}}wörld\n  ünï", true);
        assert_eq!(t.typed, "héllo wörld\nünï");
    }

    #[test]
    fn test_total_time() {
        // Five plain characters at a fixed 120 WPM.
        let t = run("unknown", "abcde", false);
        assert_eq!(t.total, delay_for_wpm(120.0) * 5);
    }
}
