//! # Keycadence
//!
//! Types text into another program with human-like keystroke timing.
//!
//! Each character gets a delay drawn from a words-per-minute range.
//! Recognised code tokens (keywords, operators, punctuation) are typed as a
//! burst at their own speed, with optional pauses around them. The text may
//! carry `{{PAUSE:n}}` directives, which are never typed and instead hold
//! the typist still for `n` seconds.
//!
//! ## Quick start
//!
//! ```no_run
//! use keycadence::{StdoutEmitter, Typist};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let typist = Typist::builder(StdoutEmitter).build()?;
//!     typist
//!         .start("public class Main {{PAUSE:2}}{}", 100.0, 250.0, "java", false)
//!         .await?;
//!     typist.join().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Control
//!
//! [`Typist::pause`], [`Typist::resume`] and [`Typist::stop`] may be called
//! from any task while typing is under way. A pause takes effect after the
//! keystroke in flight and cuts any sleep short; resuming continues from the
//! same position. [`Typist::set_language`] and
//! [`Typist::set_ignore_leading_whitespace`] apply from the next character.
//!
//! ## Typing into a program
//!
//! Any [`KeystrokeEmitter`] can receive the keystrokes. [`PtyEmitter`] runs a
//! program in a pseudo terminal and writes to its input:
//!
//! ```no_run
//! use keycadence::{EngineConfig, PtyEmitter, Typist};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let target = PtyEmitter::spawn("python3", &[])?;
//!     let typist = Typist::builder(target)
//!         .config(EngineConfig {
//!             start_delay: Duration::ZERO,
//!             ..EngineConfig::default()
//!         })
//!         .on_status(|_, status| eprintln!("{status}"))
//!         .build()?;
//!     typist.start("print('hi')\n", 150.0, 300.0, "python", false).await?;
//!     typist.join().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Previewing
//!
//! [`Scheduler::dry_run`] walks a text without sleeping or typing and
//! reports what would be typed and every pause along the way.

pub mod clock;
pub mod config;
pub mod control;
pub mod directive;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod pty;
pub(crate) mod pty_reader;
pub mod rules;
pub mod scheduler;
pub mod session;

pub use clock::{Clock, RecordingClock, TokioClock};
pub use config::Config;
pub use control::{ControlCommand, Flow, parse_command};
pub use directive::{PauseDirective, PauseDirectiveParser, has_pause_directives};
#[cfg(feature = "os-input")]
pub use emitter::OsEmitter;
pub use emitter::{FnEmitter, KeystrokeEmitter, RecordingEmitter, StdoutEmitter};
pub use engine::{EngineConfig, Status, Transition, Typist, TypistBuilder, TypingState};
pub use error::{BoundsError, RuleError, SpeedError, TypingError};
pub use matcher::{CompiledMatcher, MatchResult, PatternMatcher};
pub use pty::PtyEmitter;
pub use rules::{PatternRule, known_languages};
pub use scheduler::{Scheduler, Step, Transcript};
pub use session::{TypingSession, WpmRange};
