use crate::clock::{Clock, TokioClock};
use crate::directive::{MAX_PAUSE_SECS, MIN_PAUSE_SECS, PauseDirectiveParser};
use crate::emitter::KeystrokeEmitter;
use crate::error::{BoundsError, TypingError};
use crate::matcher::PatternMatcher;
use crate::scheduler::{Scheduler, Step};
use crate::session::{TypingSession, WpmRange};
use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const DEFAULT_START_DELAY: Duration = Duration::from_secs(3);
pub const DEFAULT_LANGUAGE: &str = "java";

/// Lifecycle of the typing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingState {
    Idle,
    Running,
    Paused,
}

/// Reported to the status handler on every transition and setting change.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Starting(Duration),
    Started,
    Paused,
    Continuing(Duration),
    Continued,
    Stopped,
    Completed,
    LanguageChanged(String),
    WhitespaceToggled(bool),
    Rejected(String),
    Failed(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Starting(delay) => write!(f, "Starting in {} seconds...", delay.as_secs_f64()),
            Status::Started => write!(f, "Typing started."),
            Status::Paused => write!(f, "Typing paused."),
            Status::Continuing(delay) => {
                write!(f, "Continuing in {} seconds...", delay.as_secs_f64())
            }
            Status::Continued => write!(f, "Typing continued."),
            Status::Stopped => write!(f, "Typing stopped. Progress reset."),
            Status::Completed => write!(f, "Typing completed."),
            Status::LanguageChanged(language) => write!(f, "Language set to: {language}"),
            Status::WhitespaceToggled(true) => write!(f, "Ignore leading whitespace enabled"),
            Status::WhitespaceToggled(false) => write!(f, "Ignore leading whitespace disabled"),
            Status::Rejected(reason) => write!(f, "Please enter valid WPM values. ({reason})"),
            Status::Failed(reason) => write!(f, "Typing failed: {reason}"),
        }
    }
}

/// Whether a control request changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Ignored,
}

pub type StatusHandler = Arc<dyn Fn(TypingState, &Status) + Send + Sync>;

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Delay before typing starts or continues, to refocus the target.
    pub start_delay: Duration,
    pub min_pause_secs: f64,
    pub max_pause_secs: f64,
    pub language: String,
    pub ignore_leading_whitespace: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_delay: DEFAULT_START_DELAY,
            min_pause_secs: MIN_PAUSE_SECS,
            max_pause_secs: MAX_PAUSE_SECS,
            language: DEFAULT_LANGUAGE.to_string(),
            ignore_leading_whitespace: false,
        }
    }
}

struct Control {
    state: TypingState,
    session: Option<TypingSession>,
    generation: u64,
}

impl Control {
    /// The scan task of `generation` may keep typing.
    fn is_live(&self, generation: u64) -> bool {
        self.generation == generation && self.state == TypingState::Running
    }
}

struct Shared {
    control: Mutex<Control>,
    state_tx: watch::Sender<TypingState>,
    running: watch::Sender<bool>,
    ignore_leading_whitespace: AtomicBool,
    scheduler: Scheduler,
    clock: Arc<dyn Clock>,
    emitter: Arc<Mutex<Box<dyn KeystrokeEmitter>>>,
    status: StatusHandler,
    start_delay: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, ctl: &mut Control, state: TypingState) {
        ctl.state = state;
        self.state_tx.send_replace(state);
        self.running.send_replace(state == TypingState::Running);
    }

    /// Must not be called with the control lock held.
    fn notify(&self, state: TypingState, status: &Status) {
        info!(?state, %status, "status");
        (self.status)(state, status);
    }

    /// Sleep unless pause/stop arrives first. Returns false if cancelled.
    async fn sleep(&self, running: &mut watch::Receiver<bool>, duration: Duration) -> bool {
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            _ = self.clock.sleep(duration) => true,
            _ = running.wait_for(|running| !*running) => false,
        }
    }

    /// Deliver `ch` on the blocking pool, since emitters may block on I/O.
    async fn emit(&self, ch: char) -> anyhow::Result<()> {
        let emitter = self.emitter.clone();
        tokio::task::spawn_blocking(move || {
            emitter.lock().unwrap_or_else(|e| e.into_inner()).emit(ch)
        })
        .await
        .context("Keystroke emitter panicked")?
    }

    fn finish(&self, generation: u64, status: Status) {
        {
            let mut ctl = self.lock();
            if ctl.generation != generation || ctl.state != TypingState::Running {
                return;
            }
            ctl.session = None;
            self.set_state(&mut ctl, TypingState::Idle);
        }
        self.notify(TypingState::Idle, &status);
    }
}

/// Builds a [`Typist`].
pub struct TypistBuilder {
    emitter: Box<dyn KeystrokeEmitter>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    status: StatusHandler,
}

impl TypistBuilder {
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_status(mut self, handler: impl Fn(TypingState, &Status) + Send + Sync + 'static) -> Self {
        self.status = Arc::new(handler);
        self
    }

    pub fn build(self) -> Result<Typist, BoundsError> {
        let parser =
            PauseDirectiveParser::with_bounds(self.config.min_pause_secs, self.config.max_pause_secs)?;
        let matcher = Arc::new(PatternMatcher::new(&self.config.language));
        let (state_tx, _) = watch::channel(TypingState::Idle);
        let (running, _) = watch::channel(false);

        let shared = Shared {
            control: Mutex::new(Control {
                state: TypingState::Idle,
                session: None,
                generation: 0,
            }),
            state_tx,
            running,
            ignore_leading_whitespace: AtomicBool::new(self.config.ignore_leading_whitespace),
            scheduler: Scheduler::new(parser, matcher),
            clock: self.clock,
            emitter: Arc::new(Mutex::new(self.emitter)),
            status: self.status,
            start_delay: self.config.start_delay,
        };

        Ok(Typist {
            shared: Arc::new(shared),
            task: tokio::sync::Mutex::new(None),
        })
    }
}

/// Types text through a [`KeystrokeEmitter`] with human-like timing.
///
/// One scan task runs at a time. `start`, `pause`, `resume` and `stop` move
/// the engine between [`TypingState`]s; requests that do not apply in the
/// current state are ignored.
pub struct Typist {
    shared: Arc<Shared>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Typist {
    pub fn builder(emitter: impl KeystrokeEmitter) -> TypistBuilder {
        TypistBuilder {
            emitter: Box::new(emitter),
            clock: Arc::new(TokioClock),
            config: EngineConfig::default(),
            status: Arc::new(|_, _| {}),
        }
    }

    pub fn state(&self) -> TypingState {
        self.shared.lock().state
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<TypingState> {
        self.shared.state_tx.subscribe()
    }

    /// Cursor of the current session; 0 when idle.
    pub fn position(&self) -> usize {
        self.shared
            .lock()
            .session
            .as_ref()
            .map_or(0, TypingSession::position)
    }

    /// Share of the current session's text consumed; 0 when idle.
    pub fn progress(&self) -> f64 {
        self.shared
            .lock()
            .session
            .as_ref()
            .map_or(0.0, TypingSession::progress)
    }

    pub fn language(&self) -> String {
        self.shared.scheduler.matcher().language()
    }

    pub fn ignore_leading_whitespace(&self) -> bool {
        self.shared.ignore_leading_whitespace.load(Ordering::SeqCst)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.shared.scheduler
    }

    /// Start typing `text` from the beginning.
    ///
    /// Ignored while already running, whatever the arguments. Otherwise
    /// invalid speeds are rejected without a state change. Starting from
    /// `Paused` discards the paused session.
    pub async fn start(
        &self,
        text: impl Into<Arc<str>>,
        min_wpm: f64,
        max_wpm: f64,
        language: &str,
        ignore_leading_whitespace: bool,
    ) -> Result<Transition, TypingError> {
        let mut task = self.task.lock().await;
        if self.state() == TypingState::Running {
            debug!("start ignored, already running");
            return Ok(Transition::Ignored);
        }

        let wpm = match WpmRange::new(min_wpm, max_wpm) {
            Ok(wpm) => wpm,
            Err(err) => {
                warn!(%err, "rejecting start request");
                self.shared
                    .notify(self.state(), &Status::Rejected(err.to_string()));
                return Err(err.into());
            }
        };

        if let Some(previous) = task.take() {
            let _ = previous.await;
        }

        self.shared.scheduler.matcher().set_language(language);
        self.shared
            .ignore_leading_whitespace
            .store(ignore_leading_whitespace, Ordering::SeqCst);

        let generation = {
            let mut ctl = self.shared.lock();
            let session = TypingSession::new(text, wpm)
                .with_ignore_leading_whitespace(ignore_leading_whitespace)
                .with_language(self.shared.scheduler.matcher().language());
            info!(
                min_wpm,
                max_wpm,
                language = %session.language,
                ignore_leading_whitespace,
                len = session.text().len(),
                "starting typing session"
            );
            ctl.session = Some(session);
            ctl.generation += 1;
            self.shared.set_state(&mut ctl, TypingState::Running);
            ctl.generation
        };

        let delay = self.shared.start_delay;
        *task = Some(tokio::spawn(run_scan(
            self.shared.clone(),
            generation,
            Status::Starting(delay),
            Status::Started,
        )));
        Ok(Transition::Applied)
    }

    /// Stop after the keystroke in flight, keeping the cursor.
    pub fn pause(&self) -> Transition {
        let position = {
            let mut ctl = self.shared.lock();
            if ctl.state != TypingState::Running {
                return Transition::Ignored;
            }
            self.shared.set_state(&mut ctl, TypingState::Paused);
            ctl.session.as_ref().map_or(0, TypingSession::position)
        };
        debug!(position, "paused");
        self.shared.notify(TypingState::Paused, &Status::Paused);
        Transition::Applied
    }

    /// Continue a paused session from its cursor.
    pub async fn resume(&self) -> Transition {
        let mut task = self.task.lock().await;
        if self.state() != TypingState::Paused {
            return Transition::Ignored;
        }
        if let Some(previous) = task.take() {
            let _ = previous.await;
        }

        let generation = {
            let mut ctl = self.shared.lock();
            if ctl.state != TypingState::Paused {
                return Transition::Ignored;
            }
            let Some(session) = ctl.session.as_mut() else {
                return Transition::Ignored;
            };
            session.recompute_line_start();
            debug!(
                position = session.position(),
                at_line_start = session.at_line_start(),
                "resuming"
            );
            ctl.generation += 1;
            self.shared.set_state(&mut ctl, TypingState::Running);
            ctl.generation
        };

        let delay = self.shared.start_delay;
        *task = Some(tokio::spawn(run_scan(
            self.shared.clone(),
            generation,
            Status::Continuing(delay),
            Status::Continued,
        )));
        Transition::Applied
    }

    /// Stop and discard the session. Valid in every state.
    pub fn stop(&self) -> Transition {
        {
            let mut ctl = self.shared.lock();
            ctl.session = None;
            ctl.generation += 1;
            self.shared.set_state(&mut ctl, TypingState::Idle);
        }
        self.shared.notify(TypingState::Idle, &Status::Stopped);
        Transition::Applied
    }

    /// Replace the active pattern rules. Takes effect at the next step.
    pub fn set_language(&self, language: &str) {
        self.shared.scheduler.matcher().set_language(language);
        let language = self.shared.scheduler.matcher().language();
        let state = {
            let mut ctl = self.shared.lock();
            if let Some(session) = ctl.session.as_mut() {
                session.language = language.clone();
            }
            ctl.state
        };
        self.shared
            .notify(state, &Status::LanguageChanged(language));
    }

    /// Toggle leading-whitespace skipping. Takes effect at the next step.
    pub fn set_ignore_leading_whitespace(&self, ignore: bool) {
        self.shared
            .ignore_leading_whitespace
            .store(ignore, Ordering::SeqCst);
        self.shared
            .notify(self.state(), &Status::WhitespaceToggled(ignore));
    }

    /// Wait for the current scan task, if any, to exit.
    pub async fn join(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
    }
}

/// The scan loop for one run of `generation`.
async fn run_scan(shared: Arc<Shared>, generation: u64, announce: Status, begun: Status) {
    let mut running = shared.running.subscribe();
    let mut rng = StdRng::from_entropy();

    shared.notify(TypingState::Running, &announce);
    if !shared.sleep(&mut running, shared.start_delay).await {
        return;
    }
    let live = shared.lock().is_live(generation);
    if !live {
        return;
    }
    shared.notify(TypingState::Running, &begun);

    loop {
        let step = {
            let mut ctl = shared.lock();
            if !ctl.is_live(generation) {
                return;
            }
            let Some(session) = ctl.session.as_mut() else {
                return;
            };
            session.ignore_leading_whitespace =
                shared.ignore_leading_whitespace.load(Ordering::SeqCst);
            shared.scheduler.next_step(session, &mut rng)
        };

        match step {
            Step::Finished => {
                info!("typing session complete");
                shared.finish(generation, Status::Completed);
                return;
            }
            Step::Skip(_) => {}
            Step::Pause(directive) => {
                info!(
                    secs = directive.duration_secs,
                    position = directive.start,
                    "executing pause directive"
                );
                if !shared.sleep(&mut running, directive.duration()).await {
                    return;
                }
            }
            Step::Type(burst) => {
                if let Some(pattern) = &burst.pattern {
                    info!(
                        matched = %pattern.matched_text,
                        category = %pattern.category,
                        multiplier = pattern.speed_multiplier,
                        "typing pattern"
                    );
                }
                if !shared.sleep(&mut running, burst.pause_before).await {
                    return;
                }
                for key in &burst.keys {
                    let live = shared.lock().is_live(generation);
                    if !live {
                        return;
                    }
                    if let Err(err) = shared.emit(key.ch).await {
                        warn!(error = %err, "keystroke emitter failed");
                        shared.finish(generation, Status::Failed(format!("{err:#}")));
                        return;
                    }
                    {
                        // A key that went out is consumed even if a pause
                        // arrived while it was being emitted.
                        let mut ctl = shared.lock();
                        if ctl.generation != generation {
                            return;
                        }
                        if let Some(session) = ctl.session.as_mut() {
                            session.advance(key.ch);
                        }
                    }
                    if !shared.sleep(&mut running, key.delay_after).await {
                        return;
                    }
                }
                if !shared.sleep(&mut running, burst.pause_after).await {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RecordingClock;
    use crate::emitter::{FnEmitter, RecordingEmitter};

    fn config(language: &str) -> EngineConfig {
        EngineConfig {
            start_delay: Duration::from_secs(3),
            language: language.to_string(),
            ..EngineConfig::default()
        }
    }

    fn recording_typist(
        language: &str,
    ) -> (Typist, RecordingEmitter, RecordingClock, Arc<Mutex<Vec<Status>>>) {
        let emitter = RecordingEmitter::new();
        let clock = RecordingClock::new();
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let sink = statuses.clone();
        let typist = Typist::builder(emitter.clone())
            .clock(clock.clone())
            .config(config(language))
            .on_status(move |_, status| sink.lock().unwrap().push(status.clone()))
            .build()
            .unwrap();
        (typist, emitter, clock, statuses)
    }

    #[tokio::test]
    async fn test_runs_to_completion() {
        let (typist, emitter, clock, statuses) = recording_typist("java");
        let t = typist
            .start("Hello {{PAUSE:2}} World", 100.0, 250.0, "java", false)
            .await
            .unwrap();
        assert_eq!(t, Transition::Applied);
        typist.join().await;

        assert_eq!(emitter.typed(), "Hello  World");
        assert_eq!(typist.state(), TypingState::Idle);
        assert_eq!(typist.position(), 0);

        let sleeps = clock.sleeps();
        assert_eq!(sleeps[0], Duration::from_secs(3));
        assert_eq!(
            sleeps.iter().filter(|d| **d == Duration::from_secs(2)).count(),
            1
        );
        assert_eq!(
            statuses.lock().unwrap().as_slice(),
            &[
                Status::Starting(Duration::from_secs(3)),
                Status::Started,
                Status::Completed
            ]
        );
    }

    #[tokio::test]
    async fn test_rejects_invalid_speed() {
        let (typist, emitter, _, statuses) = recording_typist("java");
        let err = typist.start("abc", 300.0, 100.0, "java", false).await;
        assert!(matches!(err, Err(TypingError::InvalidSpeed(_))));
        assert_eq!(typist.state(), TypingState::Idle);
        typist.join().await;
        assert_eq!(emitter.typed(), "");
        assert!(matches!(
            statuses.lock().unwrap().as_slice(),
            [Status::Rejected(_)]
        ));
    }

    #[tokio::test]
    async fn test_pause_and_stop_outside_running() {
        let (typist, _, _, _) = recording_typist("java");
        assert_eq!(typist.pause(), Transition::Ignored);
        assert_eq!(typist.resume().await, Transition::Ignored);
        assert_eq!(typist.stop(), Transition::Applied);
        assert_eq!(typist.state(), TypingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_keeps_position() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let typed = RecordingEmitter::new();
        let mut record = typed.clone();
        let emitter = FnEmitter(move |ch| {
            record.emit(ch)?;
            let _ = tx.send(ch);
            Ok(())
        });
        let typist = Typist::builder(emitter)
            .config(config("java"))
            .build()
            .unwrap();

        typist
            .start("a\n    b", 100.0, 250.0, "java", false)
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some('a'));
        assert_eq!(rx.recv().await, Some('\n'));
        assert_eq!(typist.pause(), Transition::Applied);
        assert_eq!(typist.state(), TypingState::Paused);
        typist.join().await;
        assert_eq!(typist.position(), 2);

        typist.set_ignore_leading_whitespace(true);
        assert_eq!(typist.resume().await, Transition::Applied);
        assert_eq!(typist.state(), TypingState::Running);
        typist.join().await;

        assert_eq!(typed.typed(), "a\nb");
        assert_eq!(typist.state(), TypingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_resets_position() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let emitter = FnEmitter(move |ch| {
            let _ = tx.send(ch);
            Ok(())
        });
        let typist = Typist::builder(emitter)
            .config(config("unknown"))
            .build()
            .unwrap();

        typist.start("abcdef", 100.0, 250.0, "unknown", false).await.unwrap();
        assert_eq!(rx.recv().await, Some('a'));

        assert_eq!(typist.stop(), Transition::Applied);
        assert_eq!(typist.state(), TypingState::Idle);
        assert_eq!(typist.position(), 0);
        typist.join().await;
        // The task exits without typing anything more.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_running_is_ignored() {
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let sink = statuses.clone();
        let typist = Typist::builder(RecordingEmitter::new())
            .config(config("java"))
            .on_status(move |_, status| sink.lock().unwrap().push(status.clone()))
            .build()
            .unwrap();
        typist.start("first", 100.0, 250.0, "java", false).await.unwrap();
        let again = typist.start("second", 100.0, 250.0, "java", false).await.unwrap();
        assert_eq!(again, Transition::Ignored);

        // Invalid speeds are not even looked at while running.
        let bad = typist.start("third", 300.0, 100.0, "java", false).await;
        assert!(matches!(bad, Ok(Transition::Ignored)));
        assert!(
            !statuses
                .lock()
                .unwrap()
                .iter()
                .any(|s| matches!(s, Status::Rejected(_)))
        );
        assert_eq!(typist.state(), TypingState::Running);

        typist.stop();
        typist.join().await;
    }

    fn channel_emitter() -> (
        FnEmitter<impl FnMut(char) -> anyhow::Result<()> + Send + 'static>,
        tokio::sync::mpsc::UnboundedReceiver<char>,
    ) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let emitter = FnEmitter(move |ch| {
            let _ = tx.send(ch);
            Ok(())
        });
        (emitter, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_waits_pre_roll_and_reports() {
        let (emitter, mut rx) = channel_emitter();
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let sink = statuses.clone();
        let typist = Typist::builder(emitter)
            .config(config("unknown"))
            .on_status(move |_, status| sink.lock().unwrap().push(status.clone()))
            .build()
            .unwrap();

        typist.start("abc", 100.0, 250.0, "unknown", false).await.unwrap();
        assert_eq!(rx.recv().await, Some('a'));
        assert_eq!(typist.pause(), Transition::Applied);
        typist.join().await;

        let resumed_at = tokio::time::Instant::now();
        assert_eq!(typist.resume().await, Transition::Applied);
        assert_eq!(rx.recv().await, Some('b'));
        assert!(resumed_at.elapsed() >= Duration::from_secs(3));
        typist.join().await;

        assert_eq!(
            statuses.lock().unwrap().as_slice(),
            &[
                Status::Starting(Duration::from_secs(3)),
                Status::Started,
                Status::Paused,
                Status::Continuing(Duration::from_secs(3)),
                Status::Continued,
                Status::Completed,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_from_paused_restarts_at_zero() {
        let (emitter, mut rx) = channel_emitter();
        let typist = Typist::builder(emitter)
            .config(config("unknown"))
            .build()
            .unwrap();

        typist.start("abcdef", 100.0, 250.0, "unknown", false).await.unwrap();
        assert_eq!(rx.recv().await, Some('a'));
        assert_eq!(rx.recv().await, Some('b'));
        typist.pause();
        typist.join().await;
        assert_eq!(typist.position(), 2);

        assert_eq!(typist.stop(), Transition::Applied);
        assert_eq!(typist.state(), TypingState::Idle);
        assert_eq!(typist.position(), 0);
        assert_eq!(typist.resume().await, Transition::Ignored);

        typist.start("xyz", 100.0, 250.0, "unknown", false).await.unwrap();
        assert_eq!(rx.recv().await, Some('x'));
        typist.join().await;
        let rest: String = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(rest, "yz");
    }

    #[tokio::test]
    async fn test_blocking_emitter_does_not_stall_runtime() {
        let (gate, waiting) = std::sync::mpsc::channel::<()>();
        let typed = RecordingEmitter::new();
        let mut record = typed.clone();
        let emitter = FnEmitter(move |ch| {
            waiting
                .recv_timeout(Duration::from_secs(5))
                .map_err(|e| anyhow::anyhow!("no gate: {e}"))?;
            record.emit(ch)
        });
        let typist = Typist::builder(emitter)
            .clock(RecordingClock::new())
            .config(config("unknown"))
            .build()
            .unwrap();

        typist.start("ab", 100.0, 250.0, "unknown", false).await.unwrap();
        for _ in 0..2 {
            // Only runs if the emitter is not blocking this runtime's thread.
            tokio::time::sleep(Duration::from_millis(20)).await;
            gate.send(()).unwrap();
        }
        typist.join().await;
        assert_eq!(typed.typed(), "ab");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_during_directive_is_prompt() {
        let typist = Typist::builder(RecordingEmitter::new())
            .config(EngineConfig {
                start_delay: Duration::ZERO,
                ..config("java")
            })
            .build()
            .unwrap();
        let mut states = typist.subscribe();
        typist
            .start("{{PAUSE:60}}x", 100.0, 250.0, "java", false)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        typist.pause();
        let before = tokio::time::Instant::now();
        typist.join().await;
        assert!(before.elapsed() < Duration::from_secs(1));
        assert_eq!(*states.borrow_and_update(), TypingState::Paused);
        // The directive was consumed when its sleep began.
        assert_eq!(typist.position(), "{{PAUSE:60}}".len());
    }

    #[tokio::test]
    async fn test_emitter_failure_ends_session() {
        let emitter = FnEmitter(|ch| {
            anyhow::ensure!(ch != 'c', "target window closed");
            Ok(())
        });
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let sink = statuses.clone();
        let typist = Typist::builder(emitter)
            .clock(RecordingClock::new())
            .config(config("unknown"))
            .on_status(move |_, status| sink.lock().unwrap().push(status.clone()))
            .build()
            .unwrap();
        typist.start("abcd", 100.0, 250.0, "unknown", false).await.unwrap();
        typist.join().await;
        assert_eq!(typist.state(), TypingState::Idle);
        assert!(matches!(
            statuses.lock().unwrap().last(),
            Some(Status::Failed(reason)) if reason.contains("target window closed")
        ));
    }

    #[tokio::test]
    async fn test_settings_report_status() {
        let (typist, _, _, statuses) = recording_typist("java");
        typist.set_language("CSS");
        typist.set_ignore_leading_whitespace(true);
        assert_eq!(typist.language(), "css");
        assert!(typist.ignore_leading_whitespace());
        let statuses = statuses.lock().unwrap();
        assert_eq!(statuses[0].to_string(), "Language set to: css");
        assert_eq!(statuses[1].to_string(), "Ignore leading whitespace enabled");
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(
            Status::Starting(Duration::from_secs(3)).to_string(),
            "Starting in 3 seconds..."
        );
        assert_eq!(Status::Stopped.to_string(), "Typing stopped. Progress reset.");
        assert_eq!(Status::Paused.to_string(), "Typing paused.");
    }

    #[test]
    fn test_invalid_pause_bounds() {
        let result = Typist::builder(RecordingEmitter::new())
            .config(EngineConfig {
                min_pause_secs: 10.0,
                max_pause_secs: 1.0,
                ..EngineConfig::default()
            })
            .build();
        assert!(result.is_err());
    }
}
