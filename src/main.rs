use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use keycadence::directive::PauseDirectiveParser;
use keycadence::matcher::PatternMatcher;
use keycadence::{
    Config, FnEmitter, Flow, KeystrokeEmitter, PtyEmitter, Scheduler, StdoutEmitter,
    TypingSession, Typist, TypingState, WpmRange, known_languages, parse_command,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::{BufRead, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "keycadence",
    about = "Type text into a program with human-like keystroke timing",
    version
)]
struct Cli {
    /// Log more to stderr (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Type text, reading control commands from stdin
    Type(TypeArgs),
    /// Show what would be typed, the pause directives and an estimated duration
    Preview(PreviewArgs),
    /// List languages with dedicated pattern rules
    Languages,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Source {
    /// Read the text from a file, or `-` for stdin
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Text to type
    #[arg(short, long)]
    text: Option<String>,
}

#[derive(Args, Debug)]
struct Settings {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Slowest typing speed in words per minute
    #[arg(long)]
    min_wpm: Option<String>,

    /// Fastest typing speed in words per minute
    #[arg(long)]
    max_wpm: Option<String>,

    /// Pattern rules to use (java, javascript, react, css; others get universal rules)
    #[arg(short, long)]
    language: Option<String>,

    /// Skip spaces and tabs at the start of each line
    #[arg(long)]
    ignore_leading_whitespace: bool,
}

#[derive(Args, Debug)]
struct TypeArgs {
    #[command(flatten)]
    source: Source,

    #[command(flatten)]
    settings: Settings,

    /// Seconds to wait before typing starts or continues
    #[arg(long)]
    start_delay: Option<f64>,

    /// Where keystrokes go
    #[arg(short, long, value_enum, default_value_t = Output::Stdout)]
    output: Output,

    /// Program to run in a PTY (with `--output pty`)
    #[arg(short, long)]
    command: Option<String>,

    /// Arguments to pass to the command
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    #[command(flatten)]
    source: Source,

    #[command(flatten)]
    settings: Settings,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Output {
    /// Write keystrokes to stdout
    Stdout,
    /// Write keystrokes to a program running in a PTY
    Pty,
    /// Send keystrokes to the focused window
    Os,
}

/// Config file values with command-line overrides applied.
struct Resolved {
    config: Config,
    wpm: WpmRange,
}

impl Settings {
    fn resolve(&self) -> Result<Resolved> {
        let mut config = Config::load_or_default(self.config.as_deref())?;
        if let Some(language) = &self.language {
            config.typing.language = language.clone();
        }
        if self.ignore_leading_whitespace {
            config.typing.ignore_leading_whitespace = true;
        }
        let min = self
            .min_wpm
            .clone()
            .unwrap_or_else(|| config.typing.min_wpm.to_string());
        let max = self
            .max_wpm
            .clone()
            .unwrap_or_else(|| config.typing.max_wpm.to_string());
        let wpm = WpmRange::parse(&min, &max).context("Please enter valid WPM values.")?;
        Ok(Resolved { config, wpm })
    }
}

impl Source {
    fn read(&self) -> Result<String> {
        let text = match (&self.file, &self.text) {
            (_, Some(text)) => text.clone(),
            (Some(path), None) if path == Path::new("-") => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("Failed to read text from stdin")?;
                text
            }
            (Some(path), None) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file: {}", path.display()))?,
            (None, None) => bail!("No text given"),
        };
        Ok(text.trim_end().to_string())
    }

    fn is_stdin(&self) -> bool {
        self.file.as_deref() == Some(Path::new("-"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Type(args) => type_text(args).await,
        Command::Preview(args) => preview(args),
        Command::Languages => {
            for language in known_languages() {
                println!("{language}");
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn type_text(args: TypeArgs) -> Result<()> {
    let Resolved { mut config, wpm } = args.settings.resolve()?;
    if let Some(delay) = args.start_delay {
        config.typing.start_delay_secs = delay;
    }
    if !(config.typing.start_delay_secs.is_finite() && config.typing.start_delay_secs >= 0.0) {
        bail!(
            "Start delay must be a non-negative number of seconds, got {}",
            config.typing.start_delay_secs
        );
    }
    let text = args.source.read()?;

    let mut pty = None;
    let emitter: Box<dyn KeystrokeEmitter> = match args.output {
        Output::Stdout => Box::new(StdoutEmitter),
        Output::Pty => {
            let command = args
                .command
                .as_deref()
                .context("--output pty needs --command")?;
            let target = Arc::new(Mutex::new(
                PtyEmitter::spawn(command, &args.args).context("Failed to start target program")?,
            ));
            pty = Some(target.clone());
            Box::new(FnEmitter(move |ch| {
                target.lock().unwrap_or_else(|e| e.into_inner()).emit(ch)
            }))
        }
        Output::Os => os_emitter()?,
    };

    let typist = Typist::builder(emitter)
        .config(config.engine_config())
        .on_status(|_, status| eprintln!("{status}"))
        .build()?;
    let mut states = typist.subscribe();

    typist
        .start(
            text,
            wpm.min(),
            wpm.max(),
            &config.typing.language,
            config.typing.ignore_leading_whitespace,
        )
        .await?;

    let mut commands = (!args.source.is_stdin()).then(spawn_stdin_reader);
    loop {
        if typist.state() == TypingState::Idle {
            break;
        }
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() || *states.borrow_and_update() == TypingState::Idle {
                    break;
                }
            }
            line = next_line(&mut commands) => {
                let Some(line) = line else {
                    debug!("operator input closed");
                    commands = None;
                    continue;
                };
                match parse_command(&line) {
                    Ok(Some(command)) => {
                        let (flow, message) = command.apply(&typist).await;
                        if let Some(message) = message {
                            eprintln!("{message}");
                        }
                        if flow == Flow::Exit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => eprintln!("{err}"),
                }
            }
        }
    }

    typist.join().await;
    drop(typist);

    if let Some(target) = pty {
        let target = Arc::try_unwrap(target)
            .map_err(|_| anyhow!("Target program is still in use"))?
            .into_inner()
            .unwrap_or_else(|e| e.into_inner());
        tokio::task::spawn_blocking(move || target.finish())
            .await
            .context("Target program shutdown panicked")??;
    }
    Ok(())
}

#[cfg(feature = "os-input")]
fn os_emitter() -> Result<Box<dyn KeystrokeEmitter>> {
    Ok(Box::new(keycadence::OsEmitter::new()?))
}

#[cfg(not(feature = "os-input"))]
fn os_emitter() -> Result<Box<dyn KeystrokeEmitter>> {
    bail!("--output os needs keycadence built with the `os-input` feature")
}

/// Operator commands arrive on a plain thread; tokio's stdin blocks shutdown
/// while a read is pending.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn next_line(commands: &mut Option<mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match commands {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn preview(args: PreviewArgs) -> Result<()> {
    let Resolved { config, wpm } = args.settings.resolve()?;
    let text = args.source.read()?;

    let parser = PauseDirectiveParser::with_bounds(config.pauses.min_secs, config.pauses.max_secs)?;
    let directives = parser.find_all_directives(&text);
    info!(count = directives.len(), "found pause directives");

    println!("{}", parser.remove_all_directives(&text));
    println!("---");
    println!("Directives: {}", directives.len());
    for directive in &directives {
        println!(
            "  at {}: {}s {}",
            directive.start, directive.duration_secs, directive.raw_text
        );
    }
    println!(
        "Total pause time: {}",
        format_secs(parser.total_pause_secs(&text))
    );

    let scheduler = Scheduler::new(
        parser,
        Arc::new(PatternMatcher::new(&config.typing.language)),
    );
    let mut session = TypingSession::new(text, wpm)
        .with_ignore_leading_whitespace(config.typing.ignore_leading_whitespace);
    let transcript = scheduler.dry_run(&mut session, &mut StdRng::from_entropy());
    println!(
        "Estimated duration: {} ({} characters at {}-{} WPM, {})",
        format_secs(transcript.total.as_secs_f64()),
        transcript.typed.chars().count(),
        wpm.min(),
        wpm.max(),
        scheduler.matcher().language()
    );
    Ok(())
}

fn format_secs(secs: f64) -> String {
    let d = Duration::from_secs_f64(secs.max(0.0));
    if d.as_secs() >= 60 {
        format!("{}m {:.1}s", d.as_secs() / 60, d.as_secs_f64() % 60.0)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}
