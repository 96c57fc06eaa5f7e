//! Operator commands accepted on stdin while typing.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `pause`, `p` | Pause after the keystroke in flight |
//! | `continue`, `resume`, `c` | Continue a paused session |
//! | `stop`, `s` | Stop and reset progress |
//! | `lang <name>` | Switch pattern rules |
//! | `ws on` / `ws off` | Toggle leading-whitespace skipping |
//! | `status` | Print state and progress |
//! | `quit`, `q` | Stop and exit |

use crate::engine::{Transition, Typist, TypingState};
use anyhow::{Result, anyhow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Continue,
    Stop,
    Language(String),
    Whitespace(bool),
    Status,
    Quit,
}

type ParseFn = fn(&str) -> Result<ControlCommand>;

static REGISTRY: &[(&str, ParseFn)] = &[
    ("pause", parse_pause),
    ("p", parse_pause),
    ("continue", parse_continue),
    ("resume", parse_continue),
    ("c", parse_continue),
    ("stop", parse_stop),
    ("s", parse_stop),
    ("lang", parse_language),
    ("ws", parse_whitespace),
    ("status", parse_status),
    ("quit", parse_quit),
    ("q", parse_quit),
];

fn parse_pause(args: &str) -> Result<ControlCommand> {
    no_args(args, ControlCommand::Pause)
}

fn parse_continue(args: &str) -> Result<ControlCommand> {
    no_args(args, ControlCommand::Continue)
}

fn parse_stop(args: &str) -> Result<ControlCommand> {
    no_args(args, ControlCommand::Stop)
}

fn parse_status(args: &str) -> Result<ControlCommand> {
    no_args(args, ControlCommand::Status)
}

fn parse_quit(args: &str) -> Result<ControlCommand> {
    no_args(args, ControlCommand::Quit)
}

fn no_args(args: &str, command: ControlCommand) -> Result<ControlCommand> {
    if args.trim().is_empty() {
        Ok(command)
    } else {
        Err(anyhow!("Unexpected arguments: {}", args.trim()))
    }
}

fn parse_language(args: &str) -> Result<ControlCommand> {
    let language = args.trim();
    if language.is_empty() {
        return Err(anyhow!("Usage: lang <name>"));
    }
    Ok(ControlCommand::Language(language.to_string()))
}

fn parse_whitespace(args: &str) -> Result<ControlCommand> {
    match args.trim().to_lowercase().as_str() {
        "on" | "true" | "1" => Ok(ControlCommand::Whitespace(true)),
        "off" | "false" | "0" => Ok(ControlCommand::Whitespace(false)),
        other => Err(anyhow!("Usage: ws on|off, got '{other}'")),
    }
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ControlCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (name, args) = line.split_once(' ').unwrap_or((line, ""));
    let name = name.to_lowercase();
    REGISTRY
        .iter()
        .find(|(cmd_name, _)| *cmd_name == name)
        .map(|(_, parse)| parse(args).map(Some))
        .unwrap_or_else(|| Err(anyhow!("Unknown command: {}", line)))
}

/// What the control loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

impl ControlCommand {
    /// Apply the command to `typist`, returning a line to show the operator.
    pub async fn apply(&self, typist: &Typist) -> (Flow, Option<String>) {
        let ignored = |t: Transition, what: &str| match t {
            Transition::Applied => None,
            Transition::Ignored => Some(format!("Cannot {what} while {:?}.", typist.state())),
        };
        match self {
            ControlCommand::Pause => (Flow::Continue, ignored(typist.pause(), "pause")),
            ControlCommand::Continue => {
                let t = typist.resume().await;
                (Flow::Continue, ignored(t, "continue"))
            }
            ControlCommand::Stop => {
                typist.stop();
                (Flow::Continue, None)
            }
            ControlCommand::Language(language) => {
                typist.set_language(language);
                (Flow::Continue, None)
            }
            ControlCommand::Whitespace(ignore) => {
                typist.set_ignore_leading_whitespace(*ignore);
                (Flow::Continue, None)
            }
            ControlCommand::Status => {
                let line = format!(
                    "{:?} at {:.0}% (language: {}, ignore leading whitespace: {})",
                    typist.state(),
                    typist.progress() * 100.0,
                    typist.language(),
                    typist.ignore_leading_whitespace()
                );
                (Flow::Continue, Some(line))
            }
            ControlCommand::Quit => {
                if typist.state() != TypingState::Idle {
                    typist.stop();
                }
                (Flow::Exit, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RecordingClock;
    use crate::emitter::RecordingEmitter;

    #[test]
    fn test_parse_all_commands() {
        let cases = [
            ("pause", ControlCommand::Pause),
            ("p", ControlCommand::Pause),
            ("continue", ControlCommand::Continue),
            ("Resume", ControlCommand::Continue),
            ("c", ControlCommand::Continue),
            ("stop", ControlCommand::Stop),
            ("s", ControlCommand::Stop),
            ("lang React", ControlCommand::Language("React".into())),
            ("ws on", ControlCommand::Whitespace(true)),
            ("ws OFF", ControlCommand::Whitespace(false)),
            ("status", ControlCommand::Status),
            ("quit", ControlCommand::Quit),
            ("  q  ", ControlCommand::Quit),
        ];
        for (line, expected) in cases {
            assert_eq!(parse_command(line).unwrap(), Some(expected), "{line}");
        }
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(parse_command("# note").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        let err = parse_command("jump").err().unwrap().to_string();
        assert!(err.contains("Unknown command"), "got: {err}");
        assert!(parse_command("lang").is_err());
        assert!(parse_command("ws maybe").is_err());
        assert!(parse_command("pause now").is_err());
    }

    #[tokio::test]
    async fn test_apply() {
        let typist = Typist::builder(RecordingEmitter::new())
            .clock(RecordingClock::new())
            .build()
            .unwrap();

        let (flow, msg) = ControlCommand::Pause.apply(&typist).await;
        assert_eq!(flow, Flow::Continue);
        assert_eq!(msg.as_deref(), Some("Cannot pause while Idle."));

        ControlCommand::Language("css".into()).apply(&typist).await;
        assert_eq!(typist.language(), "css");

        ControlCommand::Whitespace(true).apply(&typist).await;
        assert!(typist.ignore_leading_whitespace());

        let (_, msg) = ControlCommand::Status.apply(&typist).await;
        assert!(msg.unwrap().starts_with("Idle at 0%"));

        let (flow, _) = ControlCommand::Quit.apply(&typist).await;
        assert_eq!(flow, Flow::Exit);
    }
}
