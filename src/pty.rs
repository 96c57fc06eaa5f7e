use crate::emitter::KeystrokeEmitter;
use crate::pty_reader::{OutputHandler, spawn_forwarder};
use anyhow::{Context, Result};
use portable_pty::{Child, CommandBuilder, MasterPty, PtySize};
use std::io::Write;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::warn;

/// How long [`PtyEmitter::finish`] waits for the program before killing it.
pub const FINISH_TIMEOUT: Duration = Duration::from_secs(3);

/// A program running inside a PTY that receives the typed keystrokes.
///
/// Whatever the program writes back is passed to the output handler from a
/// background thread.
pub struct PtyEmitter {
    #[allow(dead_code)]
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    forwarder: Option<JoinHandle<()>>,
    /// Characters typed since the last Enter, still held by the line editor.
    line_pending: bool,
}

impl PtyEmitter {
    /// Spawn `command` in a PTY, forwarding its output to stdout.
    pub fn spawn(command: &str, args: &[String]) -> Result<Self> {
        Self::spawn_with_handler(command, args, |data| {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(data);
            let _ = stdout.flush();
        })
    }

    /// Spawn `command` in a PTY, forwarding its output to `handler`.
    pub fn spawn_with_handler(
        command: &str,
        args: &[String],
        handler: impl Fn(&[u8]) + Send + Sync + 'static,
    ) -> Result<Self> {
        let pty_system = portable_pty::native_pty_system();

        let pty_size = PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = pty_system
            .openpty(pty_size)
            .context("Failed to open PTY")?;

        let mut cmd = CommandBuilder::new(command);
        for arg in args {
            cmd.arg(arg);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("Failed to spawn command: {command}"))?;

        let writer = pair
            .master
            .take_writer()
            .context("Failed to get PTY writer")?;

        let reader = pair
            .master
            .try_clone_reader()
            .context("Failed to get PTY reader")?;

        let handler: OutputHandler = std::sync::Arc::new(handler);
        let forwarder = spawn_forwarder(reader, handler);

        Ok(Self {
            master: pair.master,
            child,
            writer,
            forwarder: Some(forwarder),
            line_pending: false,
        })
    }

    /// Check if the child process is still running
    pub fn is_running(&mut self) -> bool {
        self.child.try_wait().ok().flatten().is_none()
    }

    /// Close the program's input and wait up to [`FINISH_TIMEOUT`] for it
    /// to exit.
    pub fn finish(self) -> Result<()> {
        self.finish_within(FINISH_TIMEOUT)
    }

    /// Close the program's input and wait up to `timeout` for it to exit,
    /// killing it after that.
    pub fn finish_within(mut self, timeout: Duration) -> Result<()> {
        // A terminal only treats EOT as end of input on an empty line.
        if self.line_pending {
            self.writer.write_all(b"\r")?;
        }
        self.writer.write_all(&[0x04])?;
        self.writer.flush()?;

        let deadline = Instant::now() + timeout;
        loop {
            if self
                .child
                .try_wait()
                .context("Failed to poll PTY child")?
                .is_some()
            {
                break;
            }
            if Instant::now() >= deadline {
                warn!(?timeout, "target program did not exit, killing it");
                let _ = self.child.kill();
                self.child.wait().context("Failed to wait for PTY child")?;
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }

        drop(self.writer);
        drop(self.master);
        if let Some(forwarder) = self.forwarder.take() {
            let _ = forwarder.join();
        }
        Ok(())
    }
}

impl KeystrokeEmitter for PtyEmitter {
    fn emit(&mut self, ch: char) -> Result<()> {
        // A terminal sends carriage return for the Enter key.
        let ch = if ch == '\n' { '\r' } else { ch };
        let mut buf = [0u8; 4];
        self.writer
            .write_all(ch.encode_utf8(&mut buf).as_bytes())
            .context("Failed to write to PTY")?;
        self.writer.flush()?;
        self.line_pending = ch != '\r';
        Ok(())
    }
}
