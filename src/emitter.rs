//! Where typed characters go.
//!
//! The engine hands every keystroke to a [`KeystrokeEmitter`], one character
//! at a time. Delivery (a terminal, a program in a PTY, the OS input focus)
//! is the emitter's business.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Delivers one character to the typing target.
pub trait KeystrokeEmitter: Send + 'static {
    fn emit(&mut self, ch: char) -> Result<()>;
}

impl KeystrokeEmitter for Box<dyn KeystrokeEmitter> {
    fn emit(&mut self, ch: char) -> Result<()> {
        (**self).emit(ch)
    }
}

/// Writes each character to stdout and flushes.
#[derive(Debug, Default)]
pub struct StdoutEmitter;

impl KeystrokeEmitter for StdoutEmitter {
    fn emit(&mut self, ch: char) -> Result<()> {
        let mut stdout = io::stdout().lock();
        let mut buf = [0u8; 4];
        stdout
            .write_all(ch.encode_utf8(&mut buf).as_bytes())
            .context("Failed to write keystroke to stdout")?;
        stdout.flush().context("Failed to flush stdout")?;
        Ok(())
    }
}

/// Forwards each character to a closure.
pub struct FnEmitter<F>(pub F);

impl<F> KeystrokeEmitter for FnEmitter<F>
where
    F: FnMut(char) -> Result<()> + Send + 'static,
{
    fn emit(&mut self, ch: char) -> Result<()> {
        (self.0)(ch)
    }
}

/// Collects every character into a shared string.
///
/// Clones share the same buffer, so a caller can keep one handle and give
/// another to the engine.
#[derive(Debug, Clone, Default)]
pub struct RecordingEmitter {
    typed: Arc<Mutex<String>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn typed(&self) -> String {
        self.typed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl KeystrokeEmitter for RecordingEmitter {
    fn emit(&mut self, ch: char) -> Result<()> {
        self.typed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ch);
        Ok(())
    }
}

#[cfg(feature = "os-input")]
pub use os::OsEmitter;

#[cfg(feature = "os-input")]
mod os {
    use super::KeystrokeEmitter;
    use anyhow::{Context, Result, anyhow};
    use enigo::{Direction, Enigo, Key, Keyboard, Settings};
    use std::sync::mpsc::{Receiver, Sender, channel};
    use std::thread;

    /// Types into whatever window has the OS input focus.
    ///
    /// The platform keyboard handle lives on its own thread; keystrokes are
    /// sent over a channel and each one is acknowledged before `emit` returns.
    pub struct OsEmitter {
        keys: Sender<char>,
        acks: Receiver<Result<()>>,
    }

    impl OsEmitter {
        pub fn new() -> Result<Self> {
            let (key_tx, key_rx) = channel::<char>();
            let (ack_tx, ack_rx) = channel::<Result<()>>();

            thread::spawn(move || {
                let mut enigo = match Enigo::new(&Settings::default()) {
                    Ok(enigo) => {
                        let _ = ack_tx.send(Ok(()));
                        enigo
                    }
                    Err(e) => {
                        let _ = ack_tx.send(Err(anyhow!("Failed to initialize keyboard input: {e}")));
                        return;
                    }
                };
                for ch in key_rx {
                    let result = match ch {
                        '\n' => enigo.key(Key::Return, Direction::Click),
                        '\t' => enigo.key(Key::Tab, Direction::Click),
                        _ => enigo.text(ch.encode_utf8(&mut [0u8; 4])),
                    }
                    .map_err(|e| anyhow!("Failed to type {ch:?}: {e}"));
                    if ack_tx.send(result).is_err() {
                        break;
                    }
                }
            });

            ack_rx
                .recv()
                .context("Keyboard input thread exited during startup")??;
            Ok(Self {
                keys: key_tx,
                acks: ack_rx,
            })
        }
    }

    impl KeystrokeEmitter for OsEmitter {
        fn emit(&mut self, ch: char) -> Result<()> {
            self.keys
                .send(ch)
                .map_err(|_| anyhow!("Keyboard input thread is gone"))?;
            self.acks
                .recv()
                .context("Keyboard input thread is gone")?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_emitter_shares_buffer() {
        let recorder = RecordingEmitter::new();
        let mut handle = recorder.clone();
        handle.emit('h').unwrap();
        handle.emit('é').unwrap();
        assert_eq!(recorder.typed(), "hé");
    }

    #[test]
    fn test_fn_emitter() {
        let mut seen = Vec::new();
        let mut emitter = FnEmitter(move |ch| {
            seen.push(ch);
            anyhow::ensure!(seen.len() < 2, "full");
            Ok(())
        });
        assert!(emitter.emit('a').is_ok());
        assert!(emitter.emit('b').is_err());
    }
}
