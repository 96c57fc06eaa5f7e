use std::io::Read;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub type OutputHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Spawns a background thread that passes everything read from a PTY to `handler`
pub fn spawn_forwarder<R: Read + Send + 'static>(
    mut reader: R,
    handler: OutputHandler,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buffer = [0u8; 4096];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break, // EOF
                Ok(n) => handler(&buffer[..n]),
                Err(_) => break,
            }
        }
    })
}
