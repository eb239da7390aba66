//! Stop keys for interactive playback.
//!
//! The terminal is switched to raw mode so Ctrl-C arrives as a key press
//! instead of killing the process with notes still sounding.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use midiloom::CancelToken;
use tracing::{info, warn};

static RAW_MODE: AtomicBool = AtomicBool::new(false);

/// Log writer that adds the carriage returns raw mode stops emitting.
pub struct TerminalWriter<W>(pub W);

impl<W: Write> Write for TerminalWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !RAW_MODE.load(Ordering::Relaxed) {
            return self.0.write(buf);
        }
        for line in buf.split_inclusive(|&b| b == b'\n') {
            match line.strip_suffix(b"\n") {
                Some(text) => {
                    self.0.write_all(text)?;
                    self.0.write_all(b"\r\n")?;
                }
                None => self.0.write_all(line)?,
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

pub struct KeyListener {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeyListener {
    /// Cancels `cancel` on Esc, `q` or Ctrl-C until dropped.
    pub fn spawn(cancel: CancelToken) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        RAW_MODE.store(true, Ordering::Relaxed);

        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();
        let handle = std::thread::spawn(move || {
            while !stop_thread.load(Ordering::Relaxed) {
                match event::poll(Duration::from_millis(50)) {
                    Ok(true) => match event::read() {
                        Ok(Event::Key(key)) if key.kind == KeyEventKind::Press && is_stop_key(&key) => {
                            info!("Stopping playback");
                            cancel.cancel();
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Keyboard input failed: {}", e);
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Keyboard input failed: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        RAW_MODE.store(false, Ordering::Relaxed);
        let _ = terminal::disable_raw_mode();
    }
}

fn is_stop_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}
