#![forbid(unsafe_code)]

//! Line-buffered log output for the browser console.
//!
//! [`ConsoleSink`] implements [`std::io::Write`] so it can back a
//! `tracing-subscriber` fmt layer. Output is buffered until a newline and
//! each complete line is handed to the emit callback with a fixed prefix, so
//! one event never spans several console entries.

use std::io::{self, Write};

/// Prefix for every console line.
pub const LOG_PREFIX: &str = "[PastePositionLock]";

/// A write adapter that emits prefixed, complete lines.
pub struct ConsoleSink<F: FnMut(&str)> {
    prefix: &'static str,
    buffer: Vec<u8>,
    emit: F,
}

impl<F: FnMut(&str)> ConsoleSink<F> {
    /// Create a sink that hands each finished line to `emit`.
    pub fn new(prefix: &'static str, emit: F) -> Self {
        Self {
            prefix,
            buffer: Vec::with_capacity(256),
            emit,
        }
    }

    fn emit_buffer(&mut self) {
        let line = String::from_utf8_lossy(&self.buffer);
        let line = line.trim_end_matches('\r');
        (self.emit)(&format!("{} {line}", self.prefix));
        self.buffer.clear();
    }
}

impl<F: FnMut(&str)> Write for ConsoleSink<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte == b'\n' {
                self.emit_buffer();
            } else {
                self.buffer.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.emit_buffer();
        }
        Ok(())
    }
}

impl<F: FnMut(&str)> Drop for ConsoleSink<F> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
