//! Newline-delimited JSON line codec.
//!
//! Wire format: one UTF-8 JSON document per line, `\n` terminated (a
//! trailing `\r` is tolerated).
//!
//! The decoder accumulates incoming bytes and yields complete lines.  A
//! single socket read may carry part of a line, or several lines at once.
//! Lines longer than [`MAX_LINE_LEN`] are discarded up to their newline,
//! so a misbehaving client cannot grow the buffer without bound.

use serde::Serialize;

/// Maximum accepted line length in bytes, excluding the terminator.
pub const MAX_LINE_LEN: usize = 4096;

/// Streaming line decoder.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    /// Inside an overlong line; drop bytes until the next newline.
    discarding: bool,
    dropped: u32,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the decoder and collect every line they complete.
    /// Blank lines and lines that are not valid UTF-8 are skipped.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in data {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                    self.dropped += 1;
                } else {
                    self.finish_line(&mut lines);
                }
                self.buf.clear();
                continue;
            }
            if self.discarding {
                continue;
            }
            if self.buf.len() == MAX_LINE_LEN {
                // An allowed line may still end in "\r\n".
                if byte == b'\r' {
                    continue;
                }
                self.buf.clear();
                self.discarding = true;
                continue;
            }
            self.buf.push(byte);
        }
        lines
    }

    fn finish_line(&mut self, lines: &mut Vec<String>) {
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        if self.buf.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        match String::from_utf8(core::mem::take(&mut self.buf)) {
            Ok(line) => lines.push(line),
            Err(_) => self.dropped += 1,
        }
    }

    /// Forget any partial line (e.g. after a reconnect).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }

    /// Lines discarded so far for length or encoding.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

/// Encode a value as one wire line, terminator included.
pub fn encode_line<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}
