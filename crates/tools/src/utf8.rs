//! Incremental UTF-8 decoding for byte streams that may split a code point
//! across reads.
//!
//! Invalid sequences decode to U+FFFD and decoding keeps going, so a bad byte
//! never stalls a stream.

/// Stateful decoder holding the incomplete suffix of the last chunk.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    // Never longer than 3 bytes: a 4-byte sequence is either complete or pending.
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a partial code point is waiting for more bytes.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Decode `bytes`, returning all text that is complete after this chunk.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len() + self.pending.len());
        self.decode_into(&mut out, bytes);
        out
    }

    /// Decode `bytes` and append the completed text to `out`.
    pub fn decode_into(&mut self, out: &mut String, bytes: &[u8]) {
        let mut rest = bytes;

        while !self.pending.is_empty() && !rest.is_empty() {
            let want = seq_len(self.pending[0]);
            if want == 0 {
                out.push('\u{FFFD}');
                self.pending.clear();
                break;
            }
            let missing = want.saturating_sub(self.pending.len());
            if rest.len() < missing {
                self.pending.extend_from_slice(rest);
                return;
            }

            let mut scratch = [0u8; 4];
            let held = self.pending.len();
            scratch[..held].copy_from_slice(&self.pending);
            scratch[held..held + missing].copy_from_slice(&rest[..missing]);
            self.pending.clear();
            rest = &rest[missing..];
            decode_lossy(out, &mut self.pending, &scratch[..held + missing]);
        }

        if !rest.is_empty() {
            decode_lossy(out, &mut self.pending, rest);
        }
    }

    /// Flush a dangling partial sequence at end of stream as U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

fn seq_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

fn decode_lossy(out: &mut String, pending: &mut Vec<u8>, mut bytes: &[u8]) {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                out.push_str(s);
                return;
            }
            Err(e) => {
                let (valid, after) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match e.error_len() {
                    Some(bad) => {
                        out.push('\u{FFFD}');
                        bytes = &after[bad..];
                    }
                    None => {
                        pending.extend_from_slice(after);
                        return;
                    }
                }
            }
        }
    }
}
