//! Streams k-mers out of GenBank flat files.
//!
//! Only the lines between an `ORIGIN` line and the closing `//` carry
//! sequence. Each such line starts with a base position that is skipped.
//! A base other than `a`, `c`, `g` or `t` (for example `n`) ends the current
//! window, so no k-mer ever spans it. Every `ORIGIN` section starts a fresh
//! window.

use std::io::BufRead;

use tracing::debug;

use crate::error::Result;
use crate::kmer;

/// Iterator over the packed k-mers of a GenBank file, in file order.
pub struct KmerReader<R> {
    reader: R,
    k: usize,
    mask: u64,
    line: String,
    pos: usize,
    in_sequence: bool,
    window: u64,
    filled: usize,
    sections: u64,
    done: bool,
}

impl<R: BufRead> KmerReader<R> {
    /// Reads k-mers of length `k` from `reader`.
    pub fn new(reader: R, k: usize) -> Result<Self> {
        kmer::check_len(k)?;
        Ok(Self {
            reader,
            k,
            mask: kmer::mask(k),
            line: String::new(),
            pos: 0,
            in_sequence: false,
            window: 0,
            filled: 0,
            sections: 0,
            done: false,
        })
    }

    /// k-mer length.
    pub fn kmer_len(&self) -> usize {
        self.k
    }

    /// `ORIGIN` sections entered so far.
    pub fn sections(&self) -> u64 {
        self.sections
    }

    fn reset_window(&mut self) {
        self.window = 0;
        self.filled = 0;
    }

    /// Loads the next sequence line; false at end of input.
    fn advance_line(&mut self) -> Result<bool> {
        loop {
            self.line.clear();
            self.pos = 0;
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(false);
            }
            let trimmed = self.line.trim();
            if !self.in_sequence {
                if trimmed.split_whitespace().next() == Some("ORIGIN") {
                    self.in_sequence = true;
                    self.sections += 1;
                    self.reset_window();
                    debug!(section = self.sections, "genbank.origin");
                }
                continue;
            }
            if trimmed == "//" {
                self.in_sequence = false;
                continue;
            }
            self.pos = sequence_start(&self.line);
            return Ok(true);
        }
    }
}

/// Byte index just past a leading position number, if the line has one.
fn sequence_start(line: &str) -> usize {
    let body = line.trim_start();
    let lead = line.len() - body.len();
    let token_len = body.find(char::is_whitespace).unwrap_or(body.len());
    let token = &body[..token_len];
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        lead + token_len
    } else {
        lead
    }
}

impl<R: BufRead> Iterator for KmerReader<R> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            while let Some(&b) = self.line.as_bytes().get(self.pos) {
                self.pos += 1;
                match kmer::base_code(b) {
                    Some(code) => {
                        self.window = ((self.window << 2) | code) & self.mask;
                        self.filled = (self.filled + 1).min(self.k);
                        if self.filled == self.k {
                            return Some(Ok(self.window));
                        }
                    }
                    None if b.is_ascii_whitespace() => {}
                    None => self.reset_window(),
                }
            }
            match self.advance_line() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
