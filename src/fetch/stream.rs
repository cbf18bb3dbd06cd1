//! Reassembly of records from the bulk stream endpoint.
//!
//! The endpoint writes one JSON object per line, but the transport can
//! break a line at characters such as U+2028. Objects are therefore cut
//! on brace balance rather than on newlines.

use std::collections::VecDeque;
use std::io::BufRead;

use super::error::{FetchError, FetchResult};

/// Splits a byte stream into top-level JSON objects.
#[derive(Debug, Default)]
pub struct FragmentAssembler {
    buf: Vec<u8>,
    depth: u32,
    in_string: bool,
    escaped: bool,
}

impl FragmentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every object completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>, String> {
        let mut done = Vec::new();
        for &b in chunk {
            if self.depth == 0 {
                match b {
                    b'{' => {
                        self.depth = 1;
                        self.buf.push(b);
                    }
                    b if b.is_ascii_whitespace() || b == b',' => {}
                    other => {
                        return Err(format!(
                            "unexpected byte 0x{:02x} between records",
                            other
                        ))
                    }
                }
                continue;
            }

            self.buf.push(b);
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match b {
                b'"' => self.in_string = true,
                b'{' => self.depth += 1,
                b'}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        done.push(std::mem::take(&mut self.buf));
                    }
                }
                _ => {}
            }
        }
        Ok(done)
    }

    /// Whether an object is partially buffered.
    pub fn is_pending(&self) -> bool {
        self.depth > 0
    }

    /// Check that the stream ended between objects.
    pub fn finish(&self) -> Result<(), String> {
        if self.is_pending() {
            Err(format!(
                "stream ended inside a record ({} bytes buffered)",
                self.buf.len()
            ))
        } else {
            Ok(())
        }
    }

    fn pending(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

/// Iterator over the objects of a streamed response body.
pub struct StreamRecords {
    path: String,
    reader: Box<dyn BufRead + Send>,
    assembler: FragmentAssembler,
    ready: VecDeque<Vec<u8>>,
    line: Vec<u8>,
    done: bool,
}

impl StreamRecords {
    pub fn new(path: &str, reader: Box<dyn BufRead + Send>) -> Self {
        Self {
            path: path.to_string(),
            reader,
            assembler: FragmentAssembler::new(),
            ready: VecDeque::new(),
            line: Vec::new(),
            done: false,
        }
    }

    fn fail(&mut self, reason: String) -> FetchError {
        self.done = true;
        FetchError::malformed(&self.path, reason, &self.assembler.pending())
    }
}

impl Iterator for StreamRecords {
    type Item = FetchResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }

            self.line.clear();
            let read = match self.reader.read_until(b'\n', &mut self.line) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Some(Err(FetchError::Transport {
                        path: self.path.clone(),
                        message: e.to_string(),
                    }));
                }
            };
            if read == 0 {
                self.done = true;
                if let Err(reason) = self.assembler.finish() {
                    return Some(Err(self.fail(reason)));
                }
                return None;
            }
            match self.assembler.feed(&self.line) {
                Ok(records) => self.ready.extend(records),
                Err(reason) => return Some(Err(self.fail(reason))),
            }
        }
    }
}
