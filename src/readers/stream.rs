use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::mpsc::Receiver;

// Line starts retained for error positions; older ones are discarded so
// the tracker stays bounded on arbitrarily large documents.
const MAX_TRACKED_LINES: usize = 1 << 16;

/// `Read` adapter over the bounded input queue.
///
/// Blocking on `recv` is the parser thread's input suspension point. An
/// empty chunk is the end-of-stream sentinel; a disconnected producer is
/// treated the same way. An error chunk surfaces as an I/O error.
pub(crate) struct ChunkSource {
    receiver: Receiver<io::Result<Vec<u8>>>,
    current: Vec<u8>,
    offset: usize,
    done: bool,
    tracker: PositionTracker,
}

impl ChunkSource {
    pub(crate) fn new(receiver: Receiver<io::Result<Vec<u8>>>) -> Self {
        Self {
            receiver,
            current: Vec::new(),
            offset: 0,
            done: false,
            tracker: PositionTracker::new(),
        }
    }

    /// Line (1-based) and column (0-based) of a byte offset already
    /// handed out by this source.
    pub(crate) fn position_at(&self, offset: u64) -> (u64, u64) {
        self.tracker.position_at(offset)
    }
}

impl Read for ChunkSource {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.offset >= self.current.len() {
            if self.done {
                return Ok(0);
            }
            match self.receiver.recv() {
                Ok(Ok(chunk)) => {
                    if chunk.is_empty() {
                        self.done = true;
                        return Ok(0);
                    }
                    self.current = chunk;
                    self.offset = 0;
                }
                Ok(Err(err)) => {
                    self.done = true;
                    return Err(err);
                }
                Err(_) => {
                    self.done = true;
                    return Ok(0);
                }
            }
        }
        let available = &self.current[self.offset..];
        let n = out.len().min(available.len());
        out[..n].copy_from_slice(&available[..n]);
        self.tracker.advance(&available[..n]);
        self.offset += n;
        Ok(n)
    }
}

struct PositionTracker {
    consumed: u64,
    line_starts: VecDeque<u64>,
    first_line: u64,
}

impl PositionTracker {
    fn new() -> Self {
        let mut line_starts = VecDeque::new();
        line_starts.push_back(0);
        Self {
            consumed: 0,
            line_starts,
            first_line: 1,
        }
    }

    fn advance(&mut self, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            if *byte == b'\n' {
                self.line_starts.push_back(self.consumed + i as u64 + 1);
            }
        }
        self.consumed += bytes.len() as u64;
        while self.line_starts.len() > MAX_TRACKED_LINES {
            self.line_starts.pop_front();
            self.first_line += 1;
        }
    }

    fn position_at(&self, offset: u64) -> (u64, u64) {
        let idx = self.line_starts.partition_point(|start| *start <= offset);
        if idx == 0 {
            // offset precedes the retained window
            return (self.first_line, 0);
        }
        let line = self.first_line + idx as u64 - 1;
        let column = offset - self.line_starts[idx - 1];
        (line, column)
    }
}
