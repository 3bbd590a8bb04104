/**
 * Line reader feeding the work queue.
 *
 * Wraps any `BufRead` and yields one trimmed `Record` per line. The
 * sequence is lazy, finite and not restartable:
 * - `Some(Ok(record))` — the next line.
 * - `Some(Err(e))` — a genuine read failure; the caller should stop.
 * - `None` — end of stream.
 *
 * Bytes that are not valid UTF-8 are replaced rather than failing the
 * whole stream, and a last line without a trailing newline still counts.
 */
use std::io::{self, BufRead};

use super::types::Record;

pub struct InputReader<R> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> InputReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for InputReader<R> {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.buf.clear();
        loop {
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&self.buf);
                    return Some(Ok(Record::new(&line)));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
