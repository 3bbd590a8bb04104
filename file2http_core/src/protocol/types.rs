/**
 * The unit of delivery.
 *
 * A `Record` is one input line with surrounding whitespace removed. It is
 * immutable once built; duplicates are perfectly valid and each one is
 * delivered on its own.
 */
use std::fmt;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/**
 * One trimmed line of input.
 *
 * Construction always trims, so a `Record` can never carry leading or
 * trailing whitespace regardless of where it came from.
 */
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Record(String);

impl Record {
    /// Builds a record from a raw line, stripping surrounding whitespace.
    pub fn new(line: &str) -> Self {
        Self(line.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Record {
    fn from(line: String) -> Self {
        // Avoid the copy when there is nothing to trim.
        if line.trim().len() == line.len() {
            Self(line)
        } else {
            Self::new(&line)
        }
    }
}
