use std::fmt;

pub const NAMESPACE_SEPARATOR: char = '.';

/// Dotted method path consumed one segment at a time while routing.
///
/// Each routing layer [`pop`](Namespace::pop)s the segment it owns and
/// hands the rest on. A layer that turns out not to handle the call
/// [`push`](Namespace::push)es its segment back, and [`rewind`](Namespace::rewind)
/// restores the full path for a retry against another handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Namespace {
    tokens: Vec<String>,
    position: usize,
    popped: Vec<usize>,
}

impl Namespace {
    pub fn new(method: &str) -> Self {
        Self {
            tokens: method
                .split(NAMESPACE_SEPARATOR)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            position: 0,
            popped: Vec::new(),
        }
    }

    /// Next segment, without consuming it.
    pub fn first(&self) -> Option<&str> {
        self.tokens.get(self.position).map(String::as_str)
    }

    /// Final segment of the whole path.
    pub fn last(&self) -> Option<&str> {
        self.tokens.last().map(String::as_str)
    }

    /// Remaining, unconsumed path.
    pub fn path(&self) -> String {
        self.tokens[self.position..].join(".")
    }

    /// Whole path, ignoring consumption.
    pub fn full_path(&self) -> String {
        self.tokens.join(".")
    }

    /// Number of segments consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// Consume the next segment.
    pub fn pop(&mut self) -> Option<String> {
        let token = self.tokens.get(self.position)?.clone();
        self.popped.push(self.position);
        self.position += 1;
        Some(token)
    }

    /// Undo the most recent [`pop`](Namespace::pop). Returns `false` if
    /// nothing was popped.
    pub fn push(&mut self) -> bool {
        match self.popped.pop() {
            Some(position) => {
                self.position = position;
                true
            }
            None => false,
        }
    }

    /// Restore every popped segment.
    pub fn rewind(&mut self) {
        self.position = 0;
        self.popped.clear();
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
