//! Persistent command history ring
//!
//! A fixed-capacity circular log of submitted commands with a navigation
//! cursor (for Up/Down browsing) and newest-first prefix lookup (for inline
//! suggestions). Entries can be persisted to a plain text file, one command
//! per line, oldest first, and are replayed through [`HistoryRing::add`] on load
//! so de-duplication and eviction apply the same way as during live use.

use std::borrow::Cow;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Steady-state history signals. These are expected during normal navigation
/// and are cheap to produce and match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("history is empty")]
    Empty,

    #[error("no more history")]
    NoMoreHistory,

    #[error("no history entry matches")]
    NoMatch,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// Bounded, order-preserving command history
#[derive(Debug, Clone)]
pub struct HistoryRing {
    /// Physical slots; only `count` of them are live
    slots: Vec<String>,
    /// Next slot to write
    head: usize,
    /// Oldest live slot
    tail: usize,
    /// Number of live entries
    count: usize,
    /// Distance from the most recent entry, `None` when not browsing
    cursor: Option<usize>,
    /// Backing file, if persistence is configured
    path: Option<PathBuf>,
}

impl HistoryRing {
    /// Create an empty in-memory ring
    pub fn new(capacity: usize) -> std::result::Result<Self, HistoryError> {
        if capacity == 0 {
            return Err(HistoryError::InvalidArgument("capacity must be at least 1"));
        }
        Ok(Self {
            slots: vec![String::new(); capacity],
            head: 0,
            tail: 0,
            count: 0,
            cursor: None,
            path: None,
        })
    }

    /// Create a ring backed by `path`, replaying the file if it exists
    pub fn open(capacity: usize, path: impl Into<PathBuf>) -> Result<Self> {
        let mut ring = Self::new(capacity)?;
        let path = path.into();

        match fs::read(&path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                for line in text.lines() {
                    ring.add(line);
                }
                debug!(
                    "Loaded {} history entries from {}",
                    ring.len(),
                    path.display()
                );
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No history file at {}", path.display());
            }
            Err(e) => return Err(e.into()),
        }

        ring.path = Some(path);
        Ok(ring)
    }

    /// Maximum number of retained entries
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Backing file path, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current cursor as a distance from the most recent entry
    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    /// Record a command.
    ///
    /// Line breaks become spaces so every entry stays one line in the file.
    /// Empty commands and repeats of the most recent entry are ignored. When
    /// the ring is full the oldest entry is evicted.
    pub fn add(&mut self, command: &str) {
        let command = single_line(command);
        if command.is_empty() || self.most_recent() == Some(&*command) {
            return;
        }

        let capacity = self.capacity();
        if self.count == capacity {
            self.tail = (self.tail + 1) % capacity;
        } else {
            self.count += 1;
        }

        self.slots[self.head] = command.into_owned();
        self.head = (self.head + 1) % capacity;

        if let Some(distance) = self.cursor {
            if distance >= self.count {
                self.cursor = Some(self.count - 1);
            }
        }
    }

    /// Step toward older entries
    pub fn prev(&mut self) -> std::result::Result<&str, HistoryError> {
        if self.count == 0 {
            return Err(HistoryError::Empty);
        }

        let distance = match self.cursor {
            None => 0,
            Some(d) if d + 1 >= self.count => return Err(HistoryError::NoMoreHistory),
            Some(d) => d + 1,
        };

        self.cursor = Some(distance);
        Ok(self.entry_at(distance))
    }

    /// Step toward newer entries.
    ///
    /// Stepping past the most recent entry leaves browsing mode and yields an
    /// empty string.
    pub fn next(&mut self) -> std::result::Result<&str, HistoryError> {
        match self.cursor {
            None => Err(HistoryError::NoMoreHistory),
            Some(0) => {
                self.cursor = None;
                Ok("")
            }
            Some(d) => {
                self.cursor = Some(d - 1);
                Ok(self.entry_at(d - 1))
            }
        }
    }

    /// Leave browsing mode
    pub fn reset_pos(&mut self) {
        self.cursor = None;
    }

    /// Most recent entry starting with `prefix`
    pub fn last_match(&self, prefix: &str) -> std::result::Result<&str, HistoryError> {
        if prefix.is_empty() {
            return Err(HistoryError::InvalidArgument("prefix must not be empty"));
        }
        if self.count == 0 {
            return Err(HistoryError::Empty);
        }

        (0..self.count)
            .map(|d| self.entry_at(d))
            .find(|entry| entry.starts_with(prefix))
            .ok_or(HistoryError::NoMatch)
    }

    /// Entries oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        let capacity = self.capacity();
        (0..self.count).map(move |i| self.slots[(self.tail + i) % capacity].as_str())
    }

    /// Write all entries to the backing file, oldest first
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if self.count == 0 {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut contents = String::new();
        for entry in self.iter() {
            contents.push_str(entry);
            contents.push('\n');
        }
        fs::write(path, contents)?;

        debug!("Saved {} history entries to {}", self.count, path.display());
        Ok(())
    }

    /// Flush to the backing file and release the ring
    pub fn close(self) -> Result<()> {
        self.save()
    }

    fn most_recent(&self) -> Option<&str> {
        (self.count > 0).then(|| self.entry_at(0))
    }

    /// Entry `distance` steps back from the most recent one
    fn entry_at(&self, distance: usize) -> &str {
        let capacity = self.capacity();
        &self.slots[(self.head + capacity - 1 - distance) % capacity]
    }
}

fn single_line(command: &str) -> Cow<'_, str> {
    if command.contains(['\r', '\n']) {
        Cow::Owned(command.replace("\r\n", " ").replace(['\r', '\n'], " "))
    } else {
        Cow::Borrowed(command)
    }
}
