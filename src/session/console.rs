use chrono::NaiveDateTime;
use std::collections::VecDeque;
use std::fmt;

const TIME_FORMAT_SHORT: &str = "%m-%d %H:%M:%S";

/// One line of the on-screen log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub text: String,
}

impl LogEntry {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Local::now().naive_local(),
            text: text.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.timestamp.format(TIME_FORMAT_SHORT),
            self.text
        )
    }
}

/// Bounded log shown in the console panel. The oldest lines go first.
#[derive(Debug)]
pub struct Console {
    entries: VecDeque<LogEntry>,
    max_lines: usize,
}

impl Console {
    pub fn new(max_lines: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_lines: max_lines.max(1),
        }
    }

    pub fn push(&mut self, text: impl Into<String>) {
        if self.entries.len() == self.max_lines {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry::now(text));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}
