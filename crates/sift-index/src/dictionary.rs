//! Sources of suggestion entries.

use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
    path::Path,
    vec,
};

use crate::SuggestError;

/// One suggestion to index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Text suggested back to the user.
    pub surface: String,
    /// Ranking weight, at most `i32::MAX`.
    pub weight: u64,
    /// Opaque bytes returned with the suggestion.
    pub payload: Option<Vec<u8>>,
    /// Filtering contexts; not supported by the suggester.
    pub contexts: Vec<Vec<u8>>,
}

impl Entry {
    /// Creates an entry without payload or contexts.
    pub fn new(surface: impl Into<String>, weight: u64) -> Self {
        Self {
            surface: surface.into(),
            weight,
            payload: None,
            contexts: Vec::new(),
        }
    }

    /// Attaches a payload.
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Attaches contexts.
    pub fn with_contexts(mut self, contexts: Vec<Vec<u8>>) -> Self {
        self.contexts = contexts;
        self
    }
}

/// A stream of entries for one build.
///
/// Payload and context modes apply to the whole stream and are queried
/// before the first entry is read.
pub trait EntrySource {
    /// Returns the next entry, or `None` when exhausted.
    fn next_entry(&mut self) -> Result<Option<Entry>, SuggestError>;

    /// Whether entries carry payloads.
    fn has_payloads(&self) -> bool;

    /// Whether entries carry contexts.
    fn has_contexts(&self) -> bool;
}

/// An in-memory entry source.
#[derive(Debug, Clone)]
pub struct EntryList {
    /// Remaining entries.
    entries: vec::IntoIter<Entry>,
    /// Set if any entry has a payload.
    has_payloads: bool,
    /// Set if any entry has contexts.
    has_contexts: bool,
}

impl EntryList {
    /// Wraps a list of entries.
    pub fn new(entries: Vec<Entry>) -> Self {
        let has_payloads = entries.iter().any(|e| e.payload.is_some());
        let has_contexts = entries.iter().any(|e| !e.contexts.is_empty());
        Self {
            entries: entries.into_iter(),
            has_payloads,
            has_contexts,
        }
    }
}

impl From<Vec<Entry>> for EntryList {
    fn from(entries: Vec<Entry>) -> Self {
        Self::new(entries)
    }
}

impl EntrySource for EntryList {
    fn next_entry(&mut self) -> Result<Option<Entry>, SuggestError> {
        Ok(self.entries.next())
    }

    fn has_payloads(&self) -> bool {
        self.has_payloads
    }

    fn has_contexts(&self) -> bool {
        self.has_contexts
    }
}

/// Reads entries from tab-separated lines: `surface[\tweight[\tpayload]]`.
///
/// A missing weight defaults to 1. The first entry decides whether the
/// file carries payloads, and every later entry must agree. Blank lines are
/// skipped.
pub struct FileDictionary<R> {
    /// Remaining lines.
    lines: Lines<R>,
    /// Number of the last line read.
    line: usize,
    /// First entry, read ahead to learn the payload mode.
    pending: Option<Entry>,
    /// Whether the first entry had a payload.
    has_payloads: bool,
}

impl FileDictionary<BufReader<File>> {
    /// Opens a dictionary file.
    pub fn open(path: &Path) -> Result<Self, SuggestError> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: BufRead> FileDictionary<R> {
    /// Wraps a reader; reads ahead to the first entry.
    pub fn new(reader: R) -> Result<Self, SuggestError> {
        let mut dictionary = Self {
            lines: reader.lines(),
            line: 0,
            pending: None,
            has_payloads: false,
        };
        if let Some((entry, fields)) = dictionary.read_entry()? {
            dictionary.has_payloads = fields == 3;
            dictionary.pending = Some(entry);
        }
        Ok(dictionary)
    }

    /// Reads and parses the next non-blank line.
    fn read_entry(&mut self) -> Result<Option<(Entry, usize)>, SuggestError> {
        for line in self.lines.by_ref() {
            let line = line?;
            self.line += 1;
            if line.is_empty() {
                continue;
            }
            return parse_line(&line, self.line).map(Some);
        }
        Ok(None)
    }
}

impl<R: BufRead> EntrySource for FileDictionary<R> {
    fn next_entry(&mut self) -> Result<Option<Entry>, SuggestError> {
        if let Some(entry) = self.pending.take() {
            return Ok(Some(entry));
        }
        let Some((entry, fields)) = self.read_entry()? else {
            return Ok(None);
        };
        if self.has_payloads != (fields == 3) {
            return Err(SuggestError::InvalidDictionaryLine {
                line: self.line,
                message: if self.has_payloads {
                    "missing payload; the first entry had one".to_string()
                } else {
                    "unexpected payload; the first entry had none".to_string()
                },
            });
        }
        Ok(Some(entry))
    }

    fn has_payloads(&self) -> bool {
        self.has_payloads
    }

    fn has_contexts(&self) -> bool {
        false
    }
}

/// Parses one line, returning the entry and its field count.
fn parse_line(line: &str, number: usize) -> Result<(Entry, usize), SuggestError> {
    let invalid = |message: String| SuggestError::InvalidDictionaryLine {
        line: number,
        message,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    let weight = match fields.get(1) {
        Some(weight) => weight
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(format!("invalid weight {weight:?}: {e}")))?,
        None => 1,
    };

    let mut entry = Entry::new(fields[0], weight);
    match fields.len() {
        1 | 2 => {}
        3 => entry.payload = Some(fields[2].as_bytes().to_vec()),
        n => return Err(invalid(format!("expected at most 3 fields, found {n}"))),
    }
    Ok((entry, fields.len()))
}
