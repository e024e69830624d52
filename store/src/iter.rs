//! Prefix scan options and the one-shot entry iterator.

use std::collections::VecDeque;

/// Options for a prefix scan. The cursor is an opaque byte string equal to a
/// previously yielded key; iteration resumes strictly after it (or strictly
/// before it when scanning in reverse). Cursors are backend-local.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub reverse: bool,
    pub cursor: Option<Vec<u8>>,
    pub limit: u64,
}

impl ListOptions {
    pub fn new() -> Self {
        ListOptions::default()
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn cursor(mut self, cursor: Vec<u8>) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Entry {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Entry { key, value }
    }
}

/// Finite, one-shot, pull-based sequence of entries. The key of each yielded
/// entry doubles as the resume cursor for a follow-up scan.
#[derive(Debug)]
pub struct EntryIter {
    entries: VecDeque<Entry>,
}

impl EntryIter {
    pub fn new(entries: Vec<Entry>) -> Self {
        EntryIter { entries: entries.into() }
    }

    pub fn empty() -> Self {
        EntryIter { entries: VecDeque::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Iterator for EntryIter {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        self.entries.pop_front()
    }
}

/// Clamp and order a fully materialized ascending window according to the
/// requested options. Shared by backends so their cursor/limit/reverse
/// semantics stay identical.
pub(crate) fn apply_options(mut entries: Vec<Entry>, opts: &ListOptions) -> Vec<Entry> {
    if opts.reverse {
        entries.reverse();
    }
    if let Some(cursor) = &opts.cursor {
        entries.retain(|e| if opts.reverse { e.key < *cursor } else { e.key > *cursor });
    }
    if opts.limit > 0 && entries.len() as u64 > opts.limit {
        entries.truncate(opts.limit as usize);
    }
    entries
}
