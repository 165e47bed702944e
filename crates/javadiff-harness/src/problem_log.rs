//! Order-insensitive comparison of compiler problem logs.
//!
//! A log is a sequence of entries separated by [`ENTRY_SEPARATOR`], each usually
//! numbered (`"3. ERROR in X.java ..."`). Compilers may report the same problems in a
//! different order, so two logs are equal when their sets of un-numbered entries are.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Separator line between two entries.
pub const ENTRY_SEPARATOR: &str = "----------\n";

static ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A\d*\. ").expect("ordinal pattern is valid"));

static CAPTURE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"capture#\d+").expect("capture pattern is valid"));

/// Set of problem entries, ordinals stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProblemLog {
    entries: BTreeSet<String>,
}

impl ProblemLog {
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut chunks: Vec<&str> = text.split(ENTRY_SEPARATOR).collect();
        // An unsplit input stays as its single (possibly empty) chunk.
        if chunks.len() > 1 {
            while chunks.last().is_some_and(|chunk| chunk.is_empty()) {
                chunks.pop();
            }
        }
        let entries = chunks
            .into_iter()
            .map(|chunk| match ORDINAL.find(chunk) {
                Some(ordinal) => chunk[ordinal.end()..].to_string(),
                None => chunk.to_string(),
            })
            .collect();
        Self { entries }
    }

    /// True when `text` parses to the same entry set.
    #[must_use]
    pub fn same_as(&self, text: &str) -> bool {
        *self == Self::parse(text)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

/// `\r\n` and lone `\r` become `\n`.
#[must_use]
pub fn normalize_line_delimiters(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Redact nondeterministic `capture#N` identifiers.
#[must_use]
pub fn swallow_capture_ids(text: &str) -> String {
    CAPTURE_ID.replace_all(text, "capture").into_owned()
}

/// Indent every line of `text` by `indent` tabs, for failure dumps.
#[must_use]
pub fn indent_block(text: &str, indent: usize) -> String {
    let prefix = "\t".repeat(indent);
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
