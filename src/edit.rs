use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Line-ending style detected in a script file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// A script file held in memory as an ordered sequence of lines.
///
/// Line-ending style and trailing newline are remembered so that a file
/// nobody touched serializes back to the exact bytes it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<String>,
    ending: LineEnding,
    trailing_newline: bool,
}

impl LineBuffer {
    pub fn parse(content: &str) -> Self {
        let ending = if content.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        };

        if content.is_empty() {
            return Self {
                lines: Vec::new(),
                ending,
                trailing_newline: false,
            };
        }

        let mut lines: Vec<String> = content
            .split(ending.as_str())
            .map(str::to_string)
            .collect();
        let trailing_newline = content.ends_with(ending.as_str());
        if trailing_newline {
            lines.pop();
        }

        Self {
            lines,
            ending,
            trailing_newline,
        }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            ending: LineEnding::Lf,
            trailing_newline: false,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn ending(&self) -> LineEnding {
        self.ending
    }

    /// Swap in a new line sequence, keeping the line-ending style.
    pub fn replace_lines(&mut self, lines: Vec<String>) {
        self.lines = lines;
    }

    pub fn serialize(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let mut out = self.lines.join(self.ending.as_str());
        if self.trailing_newline {
            out.push_str(self.ending.as_str());
        }
        out
    }
}

/// Where a [`LineEdit`] lands relative to its anchor line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditKind {
    /// Insert the payload immediately before the anchor line.
    InsertBefore { line: usize },
    /// Insert the payload immediately after the anchor line.
    InsertAfter { line: usize },
    /// Replace the anchor line with the payload.
    Replace { line: usize },
    /// Append the payload at end of file.
    Append,
}

/// A single line-level edit: position, kind and payload.
///
/// Edits are collected while scanning and applied together by
/// [`apply_line_edits`]; nothing mutates the buffer while anchors are
/// still being read from it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "LineEdit does nothing until passed to apply_line_edits()"]
pub struct LineEdit {
    pub kind: EditKind,
    pub payload: Vec<String>,
}

impl LineEdit {
    pub fn insert_before(line: usize, payload: Vec<String>) -> Self {
        Self {
            kind: EditKind::InsertBefore { line },
            payload,
        }
    }

    pub fn insert_after(line: usize, payload: Vec<String>) -> Self {
        Self {
            kind: EditKind::InsertAfter { line },
            payload,
        }
    }

    pub fn replace(line: usize, payload: Vec<String>) -> Self {
        Self {
            kind: EditKind::Replace { line },
            payload,
        }
    }

    pub fn append(payload: Vec<String>) -> Self {
        Self {
            kind: EditKind::Append,
            payload,
        }
    }

    /// Anchor line, or `None` for end-of-file appends.
    pub fn line(&self) -> Option<usize> {
        match self.kind {
            EditKind::InsertBefore { line }
            | EditKind::InsertAfter { line }
            | EditKind::Replace { line } => Some(line),
            EditKind::Append => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("edit targets line {line} in a buffer of {len} lines")]
    InvalidLine { line: usize, len: usize },

    #[error("line {line} is replaced by more than one edit")]
    ConflictingReplace { line: usize },

    #[error("file changed on disk since it was read (xxh3 {actual:016x}, expected {expected:016x})")]
    ModifiedOnDisk { expected: u64, actual: u64 },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Apply a batch of line edits, producing a fresh line sequence.
///
/// Edits are sorted by anchor line descending and applied bottom-to-top,
/// so no edit shifts the anchor of one not yet applied. Edits sharing an
/// anchor keep the order they were emitted in.
pub fn apply_line_edits(
    lines: Vec<String>,
    mut edits: Vec<LineEdit>,
) -> Result<Vec<String>, EditError> {
    let len = lines.len();
    let mut replaced = std::collections::HashSet::new();
    for edit in &edits {
        if let Some(line) = edit.line() {
            if line >= len {
                return Err(EditError::InvalidLine { line, len });
            }
        }
        if let EditKind::Replace { line } = edit.kind {
            if !replaced.insert(line) {
                return Err(EditError::ConflictingReplace { line });
            }
        }
    }

    // Stable sort: ties keep emission order. Appends sort last.
    edits.sort_by(|a, b| b.line().cmp(&a.line()));

    let payload_len: usize = edits.iter().map(|e| e.payload.len()).sum();
    let mut reversed = Vec::with_capacity(len + payload_len);

    let (anchored, appends): (Vec<LineEdit>, Vec<LineEdit>) =
        edits.into_iter().partition(|e| e.line().is_some());

    for edit in appends.iter().rev() {
        reversed.extend(edit.payload.iter().rev().cloned());
    }

    let mut pending = anchored.into_iter().peekable();
    for (idx, line) in lines.into_iter().enumerate().rev() {
        let mut group = Vec::new();
        while let Some(edit) = pending.next_if(|e| e.line() == Some(idx)) {
            group.push(edit);
        }

        for edit in group.iter().rev() {
            if matches!(edit.kind, EditKind::InsertAfter { .. }) {
                reversed.extend(edit.payload.iter().rev().cloned());
            }
        }

        match group
            .iter()
            .find(|e| matches!(e.kind, EditKind::Replace { .. }))
        {
            Some(edit) => reversed.extend(edit.payload.iter().rev().cloned()),
            None => reversed.push(line),
        }

        for edit in group.iter().rev() {
            if matches!(edit.kind, EditKind::InsertBefore { .. }) {
                reversed.extend(edit.payload.iter().rev().cloned());
            }
        }
    }

    reversed.reverse();
    Ok(reversed)
}

/// xxh3 hash of file content, checked before a file is overwritten.
pub fn content_hash(content: &str) -> u64 {
    xxh3_64(content.as_bytes())
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the original file is left as it was.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    let parent = path.parent().ok_or_else(|| {
        EditError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// Replace the file at `path` with `content`, provided it still holds the
/// text whose hash is `expected_before`.
pub fn write_verified(path: &Path, expected_before: u64, content: &str) -> Result<(), EditError> {
    let actual = xxh3_64(&std::fs::read(path)?);
    if actual != expected_before {
        return Err(EditError::ModifiedOnDisk {
            expected: expected_before,
            actual,
        });
    }
    atomic_write(path, content.as_bytes())
}
