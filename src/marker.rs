//! Marker protocol for generated regions.
//!
//! Every line the patcher writes into a script carries one of these
//! sentinels, so a later removal pass can find and reverse it:
//!
//! - [`LINE`]: suffix on a single generated line.
//! - [`BLOCK_START`] / [`BLOCK_END`]: suffixes on the first and last line of
//!   a generated block. Everything in between belongs to the block.
//! - [`COMMENTED`]: suffix on a comment-prefixed copy of an original line
//!   the patcher disabled. [`decode_commented`] restores it byte-for-byte.
//!
//! Markers are matched by suffix after trimming trailing whitespace, so an
//! editor that re-indents or appends spaces does not orphan a region.

/// Suffix on a single generated line.
pub const LINE: &str = "-- FS-GENERATED";
/// Suffix on the line opening a generated block.
pub const BLOCK_START: &str = "-- FS-GENERATED-START";
/// Suffix on the line closing a generated block.
pub const BLOCK_END: &str = "-- FS-GENERATED-END";
/// Suffix on an original line the patcher commented out.
pub const COMMENTED: &str = "-- FS-GENERATED-COMMENTED";

/// Script comment prefix used to disable an original line.
pub const COMMENT_PREFIX: &str = "--";

/// Classification of a single line against the marker protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Line,
    BlockStart,
    BlockEnd,
    Commented,
    None,
}

/// Classify a line by its trailing marker.
pub fn classify(line: &str) -> MarkerKind {
    let trimmed = line.trim_end();
    // LINE is a prefix of the other three markers, but a line ending with
    // "-START" never ends with LINE, so the checks are disjoint.
    if trimmed.ends_with(BLOCK_START) {
        MarkerKind::BlockStart
    } else if trimmed.ends_with(BLOCK_END) {
        MarkerKind::BlockEnd
    } else if trimmed.ends_with(COMMENTED) {
        MarkerKind::Commented
    } else if trimmed.ends_with(LINE) {
        MarkerKind::Line
    } else {
        MarkerKind::None
    }
}

/// Tag a single generated line.
pub fn tag_line(line: &str) -> String {
    format!("{line} {LINE}")
}

/// Wrap generated lines in a block-start/block-end pair.
pub fn wrap_block<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut block = vec![BLOCK_START.to_string()];
    block.extend(lines.into_iter().map(Into::into));
    block.push(BLOCK_END.to_string());
    block
}

/// Disable an original line, keeping enough information to restore it.
pub fn encode_commented(original: &str) -> String {
    format!("{COMMENT_PREFIX}{original} {COMMENTED}")
}

/// Restore an original line from its commented encoding.
///
/// Returns `None` if the line does not carry the commented encoding.
pub fn decode_commented(line: &str) -> Option<String> {
    let suffix = format!(" {COMMENTED}");
    let body = line
        .strip_suffix(suffix.as_str())
        .or_else(|| line.trim_end().strip_suffix(suffix.as_str()))?;
    body.strip_prefix(COMMENT_PREFIX).map(str::to_string)
}
