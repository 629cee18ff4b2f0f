//! Removal of previously generated code.
//!
//! A single forward pass over the buffer drops every generated line and
//! block and restores every commented-out original, yielding the clean
//! baseline that anchor matching and injection work from.

use crate::edit::LineBuffer;
use crate::marker::{self, MarkerKind};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// A block-start marker with no matching block-end marker.
    #[error("generated block opened at line {line} is never closed")]
    MalformedRegion { line: usize },
}

/// What a removal pass found and undid.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Lines dropped (tagged lines plus every line of every block)
    pub removed_lines: usize,
    /// Commented originals restored
    pub restored_lines: usize,
    /// Generated blocks dropped
    pub blocks: usize,
    /// Single tagged lines dropped
    pub tagged_lines: usize,
}

impl ScanSummary {
    /// Whether the scanned text carried any generated content at all.
    pub fn is_clean(&self) -> bool {
        self.removed_lines == 0 && self.restored_lines == 0
    }
}

/// Strip generated regions from a sequence of lines.
///
/// Returns the clean lines and a summary. Line numbers in errors and log
/// output are 1-based.
pub fn strip_generated(lines: &[String]) -> Result<(Vec<String>, ScanSummary), ScanError> {
    let mut out = Vec::with_capacity(lines.len());
    let mut summary = ScanSummary::default();
    let mut open_block: Option<usize> = None;

    for (idx, line) in lines.iter().enumerate() {
        if open_block.is_some() {
            info!("Remove line {} :: {}", idx + 1, line);
            summary.removed_lines += 1;
            if marker::classify(line) == MarkerKind::BlockEnd {
                open_block = None;
            }
            continue;
        }

        match marker::classify(line) {
            MarkerKind::Line => {
                info!("Remove line {} :: {}", idx + 1, line);
                summary.removed_lines += 1;
                summary.tagged_lines += 1;
            }
            MarkerKind::BlockStart => {
                info!("Remove line {} :: {}", idx + 1, line);
                summary.removed_lines += 1;
                summary.blocks += 1;
                open_block = Some(idx);
            }
            MarkerKind::Commented => match marker::decode_commented(line) {
                Some(restored) => {
                    info!("Restore line {} :: {}", idx + 1, restored);
                    summary.restored_lines += 1;
                    out.push(restored);
                }
                None => out.push(line.clone()),
            },
            MarkerKind::BlockEnd | MarkerKind::None => out.push(line.clone()),
        }
    }

    if let Some(start) = open_block {
        return Err(ScanError::MalformedRegion { line: start + 1 });
    }

    Ok((out, summary))
}

/// Remove all generated code from `buffer` in place.
///
/// On error the buffer is left untouched.
pub fn remove_generated_code(buffer: &mut LineBuffer) -> Result<ScanSummary, ScanError> {
    let (clean, summary) = strip_generated(buffer.lines())?;
    buffer.replace_lines(clean);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{encode_commented, tag_line, wrap_block};

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unmarked_file_is_unchanged() {
        let lines = owned(&["local mod = DBM:NewMod(1)", "", "function mod:OnCombatStart(delay)", "end"]);
        let (clean, summary) = strip_generated(&lines).unwrap();
        assert_eq!(clean, lines);
        assert!(summary.is_clean());
    }

    #[test]
    fn drops_tagged_lines_and_blocks() {
        let mut lines = owned(&["a"]);
        lines.extend(wrap_block(["gen1", "gen2"]));
        lines.push("b".to_string());
        lines.push(tag_line("\tgen3"));
        lines.push("c".to_string());

        let (clean, summary) = strip_generated(&lines).unwrap();
        assert_eq!(clean, owned(&["a", "b", "c"]));
        assert_eq!(summary.blocks, 1);
        assert_eq!(summary.tagged_lines, 1);
        assert_eq!(summary.removed_lines, 5);
    }

    #[test]
    fn restores_commented_originals() {
        let original = "\t\"SPELL_CAST_START 1 2\",";
        let lines = vec![
            tag_line("\t\"SPELL_CAST_START 1 2 3\","),
            encode_commented(original),
        ];
        let (clean, summary) = strip_generated(&lines).unwrap();
        assert_eq!(clean, owned(&[original]));
        assert_eq!(summary.restored_lines, 1);
    }

    #[test]
    fn markers_inside_block_are_consumed() {
        let lines = owned(&[
            "-- FS-GENERATED-START",
            "x -- FS-GENERATED",
            "--y -- FS-GENERATED-COMMENTED",
            "-- FS-GENERATED-END",
            "keep",
        ]);
        let (clean, _) = strip_generated(&lines).unwrap();
        assert_eq!(clean, owned(&["keep"]));
    }

    #[test]
    fn unterminated_block_is_reported() {
        let lines = owned(&["a", "-- FS-GENERATED-START", "b", "c"]);
        let err = strip_generated(&lines).unwrap_err();
        assert_eq!(err, ScanError::MalformedRegion { line: 2 });
    }

    #[test]
    fn failed_removal_leaves_buffer_untouched() {
        let mut buffer = LineBuffer::from_lines(["a", "-- FS-GENERATED-START", "b"]);
        let before = buffer.clone();
        assert!(remove_generated_code(&mut buffer).is_err());
        assert_eq!(buffer, before);
    }
}
