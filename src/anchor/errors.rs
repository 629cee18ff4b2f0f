use thiserror::Error;

/// A non-fatal problem found while locating anchors or resolving them.
///
/// Issues are reported and the affected anchor is skipped; the rest of the
/// file is still processed. Line numbers are 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorIssue {
    /// A line passed the coarse filter for an anchor but not its precise pattern.
    #[error("line {line}: {reason} :: {text}")]
    Malformed {
        line: usize,
        text: String,
        reason: String,
    },

    /// Something the injector needed to look up was never captured.
    #[error("{}missing anchor: {}", line_prefix(.line), .what)]
    MissingAnchor { line: Option<usize>, what: String },
}

fn line_prefix(line: &Option<usize>) -> String {
    line.map(|l| format!("line {l}: ")).unwrap_or_default()
}

impl AnchorIssue {
    pub(crate) fn malformed(idx: usize, text: &str, reason: impl Into<String>) -> Self {
        AnchorIssue::Malformed {
            line: idx + 1,
            text: text.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(idx: Option<usize>, what: impl Into<String>) -> Self {
        AnchorIssue::MissingAnchor {
            line: idx.map(|i| i + 1),
            what: what.into(),
        }
    }
}
