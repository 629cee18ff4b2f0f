//! Anchor discovery on a clean line buffer.
//!
//! Anchors are the fixed reference points the injector edits around:
//! timer declarations, timer Start/Stop calls, the event registration
//! block and event handler definitions. Scanning never mutates the buffer.

pub mod errors;
pub mod matcher;
pub mod signature;

pub use errors::AnchorIssue;
pub use matcher::{LineMatch, TimerCallKind};
pub use signature::{signature_for, EventSignature};

use crate::config::schema::FileDefinition;
use crate::config::settings::EngineSettings;
use matcher::{
    is_block_end, is_registration_call, match_call_line_entry, match_event_function,
    match_registration_entry, match_timer_call, match_timer_local, registration_closes_inline,
    RegistrationEntryMatch,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A timer declaration and the duration it was declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerLocal {
    pub line: usize,
    pub timer: String,
    pub target_seconds: String,
}

/// A Start or Stop call on a known timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerCall {
    pub line: usize,
    pub kind: TimerCallKind,
    pub indent: String,
    pub timer: String,
    pub target: Option<String>,
}

/// One quoted entry of the registration block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationEntry {
    pub line: usize,
    /// Text before the opening quote; includes the call for an entry on
    /// the call line
    pub indent: String,
    pub event: String,
    pub spells: Vec<String>,
    pub has_comma: bool,
}

/// The event registration block, from the call line to its closing paren.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationBlock {
    pub call_line: usize,
    pub end_line: usize,
    pub entries: Vec<RegistrationEntry>,
}

impl RegistrationBlock {
    pub fn entry(&self, event: &str) -> Option<&RegistrationEntry> {
        self.entries.iter().find(|entry| entry.event == event)
    }

    /// The entry right before the closing paren.
    pub fn last_entry(&self) -> Option<&RegistrationEntry> {
        self.entries.iter().max_by_key(|entry| entry.line)
    }

    /// Indentation of the last entry on a line of its own.
    pub fn entry_indent(&self) -> Option<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.line != self.call_line)
            .max_by_key(|entry| entry.line)
            .map(|entry| entry.indent.as_str())
    }
}

/// A handler definition for a known event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFunction {
    pub line: usize,
    pub event: String,
    pub params: Vec<String>,
}

/// Every anchor found in one file. Line indices are 0-based.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorSet {
    /// Combat-start handler definition; fence for preamble code
    pub combat_start: Option<usize>,
    pub timer_locals: BTreeMap<String, TimerLocal>,
    pub timer_calls: Vec<TimerCall>,
    pub registration: Option<RegistrationBlock>,
    pub functions: BTreeMap<String, EventFunction>,
}

enum RegistrationState {
    Searching,
    Open {
        call_line: usize,
        entries: Vec<RegistrationEntry>,
    },
    Done,
}

impl AnchorSet {
    /// Locate every anchor the definition refers to.
    ///
    /// Lines that pass a coarse filter but fail the precise pattern are
    /// returned as issues and otherwise ignored.
    pub fn scan(
        lines: &[String],
        definition: &FileDefinition,
        settings: &EngineSettings,
    ) -> (AnchorSet, Vec<AnchorIssue>) {
        let timers: Vec<&str> = definition.premonition.keys().map(String::as_str).collect();
        let events: Vec<&str> = definition.event.keys().map(String::as_str).collect();

        let mut anchors = AnchorSet::default();
        let mut issues = Vec::new();
        let mut registration = RegistrationState::Searching;

        for (idx, line) in lines.iter().enumerate() {
            if anchors.combat_start.is_none() && line.contains(&settings.combat_start_fence) {
                debug!("Combat-start fence at line {}", idx + 1);
                anchors.combat_start = Some(idx);
            }

            if anchors.combat_start.is_none() && !timers.is_empty() {
                match match_timer_local(line, timers.iter().copied()) {
                    LineMatch::Anchor(m) => {
                        debug!("Timer {} declared with {}s at line {}", m.timer, m.target_seconds, idx + 1);
                        anchors.timer_locals.entry(m.timer.clone()).or_insert(TimerLocal {
                            line: idx,
                            timer: m.timer,
                            target_seconds: m.target_seconds,
                        });
                    }
                    LineMatch::Malformed(reason) => {
                        issues.push(AnchorIssue::malformed(idx, line, reason))
                    }
                    LineMatch::NoMatch => {}
                }
            }

            if !timers.is_empty() {
                match match_timer_call(line, timers.iter().copied()) {
                    LineMatch::Anchor(m) => anchors.timer_calls.push(TimerCall {
                        line: idx,
                        kind: m.kind,
                        indent: m.indent,
                        timer: m.timer,
                        target: m.target,
                    }),
                    LineMatch::Malformed(reason) => {
                        issues.push(AnchorIssue::malformed(idx, line, reason))
                    }
                    LineMatch::NoMatch => {}
                }
            }

            if events.is_empty() {
                continue;
            }

            registration = match registration {
                RegistrationState::Searching
                    if is_registration_call(line, &settings.registration_call) =>
                {
                    if registration_closes_inline(line, &settings.registration_call) {
                        issues.push(AnchorIssue::malformed(
                            idx,
                            line,
                            "registration list closes on its opening line",
                        ));
                        RegistrationState::Done
                    } else {
                        let mut entries = Vec::new();
                        match match_call_line_entry(line, &settings.registration_call) {
                            LineMatch::Anchor(m) => push_entry(&mut entries, idx, m),
                            LineMatch::Malformed(reason) => {
                                issues.push(AnchorIssue::malformed(idx, line, reason))
                            }
                            LineMatch::NoMatch => {}
                        }
                        RegistrationState::Open {
                            call_line: idx,
                            entries,
                        }
                    }
                }
                RegistrationState::Open { call_line, entries } if is_block_end(line) => {
                    debug!(
                        "Registration block at lines {}..={} ({} entries)",
                        call_line + 1,
                        idx + 1,
                        entries.len()
                    );
                    anchors.registration = Some(RegistrationBlock {
                        call_line,
                        end_line: idx,
                        entries,
                    });
                    RegistrationState::Done
                }
                RegistrationState::Open {
                    call_line,
                    mut entries,
                } => match match_registration_entry(line) {
                    LineMatch::Anchor(m) => {
                        if entries.iter().any(|e| e.event == m.event) {
                            issues.push(AnchorIssue::malformed(
                                idx,
                                line,
                                "event registered twice; keeping the first entry",
                            ));
                        } else {
                            push_entry(&mut entries, idx, m);
                        }
                        RegistrationState::Open { call_line, entries }
                    }
                    LineMatch::NoMatch => RegistrationState::Open { call_line, entries },
                    // The list ended without a `)` line of its own.
                    LineMatch::Malformed(reason) => {
                        issues.push(AnchorIssue::malformed(
                            idx,
                            line,
                            format!(
                                "{reason}; registration block opened at line {} is abandoned",
                                call_line + 1
                            ),
                        ));
                        RegistrationState::Done
                    }
                },
                other => other,
            };

            match match_event_function(line, events.iter().copied()) {
                LineMatch::Anchor(m) => {
                    if anchors.functions.contains_key(&m.event) {
                        issues.push(AnchorIssue::malformed(
                            idx,
                            line,
                            "handler defined twice; keeping the first definition",
                        ));
                    } else {
                        anchors.functions.insert(
                            m.event.clone(),
                            EventFunction {
                                line: idx,
                                event: m.event,
                                params: m.params,
                            },
                        );
                    }
                }
                LineMatch::Malformed(reason) => issues.push(AnchorIssue::malformed(idx, line, reason)),
                LineMatch::NoMatch => {}
            }
        }

        if let RegistrationState::Open { call_line, .. } = registration {
            issues.push(AnchorIssue::missing(
                Some(call_line),
                "closing parenthesis of the event registration block",
            ));
        }

        for issue in &issues {
            warn!("{}", issue);
        }

        (anchors, issues)
    }
}

fn push_entry(entries: &mut Vec<RegistrationEntry>, line: usize, m: RegistrationEntryMatch) {
    entries.push(RegistrationEntry {
        line,
        indent: m.indent,
        event: m.event,
        spells: m.spells,
        has_comma: m.has_comma,
    });
}
