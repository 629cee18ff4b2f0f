//! Merge and injection of generated code into a clean line buffer.
//!
//! The injector reads anchors from the clean buffer, renders fragments,
//! collects them as [`LineEdit`]s and applies them in one pass. It assumes
//! [`crate::scanner`] already removed any previous injection.

use crate::anchor::{signature_for, AnchorIssue, AnchorSet, RegistrationBlock, TimerCallKind};
use crate::codegen::{self, Yell};
use crate::config::schema::FileDefinition;
use crate::config::settings::EngineSettings;
use crate::edit::{apply_line_edits, EditError, LineEdit};
use crate::marker;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum InjectError {
    #[error("combat-start handler ('{fence}') not found; generated helpers have nowhere to go")]
    MissingFence { fence: String },

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// Result of injecting a definition into one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub lines: Vec<String>,
    /// Generated lines written, markers included
    pub inserted_lines: usize,
    pub issues: Vec<AnchorIssue>,
}

/// Inject `definition` into a clean line sequence.
pub fn inject(
    lines: Vec<String>,
    definition: &FileDefinition,
    settings: &EngineSettings,
) -> Result<Injection, InjectError> {
    if definition.is_empty() {
        return Ok(Injection {
            lines,
            inserted_lines: 0,
            issues: Vec::new(),
        });
    }

    let (anchors, mut issues) = AnchorSet::scan(&lines, definition, settings);
    let fence = anchors
        .combat_start
        .ok_or_else(|| InjectError::MissingFence {
            fence: settings.combat_start_fence.clone(),
        })?;

    let resolved_events: BTreeMap<String, BTreeMap<String, Yell>> = definition
        .event
        .iter()
        .map(|(event, spells)| {
            let yells = spells
                .iter()
                .map(|(spell, spec)| (spell.clone(), spec.resolve(spell, settings)))
                .collect();
            (event.clone(), yells)
        })
        .collect();

    let mut edits = Vec::new();
    let mut new_issues = Vec::new();

    edits.push(LineEdit::insert_before(
        fence,
        marker::wrap_block(helper_code(definition, &resolved_events, settings)),
    ));

    timer_edits(&anchors, definition, settings, &mut edits, &mut new_issues);

    if !resolved_events.is_empty() {
        match &anchors.registration {
            Some(block) => registration_edits(block, definition, &lines, settings, &mut edits),
            None => new_issues.push(AnchorIssue::missing(
                None,
                format!(
                    "event registration block ('{}'); events stay unregistered",
                    settings.registration_call
                ),
            )),
        }
        handler_edits(&anchors, &resolved_events, settings, &mut edits, &mut new_issues);
    }

    for issue in &new_issues {
        warn!("{}", issue);
    }
    issues.extend(new_issues);

    let eof = lines.len();
    let mut inserted_lines = 0;
    for edit in &edits {
        let at = edit.line().unwrap_or(eof) + 1;
        for text in &edit.payload {
            info!("Add line {} :: {}", at, text);
        }
        inserted_lines += edit.payload.len();
    }

    let lines = apply_line_edits(lines, edits)?;
    Ok(Injection {
        lines,
        inserted_lines,
        issues,
    })
}

/// Timer helpers for every declared timer, then the event dispatch table.
fn helper_code(
    definition: &FileDefinition,
    events: &BTreeMap<String, BTreeMap<String, Yell>>,
    settings: &EngineSettings,
) -> Vec<String> {
    let mut code = Vec::new();
    for (timer, spec) in &definition.premonition {
        code.extend(codegen::timer_helpers(
            timer,
            &spec.resolve(timer, settings),
            &settings.indent,
        ));
    }
    if !events.is_empty() {
        code.extend(codegen::dispatch_table(events, &settings.indent));
    }
    code
}

fn timer_edits(
    anchors: &AnchorSet,
    definition: &FileDefinition,
    settings: &EngineSettings,
    edits: &mut Vec<LineEdit>,
    issues: &mut Vec<AnchorIssue>,
) {
    for timer in definition.premonition.keys() {
        if !anchors.timer_locals.contains_key(timer) {
            issues.push(AnchorIssue::missing(
                None,
                format!("declaration of timer '{timer}' before the combat-start handler"),
            ));
        }
    }

    for call in &anchors.timer_calls {
        let Some(spec) = definition.premonition.get(&call.timer) else {
            continue;
        };
        let line = match call.kind {
            TimerCallKind::Start => {
                let target = call.target.clone().or_else(|| {
                    anchors
                        .timer_locals
                        .get(&call.timer)
                        .map(|local| local.target_seconds.clone())
                });
                let Some(target) = target else {
                    issues.push(AnchorIssue::missing(
                        Some(call.line),
                        format!("target time for timer '{}'", call.timer),
                    ));
                    continue;
                };
                codegen::schedule_call(&call.indent, &call.timer, &target, spec.lead_time(settings))
            }
            TimerCallKind::Stop => codegen::unschedule_call(&call.indent, &call.timer),
        };
        edits.push(LineEdit::insert_after(call.line, vec![line]));
    }
}

/// Merge declared spells into existing registration entries and register
/// events the block does not mention yet.
fn registration_edits(
    block: &RegistrationBlock,
    definition: &FileDefinition,
    lines: &[String],
    settings: &EngineSettings,
    edits: &mut Vec<LineEdit>,
) {
    // entry line -> (event, merged spells, needs trailing comma)
    let mut rewrites: BTreeMap<usize, (String, Vec<String>, bool)> = BTreeMap::new();
    let mut missing: Vec<(String, Vec<String>)> = Vec::new();

    for (event, spells) in &definition.event {
        let wanted: Vec<String> = if signature_for(event).registers_spells {
            spells.keys().cloned().collect()
        } else {
            Vec::new()
        };

        match block.entry(event) {
            Some(entry) => {
                let added: Vec<String> = wanted
                    .into_iter()
                    .filter(|spell| !entry.spells.contains(spell))
                    .collect();
                if !added.is_empty() {
                    let mut merged = entry.spells.clone();
                    merged.extend(added);
                    rewrites.insert(entry.line, (event.clone(), merged, entry.has_comma));
                }
            }
            None => missing.push((event.clone(), wanted)),
        }
    }

    if !missing.is_empty() {
        // The current last entry stops being last and needs a comma.
        if let Some(last) = block.last_entry().filter(|e| !e.has_comma) {
            rewrites
                .entry(last.line)
                .and_modify(|(_, _, comma)| *comma = true)
                .or_insert_with(|| (last.event.clone(), last.spells.clone(), true));
        }

        let indent = block.entry_indent().unwrap_or(settings.indent.as_str());
        let count = missing.len();
        let entries = missing.iter().enumerate().map(|(i, (event, spells))| {
            codegen::registration_line(indent, event, spells, i + 1 < count)
        });
        edits.push(LineEdit::insert_before(
            block.end_line,
            marker::wrap_block(entries),
        ));
    }

    for (line, (event, spells, comma)) in rewrites {
        let indent = block
            .entries
            .iter()
            .find(|e| e.line == line)
            .map(|e| e.indent.as_str())
            .unwrap_or(settings.indent.as_str());
        edits.push(LineEdit::replace(
            line,
            vec![
                marker::tag_line(&codegen::registration_line(indent, &event, &spells, comma)),
                marker::encode_commented(&lines[line]),
            ],
        ));
    }
}

/// Dispatch blocks in existing handlers; synthesized handlers for the rest.
fn handler_edits(
    anchors: &AnchorSet,
    events: &BTreeMap<String, BTreeMap<String, Yell>>,
    settings: &EngineSettings,
    edits: &mut Vec<LineEdit>,
    issues: &mut Vec<AnchorIssue>,
) {
    let indent = settings.indent.as_str();
    for (event, spells) in events {
        let whisper = spells.values().any(Yell::is_whisper);
        let signature = signature_for(event);

        match anchors.functions.get(event) {
            Some(function) => match signature.spell_expression(&function.params) {
                Some(expr) => edits.push(LineEdit::insert_after(
                    function.line,
                    marker::wrap_block(codegen::dispatch_block(event, &expr, whisper, indent)),
                )),
                None => issues.push(AnchorIssue::missing(
                    Some(function.line),
                    format!(
                        "spell identifier parameter #{} of handler '{event}'",
                        signature.spell_arg + 1
                    ),
                )),
            },
            None => edits.push(LineEdit::append(marker::wrap_block(
                codegen::handler_function(event, signature, whisper, indent),
            ))),
        }
    }
}
