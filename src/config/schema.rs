use crate::codegen::Yell;
use crate::config::settings::EngineSettings;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};

/// A parsed definition file.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionConfig {
    /// Add-on root directory; target paths are relative to it
    #[serde(default)]
    pub addons_dir: Option<String>,
    #[serde(default)]
    pub defaults: EngineSettings,
    /// Target file path -> what to inject into it
    #[serde(default)]
    pub files: BTreeMap<String, FileDefinition>,
}

impl DefinitionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.defaults.channel.trim().is_empty() {
            issues.push(ValidationIssue::EmptyChannel {
                file: None,
                id: "defaults".to_string(),
            });
        }
        if !valid_lead_time(self.defaults.preempt_seconds) {
            issues.push(ValidationIssue::InvalidLeadTime {
                file: None,
                timer: "defaults".to_string(),
                value: self.defaults.preempt_seconds,
            });
        }
        if self.defaults.combat_start_fence.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                file: None,
                field: "defaults.combatStartFence",
            });
        }
        if self.defaults.registration_call.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                file: None,
                field: "defaults.registrationCall",
            });
        }

        for (file, definition) in &self.files {
            if let Err(reason) = check_relative_path(file) {
                issues.push(ValidationIssue::InvalidPath {
                    file: file.clone(),
                    reason,
                });
            }
            definition.collect_issues(file, &mut issues);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// Everything to inject into one target file.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct FileDefinition {
    /// Timer identifier -> premonition yell
    #[serde(default)]
    pub premonition: BTreeMap<String, TimerSpec>,
    /// Event identifier -> spell identifier -> yell
    #[serde(default)]
    pub event: BTreeMap<String, BTreeMap<String, EventSpec>>,
}

impl FileDefinition {
    /// A file with an empty definition is only cleaned.
    pub fn is_empty(&self) -> bool {
        self.premonition.is_empty() && self.event.is_empty()
    }

    fn collect_issues(&self, file: &str, issues: &mut Vec<ValidationIssue>) {
        for (timer, spec) in &self.premonition {
            if !is_identifier(timer) {
                issues.push(ValidationIssue::InvalidIdentifier {
                    file: file.to_string(),
                    kind: "timer",
                    id: timer.clone(),
                });
            }
            if let Some(seconds) = spec.preempt_seconds {
                if !valid_lead_time(seconds) {
                    issues.push(ValidationIssue::InvalidLeadTime {
                        file: Some(file.to_string()),
                        timer: timer.clone(),
                        value: seconds,
                    });
                }
            }
            if spec.channel.as_deref().is_some_and(|c| c.trim().is_empty()) {
                issues.push(ValidationIssue::EmptyChannel {
                    file: Some(file.to_string()),
                    id: timer.clone(),
                });
            }
        }

        for (event, spells) in &self.event {
            if !is_identifier(event) {
                issues.push(ValidationIssue::InvalidIdentifier {
                    file: file.to_string(),
                    kind: "event",
                    id: event.clone(),
                });
            }
            for (spell, spec) in spells {
                if !is_spell_id(spell) {
                    issues.push(ValidationIssue::InvalidSpellId {
                        file: file.to_string(),
                        event: event.clone(),
                        spell: spell.clone(),
                    });
                }
                if spec.channel.as_deref().is_some_and(|c| c.trim().is_empty()) {
                    issues.push(ValidationIssue::EmptyChannel {
                        file: Some(file.to_string()),
                        id: format!("{event}/{spell}"),
                    });
                }
            }
        }
    }
}

/// Yell a fixed lead time before a timer fires.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSpec {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub full_message: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default, alias = "seconds")]
    pub preempt_seconds: Option<f64>,
    /// Whisper destination, only used on the WHISPER channel
    #[serde(default)]
    pub target: Option<String>,
}

impl TimerSpec {
    pub fn resolve(&self, timer: &str, settings: &EngineSettings) -> Yell {
        let message = self.full_message.clone().unwrap_or_else(|| {
            format!(
                "[{}] {}",
                self.alias.as_deref().unwrap_or(timer),
                self.message.as_deref().unwrap_or(&settings.timer_message)
            )
        });
        Yell::new(message, self.channel.as_deref(), self.target.as_deref(), settings)
    }

    pub fn lead_time(&self, settings: &EngineSettings) -> f64 {
        self.preempt_seconds.unwrap_or(settings.preempt_seconds)
    }
}

/// Yell when an event fires for a given spell.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventSpec {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub full_message: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

impl EventSpec {
    pub fn resolve(&self, spell: &str, settings: &EngineSettings) -> Yell {
        let message = self.full_message.clone().unwrap_or_else(|| {
            format!(
                "[{}] {}",
                self.alias.as_deref().unwrap_or(spell),
                self.message.as_deref().unwrap_or(&settings.event_message)
            )
        });
        Yell::new(message, self.channel.as_deref(), self.target.as_deref(), settings)
    }
}

/// Plain script identifier: letter or underscore, then word characters.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Spell identifiers live inside a quoted, space-separated registration
/// string, so they may not contain whitespace, quotes or backslashes.
pub fn is_spell_id(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\')
}

fn valid_lead_time(seconds: f64) -> bool {
    seconds.is_finite() && seconds >= 0.0
}

fn check_relative_path(file: &str) -> Result<(), String> {
    if file.trim().is_empty() {
        return Err("path is empty".to_string());
    }
    for component in Path::new(file).components() {
        match component {
            Component::ParentDir => return Err("path escapes the add-on root".to_string()),
            Component::RootDir | Component::Prefix(_) => {
                return Err("path must be relative to the add-on root".to_string())
            }
            _ => {}
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    MissingField {
        file: Option<String>,
        field: &'static str,
    },
    InvalidPath {
        file: String,
        reason: String,
    },
    InvalidIdentifier {
        file: String,
        kind: &'static str,
        id: String,
    },
    InvalidSpellId {
        file: String,
        event: String,
        spell: String,
    },
    InvalidLeadTime {
        file: Option<String>,
        timer: String,
        value: f64,
    },
    EmptyChannel {
        file: Option<String>,
        id: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { file, field } => match file {
                Some(file) => write!(f, "'{file}' missing required field '{field}'"),
                None => write!(f, "missing required field '{field}'"),
            },
            ValidationIssue::InvalidPath { file, reason } => {
                write!(f, "invalid target path '{file}': {reason}")
            }
            ValidationIssue::InvalidIdentifier { file, kind, id } => {
                write!(f, "'{file}': {kind} identifier '{id}' is not a plain identifier")
            }
            ValidationIssue::InvalidSpellId { file, event, spell } => write!(
                f,
                "'{file}': spell identifier '{spell}' under event '{event}' may not contain whitespace or quotes"
            ),
            ValidationIssue::InvalidLeadTime { file, timer, value } => match file {
                Some(file) => write!(f, "'{file}': timer '{timer}' has invalid lead time {value}"),
                None => write!(f, "'{timer}' has invalid lead time {value}"),
            },
            ValidationIssue::EmptyChannel { file, id } => match file {
                Some(file) => write!(f, "'{file}': '{id}' has an empty channel"),
                None => write!(f, "'{id}' has an empty channel"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_identifier("timerGroundSlam"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn spell_ids() {
        assert!(is_spell_id("36240"));
        assert!(is_spell_id("boss1"));
        assert!(!is_spell_id("36 240"));
        assert!(!is_spell_id("a\"b"));
    }

    #[test]
    fn timer_message_uses_alias_and_default_template() {
        let settings = EngineSettings::default();
        let spec = TimerSpec {
            alias: Some("Slam".to_string()),
            ..Default::default()
        };
        let yell = spec.resolve("timerGroundSlam", &settings);
        assert_eq!(yell.message, "[Slam] %.0f seconds");
        assert_eq!(yell.channel, "YELL");
        assert_eq!(spec.lead_time(&settings), 5.0);
    }

    #[test]
    fn full_message_overrides_template() {
        let settings = EngineSettings::default();
        let spec = EventSpec {
            full_message: Some("Move!".to_string()),
            message: Some("ignored".to_string()),
            ..Default::default()
        };
        assert_eq!(spec.resolve("36240", &settings).message, "Move!");
    }

    #[test]
    fn validation_collects_every_issue() {
        let config: DefinitionConfig = serde_json::from_str(
            r#"{
                "files": {
                    "../escape.lua": {},
                    "DBM-Gruul/Gruul.lua": {
                        "premonition": { "bad-id": { "seconds": -1 } },
                        "event": { "SPELL_CAST_START": { "1 2": {} } }
                    }
                }
            }"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.issues.len(), 4);
        assert!(matches!(err.issues[0], ValidationIssue::InvalidPath { .. }));
    }
}
