//! Rendering of generated script fragments.
//!
//! Everything here is a pure function from resolved specs and captured
//! anchor data to lines of script text. Wrapping in markers is left to the
//! injector, except for the single-line calls which are always tagged.

use crate::anchor::EventSignature;
use crate::config::settings::EngineSettings;
use crate::marker;
use std::collections::BTreeMap;

/// Name of the generated event -> spell -> yell table.
pub const DISPATCH_TABLE: &str = "fs_event_yells";

/// A fully resolved chat announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Yell {
    pub message: String,
    pub channel: String,
    /// Script expression naming the whisper destination; set only for whispers
    pub target: Option<String>,
}

impl Yell {
    pub fn new(
        message: String,
        channel: Option<&str>,
        target: Option<&str>,
        settings: &EngineSettings,
    ) -> Self {
        let channel = channel.unwrap_or(&settings.channel).trim().to_string();
        let target = if is_whisper(&channel) {
            Some(
                target
                    .map(lua_string)
                    .unwrap_or_else(|| settings.whisper_target.clone()),
            )
        } else {
            None
        };
        Self {
            message,
            channel,
            target,
        }
    }

    pub fn is_whisper(&self) -> bool {
        self.target.is_some()
    }
}

fn is_whisper(channel: &str) -> bool {
    channel.eq_ignore_ascii_case("WHISPER")
}

/// Quote `s` as a script string literal.
pub fn lua_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `SendChatMessage(...)` for a message expression on the yell's channel.
///
/// Whispers carry the destination as fourth argument.
pub fn send_expression(message_expr: &str, yell: &Yell) -> String {
    match &yell.target {
        Some(target) => format!(
            "SendChatMessage({message_expr}, {}, nil, {target})",
            lua_string(&yell.channel)
        ),
        None => format!("SendChatMessage({message_expr}, {})", lua_string(&yell.channel)),
    }
}

fn yell_fn(timer: &str) -> String {
    format!("fs_yell_{timer}")
}

/// Helper trio for one timer: the yell itself, and the functions that
/// schedule and unschedule it relative to the timer's target time.
pub fn timer_helpers(timer: &str, yell: &Yell, indent: &str) -> Vec<String> {
    let yell_fn = yell_fn(timer);
    let message = format!("string.format({}, preemptTime)", lua_string(&yell.message));
    vec![
        format!("local function {yell_fn}(preemptTime)"),
        format!("{indent}{}", send_expression(&message, yell)),
        "end".to_string(),
        format!("local function fs_set_{timer}(self, targetTime, preemptTime)"),
        format!("{indent}self:Schedule(targetTime-preemptTime, {yell_fn}, preemptTime)"),
        "end".to_string(),
        format!("local function fs_unset_{timer}(self)"),
        format!("{indent}self:Unschedule({yell_fn})"),
        "end".to_string(),
    ]
}

/// Format a lead time without a trailing `.0` for whole seconds.
pub fn format_seconds(seconds: f64) -> String {
    format!("{seconds}")
}

/// Tagged call scheduling a timer's yell, placed after its Start call.
pub fn schedule_call(indent: &str, timer: &str, target_seconds: &str, lead: f64) -> String {
    marker::tag_line(&format!(
        "{indent}fs_set_{timer}(self, {target_seconds}, {})",
        format_seconds(lead)
    ))
}

/// Tagged call cancelling a timer's yell, placed after its Stop call.
pub fn unschedule_call(indent: &str, timer: &str) -> String {
    marker::tag_line(&format!("{indent}fs_unset_{timer}(self)"))
}

fn spell_key(spell: &str) -> String {
    if !spell.is_empty() && spell.chars().all(|c| c.is_ascii_digit()) {
        format!("[{spell}]")
    } else {
        format!("[{}]", lua_string(spell))
    }
}

/// Nested table literal covering every declared event and spell.
pub fn dispatch_table(events: &BTreeMap<String, BTreeMap<String, Yell>>, indent: &str) -> Vec<String> {
    let mut lines = vec![format!("local {DISPATCH_TABLE} = {{")];
    for (event, spells) in events {
        lines.push(format!("{indent}[{}] = {{", lua_string(event)));
        for (spell, yell) in spells {
            let mut fields = vec![lua_string(&yell.message), lua_string(&yell.channel)];
            if let Some(target) = &yell.target {
                fields.push(target.clone());
            }
            lines.push(format!(
                "{indent}{indent}{} = {{ {} }},",
                spell_key(spell),
                fields.join(", ")
            ));
        }
        lines.push(format!("{indent}}},"));
    }
    lines.push("}".to_string());
    lines
}

/// Lookup-and-send snippet for the body of an event handler.
///
/// `whisper` selects the send form carrying a destination; it is set when
/// any spell under the event is announced by whisper.
pub fn dispatch_block(event: &str, spell_expr: &str, whisper: bool, indent: &str) -> Vec<String> {
    let send = if whisper {
        "SendChatMessage(fs_yell[1], fs_yell[2], nil, fs_yell[3])"
    } else {
        "SendChatMessage(fs_yell[1], fs_yell[2])"
    };
    vec![
        format!(
            "{indent}local fs_yell = {DISPATCH_TABLE}[{}][{spell_expr}]",
            lua_string(event)
        ),
        format!("{indent}if fs_yell then"),
        format!("{indent}{indent}{send}"),
        format!("{indent}end"),
    ]
}

/// A complete handler for an event the script does not handle yet.
pub fn handler_function(
    event: &str,
    signature: &EventSignature,
    whisper: bool,
    indent: &str,
) -> Vec<String> {
    let mut lines = vec![format!(
        "function mod:{event}({})",
        signature.params.join(", ")
    )];
    lines.extend(dispatch_block(
        event,
        &signature.default_spell_expression(),
        whisper,
        indent,
    ));
    lines.push("end".to_string());
    lines
}

/// One quoted entry of the registration block, without marker.
pub fn registration_line(indent: &str, event: &str, spells: &[String], comma: bool) -> String {
    let mut body = event.to_string();
    for spell in spells {
        body.push(' ');
        body.push_str(spell);
    }
    format!("{indent}\"{body}\"{}", if comma { "," } else { "" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::signature_for;

    fn yell(channel: &str) -> Yell {
        Yell::new(
            "[x] now".to_string(),
            Some(channel),
            None,
            &EngineSettings::default(),
        )
    }

    #[test]
    fn whisper_send_carries_destination() {
        let whisper = yell("WHISPER");
        assert_eq!(
            send_expression("msg", &whisper),
            "SendChatMessage(msg, \"WHISPER\", nil, UnitName(\"player\"))"
        );

        let targeted = Yell::new(
            "m".to_string(),
            Some("whisper"),
            Some("Healer"),
            &EngineSettings::default(),
        );
        assert!(send_expression("msg", &targeted).ends_with("nil, \"Healer\")"));
    }

    #[test]
    fn other_channels_have_no_destination() {
        for channel in ["YELL", "SAY", "RAID"] {
            let y = yell(channel);
            assert!(!y.is_whisper());
            assert_eq!(
                send_expression("msg", &y),
                format!("SendChatMessage(msg, \"{channel}\")")
            );
        }
    }

    #[test]
    fn timer_helpers_shape() {
        let lines = timer_helpers("T1", &yell("YELL"), "\t");
        assert_eq!(lines[0], "local function fs_yell_T1(preemptTime)");
        assert_eq!(
            lines[1],
            "\tSendChatMessage(string.format(\"[x] now\", preemptTime), \"YELL\")"
        );
        assert_eq!(
            lines[4],
            "\tself:Schedule(targetTime-preemptTime, fs_yell_T1, preemptTime)"
        );
        assert_eq!(lines[7], "\tself:Unschedule(fs_yell_T1)");
    }

    #[test]
    fn schedule_calls_are_tagged() {
        assert_eq!(
            schedule_call("\t", "T1", "30", 5.0),
            "\tfs_set_T1(self, 30, 5) -- FS-GENERATED"
        );
        assert_eq!(
            schedule_call("", "T1", "40-delay", 2.5),
            "fs_set_T1(self, 40-delay, 2.5) -- FS-GENERATED"
        );
        assert_eq!(unschedule_call("  ", "T1"), "  fs_unset_T1(self) -- FS-GENERATED");
    }

    #[test]
    fn dispatch_table_covers_every_spell() {
        let mut events = BTreeMap::new();
        let mut spells = BTreeMap::new();
        spells.insert("36240".to_string(), yell("YELL"));
        spells.insert("boss1".to_string(), yell("WHISPER"));
        events.insert("SPELL_CAST_START".to_string(), spells);

        let lines = dispatch_table(&events, "\t");
        assert_eq!(
            lines,
            vec![
                "local fs_event_yells = {".to_string(),
                "\t[\"SPELL_CAST_START\"] = {".to_string(),
                "\t\t[36240] = { \"[x] now\", \"YELL\" },".to_string(),
                "\t\t[\"boss1\"] = { \"[x] now\", \"WHISPER\", UnitName(\"player\") },".to_string(),
                "\t},".to_string(),
                "}".to_string(),
            ]
        );
    }

    #[test]
    fn handler_function_uses_signature() {
        let lines = handler_function(
            "UNIT_SPELLCAST_SUCCEEDED",
            signature_for("UNIT_SPELLCAST_SUCCEEDED"),
            false,
            "\t",
        );
        assert_eq!(lines[0], "function mod:UNIT_SPELLCAST_SUCCEEDED(uId, _, spellId)");
        assert_eq!(
            lines[1],
            "\tlocal fs_yell = fs_event_yells[\"UNIT_SPELLCAST_SUCCEEDED\"][spellId]"
        );
        assert_eq!(lines.last().map(String::as_str), Some("end"));
    }

    #[test]
    fn lua_string_escapes() {
        assert_eq!(lua_string(r#"a "b" \c"#), r#""a \"b\" \\c""#);
    }

    #[test]
    fn registration_line_formats() {
        let spells = vec!["1".to_string(), "2".to_string()];
        assert_eq!(
            registration_line("\t", "SPELL_CAST_START", &spells, true),
            "\t\"SPELL_CAST_START 1 2\","
        );
        assert_eq!(registration_line("\t", "UNIT_DIED", &[], false), "\t\"UNIT_DIED\"");
    }
}
