//! Handler signatures per event kind.
//!
//! Combat-log handlers take a single `args` table and carry the spell
//! identifier in `args.spellId`. A few event kinds pass it positionally or
//! carry no spell identifier at all; those are listed in [`OVERRIDES`].

use crate::config::schema::is_identifier;

/// How a handler for an event receives its spell identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSignature {
    /// Parameter list used when the handler has to be synthesized
    pub params: &'static [&'static str],
    /// Position of the parameter carrying the spell identifier
    pub spell_arg: usize,
    /// Field of that parameter holding the identifier, if it is a table
    pub field: Option<&'static str>,
    /// Whether spell identifiers are listed in the event's registration string
    pub registers_spells: bool,
}

pub const DEFAULT_SIGNATURE: EventSignature = EventSignature {
    params: &["args"],
    spell_arg: 0,
    field: Some("spellId"),
    registers_spells: true,
};

const UNIT_SPELLCAST: EventSignature = EventSignature {
    params: &["uId", "_", "spellId"],
    spell_arg: 2,
    field: None,
    registers_spells: false,
};

const CHAT_MESSAGE: EventSignature = EventSignature {
    params: &["msg"],
    spell_arg: 0,
    field: None,
    registers_spells: false,
};

pub const OVERRIDES: &[(&str, EventSignature)] = &[
    ("UNIT_SPELLCAST_SUCCEEDED", UNIT_SPELLCAST),
    ("UNIT_SPELLCAST_START", UNIT_SPELLCAST),
    ("UNIT_SPELLCAST_CHANNEL_START", UNIT_SPELLCAST),
    ("UNIT_SPELLCAST_INTERRUPTED", UNIT_SPELLCAST),
    ("CHAT_MSG_MONSTER_YELL", CHAT_MESSAGE),
    ("CHAT_MSG_MONSTER_EMOTE", CHAT_MESSAGE),
    ("CHAT_MSG_RAID_BOSS_EMOTE", CHAT_MESSAGE),
    ("RAID_BOSS_EMOTE", CHAT_MESSAGE),
];

pub fn signature_for(event: &str) -> &'static EventSignature {
    OVERRIDES
        .iter()
        .find(|(name, _)| *name == event)
        .map(|(_, signature)| signature)
        .unwrap_or(&DEFAULT_SIGNATURE)
}

impl EventSignature {
    /// Expression yielding the spell identifier inside a handler with the
    /// given parameter names, or `None` if the parameter is absent or
    /// discarded (`_`).
    pub fn spell_expression<S: AsRef<str>>(&self, params: &[S]) -> Option<String> {
        let name = params.get(self.spell_arg)?.as_ref();
        if name == "_" || !is_identifier(name) {
            return None;
        }
        Some(match self.field {
            Some(field) => format!("{name}.{field}"),
            None => name.to_string(),
        })
    }

    /// Expression yielding the spell identifier in a synthesized handler.
    pub fn default_spell_expression(&self) -> String {
        self.spell_expression(self.params)
            .unwrap_or_else(|| "args.spellId".to_string())
    }
}
