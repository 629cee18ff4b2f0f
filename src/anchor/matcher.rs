//! Per-line anchor matchers.
//!
//! Each matcher runs a cheap substring filter first and only then the
//! precise pattern. A line that passes the filter but fails the pattern is
//! [`LineMatch::Malformed`], so the caller can report it instead of
//! silently skipping it.

use regex::Regex;
use std::sync::LazyLock;

static TIMER_LOCAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*local\s+(\w+)[^=]*=\s*[\w.:]+\(\s*(\d+(?:\.\d+)?)\s*[,)]")
        .expect("timer local regex must compile")
});

static TIMER_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([ \t]*)(\w+):(Start|Stop)\((.*)$").expect("timer call regex must compile")
});

static REGISTRATION_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([ \t]*)"(\w+)((?:[ \t]+[^\s"]+)*)[ \t]*"[ \t]*(,?)\s*(?:--.*)?$"#)
        .expect("registration entry regex must compile")
});

static EVENT_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^function\s+mod[:.](\w+)\s*\(([^)]*)\)").expect("event function regex must compile")
});

/// Outcome of matching one line against one anchor pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch<T> {
    Anchor(T),
    NoMatch,
    Malformed(String),
}

/// `local <timer> = mod:NewXTimer(<seconds>, ...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerLocalMatch {
    pub timer: String,
    pub target_seconds: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCallKind {
    Start,
    Stop,
}

/// `<indent><timer>:Start(<target>?, ...)` or `<indent><timer>:Stop(...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerCallMatch {
    pub kind: TimerCallKind,
    pub indent: String,
    pub timer: String,
    /// Explicit first argument of a Start call, if any
    pub target: Option<String>,
}

/// `<indent>"<event> <spell> <spell>...",`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationEntryMatch {
    pub indent: String,
    pub event: String,
    pub spells: Vec<String>,
    pub has_comma: bool,
}

/// `function mod:<event>(<params>)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFunctionMatch {
    pub event: String,
    pub params: Vec<String>,
}

/// Whether `name` occurs in `line` as a whole word.
fn contains_word(line: &str, name: &str) -> bool {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    line.match_indices(name).any(|(pos, _)| {
        let before = line[..pos].chars().next_back();
        let after = line[pos + name.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Match a timer declaration for one of `timers`.
pub fn match_timer_local<'a, I>(line: &str, timers: I) -> LineMatch<TimerLocalMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    let timers: Vec<&str> = timers.into_iter().collect();
    let mentioned = line.contains("local")
        && timers
            .iter()
            .any(|timer| contains_word(line, &format!("local {timer}")));
    if !mentioned {
        return LineMatch::NoMatch;
    }

    match TIMER_LOCAL.captures(line) {
        Some(caps) if timers.contains(&&caps[1]) => LineMatch::Anchor(TimerLocalMatch {
            timer: caps[1].to_string(),
            target_seconds: caps[2].to_string(),
        }),
        Some(_) => LineMatch::Malformed("timer is not the declared local".to_string()),
        None => LineMatch::Malformed(
            "timer declaration without a numeric duration as first argument".to_string(),
        ),
    }
}

/// Match a Start or Stop call on one of `timers`.
pub fn match_timer_call<'a, I>(line: &str, timers: I) -> LineMatch<TimerCallMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    let timers: Vec<&str> = timers.into_iter().collect();
    let mentioned = timers.iter().any(|timer| {
        line.contains(&format!("{timer}:Start(")) || line.contains(&format!("{timer}:Stop("))
    });
    if !mentioned {
        return LineMatch::NoMatch;
    }

    let Some(caps) = TIMER_CALL.captures(line) else {
        return LineMatch::Malformed("timer call is not the first statement on its line".to_string());
    };
    if !timers.contains(&&caps[2]) {
        // Longer identifier ending in a known timer name.
        return LineMatch::NoMatch;
    }

    let kind = if &caps[3] == "Start" {
        TimerCallKind::Start
    } else {
        TimerCallKind::Stop
    };

    let target = match kind {
        TimerCallKind::Stop => None,
        TimerCallKind::Start => match first_argument(&caps[4]) {
            Some(arg) if arg.is_empty() || arg == "nil" => None,
            Some(arg) => Some(arg),
            None => return LineMatch::Malformed("unbalanced argument list".to_string()),
        },
    };

    LineMatch::Anchor(TimerCallMatch {
        kind,
        indent: caps[1].to_string(),
        timer: caps[2].to_string(),
        target,
    })
}

/// Byte offset of the first delimiter accepted by `stop` that sits outside
/// any string literal and at bracket depth 0.
fn top_level_position(rest: &str, stop: impl Fn(char) -> bool) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (pos, c) in rest.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' if depth > 0 => depth -= 1,
            _ if depth == 0 && stop(c) => return Some(pos),
            _ => {}
        }
    }
    None
}

/// Extract the first argument from the text following an opening paren.
///
/// Returns `None` if the argument list is never closed on this line.
pub fn first_argument(rest: &str) -> Option<String> {
    top_level_position(rest, |c| c == ')' || c == ',').map(|pos| rest[..pos].trim().to_string())
}

/// Whether `line` opens the registration block.
pub fn is_registration_call(line: &str, call: &str) -> bool {
    line.contains(call)
}

/// Whether the registration call on `line` also closes its argument list.
pub fn registration_closes_inline(line: &str, call: &str) -> bool {
    line.find(call)
        .is_some_and(|pos| top_level_position(&line[pos + call.len()..], |c| c == ')').is_some())
}

/// Match an entry written on the registration call line itself, as in
/// `mod:RegisterEventsInCombat("SPELL_CAST_START 1",`.
///
/// The returned `indent` holds everything before the opening quote, call
/// included, so a rewritten entry keeps the call.
pub fn match_call_line_entry(line: &str, call: &str) -> LineMatch<RegistrationEntryMatch> {
    let Some(pos) = line.find(call) else {
        return LineMatch::NoMatch;
    };
    let (head, rest) = line.split_at(pos + call.len());
    match match_registration_entry(rest) {
        LineMatch::Anchor(mut m) => {
            m.indent = format!("{head}{}", m.indent);
            LineMatch::Anchor(m)
        }
        other => other,
    }
}

/// Whether `line` closes the registration block.
pub fn is_block_end(line: &str) -> bool {
    line.trim_start().starts_with(')')
}

/// Match one entry inside the registration block.
///
/// Blank lines and comment lines are not entries.
pub fn match_registration_entry(line: &str) -> LineMatch<RegistrationEntryMatch> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("--") {
        return LineMatch::NoMatch;
    }

    match REGISTRATION_ENTRY.captures(line) {
        Some(caps) => LineMatch::Anchor(RegistrationEntryMatch {
            indent: caps[1].to_string(),
            event: caps[2].to_string(),
            spells: caps[3].split_whitespace().map(str::to_string).collect(),
            has_comma: !caps[4].is_empty(),
        }),
        None => LineMatch::Malformed(
            "registration entry is not a quoted \"EVENT spell...\" string".to_string(),
        ),
    }
}

/// Match a handler definition for one of `events`.
pub fn match_event_function<'a, I>(line: &str, events: I) -> LineMatch<EventFunctionMatch>
where
    I: IntoIterator<Item = &'a str>,
{
    if !line.starts_with("function") {
        return LineMatch::NoMatch;
    }
    let events: Vec<&str> = events.into_iter().collect();
    let mentioned = events.iter().any(|event| {
        line.contains(&format!(":{event}(")) || line.contains(&format!(".{event}("))
    });
    if !mentioned {
        return LineMatch::NoMatch;
    }

    match EVENT_FUNCTION.captures(line) {
        Some(caps) if events.contains(&&caps[1]) => LineMatch::Anchor(EventFunctionMatch {
            event: caps[1].to_string(),
            params: caps[2]
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }),
        Some(_) => LineMatch::NoMatch,
        None => LineMatch::Malformed("handler definition without a parameter list".to_string()),
    }
}
