use serde::Deserialize;
use std::path::PathBuf;

/// Engine-wide defaults and anchor strings.
///
/// Every field can be overridden from the `defaults` object of a
/// definition file; anything left out keeps the value from [`Default`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    /// Chat channel used when a spec names none
    pub channel: String,
    /// Lead time in seconds used when a timer spec names none
    pub preempt_seconds: f64,
    /// `string.format` template for timer yells, fed the lead time
    pub timer_message: String,
    /// Message for event yells
    pub event_message: String,
    /// Script expression naming the whisper destination when a spec names none
    pub whisper_target: String,
    /// Substring identifying the combat-start handler definition
    pub combat_start_fence: String,
    /// Substring identifying the event registration call
    pub registration_call: String,
    /// Indentation unit for generated code
    pub indent: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            channel: "YELL".to_string(),
            preempt_seconds: 5.0,
            timer_message: "%.0f seconds".to_string(),
            event_message: "now".to_string(),
            whisper_target: "UnitName(\"player\")".to_string(),
            combat_start_fence: "function mod:OnCombatStart(".to_string(),
            registration_call: "mod:RegisterEventsInCombat(".to_string(),
            indent: "\t".to_string(),
        }
    }
}

/// Environment variable overriding the add-on root directory.
pub const ADDONS_DIR_ENV: &str = "YELL_PATCHER_ADDONS_DIR";

/// Default add-on root: the shared Public games folder next to the
/// user's home directory.
pub fn default_addons_dir() -> Option<PathBuf> {
    let home = home::home_dir()?;
    Some(
        home.join("..")
            .join("Public")
            .join("Games")
            .join("World of Warcraft")
            .join("Interface")
            .join("Addons"),
    )
}
