pub mod applicator;
pub mod loader;
pub mod schema;
pub mod settings;

pub use applicator::{
    apply_definitions, check_definitions, process_file, remove_definitions, resolve_addons_dir,
    ApplicationError, FileReport, Mode,
};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{
    DefinitionConfig, EventSpec, FileDefinition, TimerSpec, ValidationError, ValidationIssue,
};
pub use settings::{default_addons_dir, EngineSettings, ADDONS_DIR_ENV};
