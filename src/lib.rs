//! Yell Patcher: chat announcements for boss-mod scripts
//!
//! Injects generated code into encounter scripts so that timer expiries and
//! combat events are announced in chat, and removes it again without a
//! trace.
//!
//! # Architecture
//!
//! Every generated line carries a marker ([`marker`]). Processing a file is
//! always the same pipeline: strip everything previously generated
//! ([`scanner`]), locate anchors in the clean text ([`anchor`]), render
//! fragments ([`codegen`]) and merge them in as line edits ([`inject`]).
//! Because injection starts from the clean baseline, applying the same
//! definition twice yields the same file.
//!
//! # Safety
//!
//! - Malformed generated regions abort the file before anything is written
//! - Atomic file writes (tempfile + fsync + rename), only when content changed
//! - Add-on root boundary enforcement
//! - Line endings and trailing newline preserved
//!
//! # Example
//!
//! ```no_run
//! use yell_patcher::{apply_definitions, load_from_path, AddonGuard};
//!
//! let config = load_from_path("config.json")?;
//! let guard = AddonGuard::new("/path/to/Interface/Addons")?;
//!
//! for (file, result) in apply_definitions(&config, &guard, false) {
//!     match result {
//!         Ok(report) => println!("{file}: {report}"),
//!         Err(e) => eprintln!("{file}: {e}"),
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod anchor;
pub mod codegen;
pub mod config;
pub mod edit;
pub mod inject;
pub mod marker;
pub mod safety;
pub mod scanner;

// Re-exports
pub use anchor::{AnchorIssue, AnchorSet};
pub use config::{
    apply_definitions, check_definitions, load_from_path, load_from_str, process_file,
    remove_definitions, resolve_addons_dir, ApplicationError, ConfigError, DefinitionConfig,
    EngineSettings, FileDefinition, FileReport, Mode, ValidationError,
};
pub use edit::{apply_line_edits, EditError, LineBuffer, LineEdit};
pub use inject::{inject, InjectError, Injection};
pub use safety::{AddonGuard, SafetyError};
pub use scanner::{remove_generated_code, strip_generated, ScanError, ScanSummary};
