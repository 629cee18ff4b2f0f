//! Definition applicator - cleans and re-injects every file a definition names
//!
//! Each file is read once, stripped of previously generated code, optionally
//! injected with fresh code, and written back atomically only when its
//! content actually changed. Results are reported per file.

use crate::anchor::AnchorIssue;
use crate::config::schema::{DefinitionConfig, FileDefinition};
use crate::config::settings::EngineSettings;
use crate::edit::{content_hash, write_verified, EditError, LineBuffer};
use crate::inject::{inject, InjectError};
use crate::safety::{AddonGuard, SafetyError};
use crate::scanner::{remove_generated_code, ScanError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What to do with each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Clean, then inject the file's definition
    Apply,
    /// Clean only
    Remove,
    /// Compute what `Apply` would do without writing
    Check,
}

/// Outcome of processing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "FileReport should be checked for changes and issues"]
pub struct FileReport {
    pub file: PathBuf,
    /// Patched content differs from what is on disk
    pub changed: bool,
    /// The patched content was written to disk
    pub written: bool,
    pub removed_lines: usize,
    pub restored_lines: usize,
    pub inserted_lines: usize,
    pub issues: Vec<AnchorIssue>,
    pub original: String,
    pub patched: String,
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.changed {
            return write!(f, "Up to date: {}", self.file.display());
        }
        write!(
            f,
            "{} {} (-{} +{} lines, {} restored)",
            if self.written { "Patched" } else { "Would patch" },
            self.file.display(),
            self.removed_lines,
            self.inserted_lines,
            self.restored_lines
        )
    }
}

/// Errors that stop one file from being processed
#[derive(Debug)]
pub enum ApplicationError {
    /// Target path failed the add-on root check
    Path { file: String, source: SafetyError },
    /// File I/O error
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Previously generated code is malformed; the file is left untouched
    Scan { path: PathBuf, source: ScanError },
    /// Injection could not proceed
    Inject { path: PathBuf, source: InjectError },
    /// Writing the result failed
    Edit { path: PathBuf, source: EditError },
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Path { file, source } => {
                write!(f, "invalid target {}: {}", file, source)
            }
            ApplicationError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            ApplicationError::Scan { path, source } => {
                write!(f, "cannot clean {}: {}", path.display(), source)
            }
            ApplicationError::Inject { path, source } => {
                write!(f, "cannot inject into {}: {}", path.display(), source)
            }
            ApplicationError::Edit { path, source } => {
                write!(f, "edit error on {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Path { source, .. } => Some(source),
            ApplicationError::Io { source, .. } => Some(source),
            ApplicationError::Scan { source, .. } => Some(source),
            ApplicationError::Inject { source, .. } => Some(source),
            ApplicationError::Edit { source, .. } => Some(source),
        }
    }
}

/// Process a single file relative to the guard's root.
///
/// `dry_run` suppresses the write for `Apply` and `Remove`; `Check` never
/// writes.
pub fn process_file(
    guard: &AddonGuard,
    file: &str,
    definition: &FileDefinition,
    settings: &EngineSettings,
    mode: Mode,
    dry_run: bool,
) -> Result<FileReport, ApplicationError> {
    let path = guard
        .validate_path(file)
        .map_err(|source| ApplicationError::Path {
            file: file.to_string(),
            source,
        })?;
    debug!("Processing {} ({:?})", path.display(), mode);

    let original = fs::read_to_string(&path).map_err(|source| ApplicationError::Io {
        path: path.clone(),
        source,
    })?;

    let mut buffer = LineBuffer::parse(&original);
    let summary = remove_generated_code(&mut buffer).map_err(|source| ApplicationError::Scan {
        path: path.clone(),
        source,
    })?;

    let (inserted_lines, issues) = match mode {
        Mode::Remove => (0, Vec::new()),
        Mode::Apply | Mode::Check => {
            let injection = inject(buffer.lines().to_vec(), definition, settings).map_err(
                |source| ApplicationError::Inject {
                    path: path.clone(),
                    source,
                },
            )?;
            buffer.replace_lines(injection.lines);
            (injection.inserted_lines, injection.issues)
        }
    };

    let patched = buffer.serialize();
    let changed = patched != original;
    let written = if changed && !dry_run && mode != Mode::Check {
        let path = guard
            .revalidate(&path)
            .map_err(|source| ApplicationError::Path {
                file: file.to_string(),
                source,
            })?;
        write_verified(&path, content_hash(&original), &patched).map_err(|source| {
            ApplicationError::Edit {
                path: path.clone(),
                source,
            }
        })?;
        true
    } else {
        false
    };
    if written {
        info!("Wrote {}", path.display());
    }

    Ok(FileReport {
        file: path,
        changed,
        written,
        removed_lines: summary.removed_lines,
        restored_lines: summary.restored_lines,
        inserted_lines,
        issues,
        original,
        patched,
    })
}

/// Clean and inject every file in `config`.
pub fn apply_definitions(
    config: &DefinitionConfig,
    guard: &AddonGuard,
    dry_run: bool,
) -> Vec<(String, Result<FileReport, ApplicationError>)> {
    run(config, guard, Mode::Apply, dry_run)
}

/// Strip generated code from every file in `config`.
pub fn remove_definitions(
    config: &DefinitionConfig,
    guard: &AddonGuard,
    dry_run: bool,
) -> Vec<(String, Result<FileReport, ApplicationError>)> {
    run(config, guard, Mode::Remove, dry_run)
}

/// Report what `apply_definitions` would change, without writing.
pub fn check_definitions(
    config: &DefinitionConfig,
    guard: &AddonGuard,
) -> Vec<(String, Result<FileReport, ApplicationError>)> {
    run(config, guard, Mode::Check, true)
}

fn run(
    config: &DefinitionConfig,
    guard: &AddonGuard,
    mode: Mode,
    dry_run: bool,
) -> Vec<(String, Result<FileReport, ApplicationError>)> {
    if config.files.is_empty() {
        warn!("Definition names no files; nothing to do");
    }
    config
        .files
        .iter()
        .map(|(file, definition)| {
            let result = process_file(guard, file, definition, &config.defaults, mode, dry_run);
            (file.clone(), result)
        })
        .collect()
}

/// Resolve the add-on root: explicit value, environment, definition file,
/// then the per-user default.
pub fn resolve_addons_dir(explicit: Option<&Path>, config: &DefinitionConfig) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(crate::config::settings::ADDONS_DIR_ENV) {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir));
        }
    }
    if let Some(dir) = config.addons_dir.as_deref().filter(|d| !d.trim().is_empty()) {
        return Some(PathBuf::from(dir));
    }
    crate::config::settings::default_addons_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::load_from_str;
    use crate::marker;

    const GRUUL: &str = "local mod = DBM:NewMod(\"Gruul\", \"DBM-Gruul\")\n\
local timerGroundSlam = mod:NewCDTimer(74, 33525)\n\
function mod:OnCombatStart(delay)\n\
\ttimerGroundSlam:Start()\n\
end\n";

    const CONFIG: &str = r#"{
        "files": {
            "DBM-Gruul/Gruul.lua": {
                "premonition": { "timerGroundSlam": { "preemptSeconds": 5 } }
            }
        }
    }"#;

    fn setup(content: &str) -> (tempfile::TempDir, AddonGuard, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("DBM-Gruul/Gruul.lua");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, content).unwrap();
        let guard = AddonGuard::new(dir.path()).unwrap();
        (dir, guard, file)
    }

    #[test]
    fn apply_then_remove_restores_file() {
        let (_dir, guard, file) = setup(GRUUL);
        let config = load_from_str(CONFIG).unwrap();

        let results = apply_definitions(&config, &guard, false);
        let report = results[0].1.as_ref().unwrap();
        assert!(report.written);
        let patched = fs::read_to_string(&file).unwrap();
        assert!(patched.contains("\tfs_set_timerGroundSlam(self, 74, 5) -- FS-GENERATED\n"));
        assert!(patched.ends_with("end\n"));

        // Second apply finds nothing to do.
        let again = apply_definitions(&config, &guard, false);
        assert!(!again[0].1.as_ref().unwrap().changed);

        let removed = remove_definitions(&config, &guard, false);
        assert!(removed[0].1.as_ref().unwrap().written);
        assert_eq!(fs::read_to_string(&file).unwrap(), GRUUL);
    }

    #[test]
    fn check_and_dry_run_do_not_write() {
        let (_dir, guard, file) = setup(GRUUL);
        let config = load_from_str(CONFIG).unwrap();

        let report = check_definitions(&config, &guard).remove(0).1.unwrap();
        assert!(report.changed);
        assert!(!report.written);

        let report = apply_definitions(&config, &guard, true).remove(0).1.unwrap();
        assert!(report.changed && !report.written);
        assert_eq!(fs::read_to_string(&file).unwrap(), GRUUL);
    }

    #[test]
    fn malformed_region_leaves_file_untouched() {
        let content = format!("{GRUUL}{}\nleftover\n", marker::BLOCK_START);
        let (_dir, guard, file) = setup(&content);
        let config = load_from_str(CONFIG).unwrap();

        let results = apply_definitions(&config, &guard, false);
        assert!(matches!(
            results[0].1,
            Err(ApplicationError::Scan {
                source: ScanError::MalformedRegion { line: 6 },
                ..
            })
        ));
        assert_eq!(fs::read_to_string(&file).unwrap(), content);
    }

    #[test]
    fn missing_target_is_reported_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let guard = AddonGuard::new(dir.path()).unwrap();
        let config = load_from_str(CONFIG).unwrap();

        let results = apply_definitions(&config, &guard, false);
        assert_eq!(results[0].0, "DBM-Gruul/Gruul.lua");
        assert!(matches!(results[0].1, Err(ApplicationError::Path { .. })));
    }

    #[test]
    fn definition_without_files_is_a_no_op() {
        let (_dir, guard, file) = setup(GRUUL);
        let config = load_from_str(r#"{ "files": {} }"#).unwrap();

        assert!(apply_definitions(&config, &guard, false).is_empty());
        assert!(remove_definitions(&config, &guard, false).is_empty());
        assert_eq!(fs::read_to_string(&file).unwrap(), GRUUL);
    }

    #[test]
    fn crlf_files_keep_their_line_endings() {
        let crlf = GRUUL.replace('\n', "\r\n");
        let (_dir, guard, file) = setup(&crlf);
        let config = load_from_str(CONFIG).unwrap();

        let _ = apply_definitions(&config, &guard, false);
        let patched = fs::read_to_string(&file).unwrap();
        assert!(patched.contains("-- FS-GENERATED\r\n"));
        assert!(!patched.replace("\r\n", "").contains('\n'));

        let _ = remove_definitions(&config, &guard, false);
        assert_eq!(fs::read_to_string(&file).unwrap(), crlf);
    }

    #[test]
    fn explicit_addons_dir_wins() {
        let config = DefinitionConfig {
            addons_dir: Some("/from/config".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_addons_dir(Some(Path::new("/explicit")), &config),
            Some(PathBuf::from("/explicit"))
        );
    }
}
