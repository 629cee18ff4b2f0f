//! Integration tests for definition loading and per-file application
//!
//! Tests JSON parsing, validation, add-on root handling and full
//! apply/remove cycles against a temporary add-on directory.

use yell_patcher::config::{
    apply_definitions, check_definitions, load_from_path, load_from_str, remove_definitions,
    ApplicationError, ConfigError, ValidationIssue,
};
use yell_patcher::marker;
use yell_patcher::safety::{AddonGuard, SafetyError};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const GRUUL: &str = include_str!("fixtures/gruul.lua");

const DEFINITION: &str = r#"{
    "defaults": { "channel": "SAY", "preemptSeconds": 4 },
    "files": {
        "DBM-Gruul/Gruul.lua": {
            "premonition": { "timerShatterCD": {} },
            "event": { "SPELL_CAST_START": { "36240": { "message": "Cave in!" } } }
        },
        "DBM-Gruul/Maulgar.lua": {}
    }
}"#;

/// Helper to create an add-on root holding the fixture scripts
fn setup_addons() -> (TempDir, AddonGuard) {
    let dir = TempDir::new().unwrap();
    let gruul_dir = dir.path().join("DBM-Gruul");
    fs::create_dir_all(&gruul_dir).unwrap();
    fs::write(gruul_dir.join("Gruul.lua"), GRUUL).unwrap();
    fs::write(
        gruul_dir.join("Maulgar.lua"),
        format!(
            "local mod = DBM:NewMod(\"Maulgar\")\n{}\n",
            marker::tag_line("print(\"stale\")")
        ),
    )
    .unwrap();
    let guard = AddonGuard::new(dir.path()).unwrap();
    (dir, guard)
}

fn read(dir: &TempDir, file: &str) -> String {
    fs::read_to_string(dir.path().join(file)).unwrap()
}

#[test]
fn test_load_definition_defaults() {
    let config = load_from_str(DEFINITION).unwrap();
    assert_eq!(config.defaults.channel, "SAY");
    assert_eq!(config.defaults.preempt_seconds, 4.0);
    // Unspecified settings keep their defaults.
    assert_eq!(config.defaults.event_message, "now");
    assert_eq!(config.files.len(), 2);
    assert!(config.files["DBM-Gruul/Maulgar.lua"].is_empty());
}

#[test]
fn test_validation_collects_every_issue() {
    let err = load_from_str(
        r#"{
        "files": {
            "../escape.lua": {},
            "Ok.lua": {
                "premonition": { "bad name": { "preemptSeconds": -1 } },
                "event": { "SPELL_CAST_START": { "12 34": { "channel": " " } } }
            }
        }
    }"#,
    )
    .unwrap_err();

    let ConfigError::Validation { source, .. } = &err else {
        panic!("expected validation error, got {err}");
    };
    let issues = &source.issues;
    assert!(issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::InvalidPath { file, .. } if file == "../escape.lua")));
    assert!(issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::InvalidIdentifier { id, .. } if id == "bad name")));
    assert!(issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::InvalidLeadTime { .. })));
    assert!(issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::InvalidSpellId { spell, .. } if spell == "12 34")));
    assert!(issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::EmptyChannel { .. })));
}

#[test]
fn test_load_from_path_requires_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, DEFINITION).unwrap();
    assert!(matches!(
        load_from_path(&path),
        Err(ConfigError::Extension { .. })
    ));

    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();
    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Json { path: Some(_), .. }));
    assert!(err.to_string().contains("config.json"));
}

#[test]
fn test_apply_full_cycle() {
    let (dir, guard) = setup_addons();
    let config = load_from_str(DEFINITION).unwrap();

    let results = apply_definitions(&config, &guard, false);
    assert_eq!(results.len(), 2);
    for (file, result) in &results {
        let report = result.as_ref().unwrap();
        assert!(report.written, "{file} should have been written");
    }

    let gruul = read(&dir, "DBM-Gruul/Gruul.lua");
    assert!(gruul.contains("\t\tfs_set_timerShatterCD(self, 10, 4) -- FS-GENERATED\n"));
    assert!(gruul.contains("\"[timerShatterCD] %.0f seconds\", preemptTime), \"SAY\")"));
    assert!(gruul.contains("[36240] = { \"[36240] Cave in!\", \"SAY\" },"));

    // Empty definition: stale generated code is cleaned out.
    assert_eq!(
        read(&dir, "DBM-Gruul/Maulgar.lua"),
        "local mod = DBM:NewMod(\"Maulgar\")\n"
    );

    let again = apply_definitions(&config, &guard, false);
    assert!(again.iter().all(|(_, r)| !r.as_ref().unwrap().changed));

    let removed = remove_definitions(&config, &guard, false);
    assert!(removed[0].1.as_ref().unwrap().restored_lines == 0);
    assert_eq!(read(&dir, "DBM-Gruul/Gruul.lua"), GRUUL);
}

#[test]
fn test_check_reports_without_writing() {
    let (dir, guard) = setup_addons();
    let config = load_from_str(DEFINITION).unwrap();

    let results = check_definitions(&config, &guard);
    let report = results[0].1.as_ref().unwrap();
    assert!(report.changed);
    assert!(report.inserted_lines > 0);
    assert!(!report.written);
    assert_eq!(read(&dir, "DBM-Gruul/Gruul.lua"), GRUUL);
}

#[test]
fn test_failures_are_per_file() {
    let (dir, guard) = setup_addons();
    fs::write(
        dir.path().join("DBM-Gruul/Maulgar.lua"),
        format!("{}\nprint(1)\n", marker::BLOCK_START),
    )
    .unwrap();
    let config = load_from_str(DEFINITION).unwrap();

    let results = apply_definitions(&config, &guard, false);
    let by_file: std::collections::HashMap<_, _> = results.into_iter().collect();
    assert!(by_file["DBM-Gruul/Gruul.lua"].is_ok());
    assert!(matches!(
        by_file["DBM-Gruul/Maulgar.lua"],
        Err(ApplicationError::Scan { .. })
    ));
    // Malformed file is left exactly as it was.
    assert_eq!(
        read(&dir, "DBM-Gruul/Maulgar.lua"),
        format!("{}\nprint(1)\n", marker::BLOCK_START)
    );
}

#[test]
fn test_missing_fence_skips_file() {
    let (dir, guard) = setup_addons();
    let script = GRUUL.replace("OnCombatStart", "OnEngage");
    fs::write(dir.path().join("DBM-Gruul/Gruul.lua"), &script).unwrap();
    let config = load_from_str(DEFINITION).unwrap();

    let results = apply_definitions(&config, &guard, false);
    assert!(matches!(results[0].1, Err(ApplicationError::Inject { .. })));
    assert_eq!(read(&dir, "DBM-Gruul/Gruul.lua"), script);
}

#[test]
#[cfg(unix)]
fn test_symlink_outside_root_is_refused() {
    use std::os::unix::fs::symlink;

    let outer = TempDir::new().unwrap();
    let root = outer.path().join("Addons");
    fs::create_dir_all(root.join("DBM-Gruul")).unwrap();
    let outside: PathBuf = outer.path().join("Gruul.lua");
    fs::write(&outside, GRUUL).unwrap();
    symlink(&outside, root.join("DBM-Gruul/Gruul.lua")).unwrap();

    let guard = AddonGuard::new(&root).unwrap();
    let config = load_from_str(
        r#"{ "files": { "DBM-Gruul/Gruul.lua": { "premonition": { "timerShatterCD": {} } } } }"#,
    )
    .unwrap();
    let results = apply_definitions(&config, &guard, false);
    assert!(matches!(
        results[0].1,
        Err(ApplicationError::Path {
            source: SafetyError::OutsideRoot { .. },
            ..
        })
    ));
    assert_eq!(fs::read_to_string(&outside).unwrap(), GRUUL);
}
