use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;
use yell_patcher::config::{
    apply_definitions, check_definitions, load_from_path, remove_definitions, resolve_addons_dir,
    ApplicationError, DefinitionConfig, FileReport,
};
use yell_patcher::edit::LineBuffer;
use yell_patcher::safety::AddonGuard;
use yell_patcher::scanner::strip_generated;

#[derive(Parser)]
#[command(name = "yell-patcher")]
#[command(about = "Inject chat announcements into boss-mod encounter scripts", long_about = None)]
#[command(version)]
struct Cli {
    /// Log every removed and inserted line
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Definition file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Add-on root directory (overrides the environment and the definition file)
    #[arg(short, long)]
    addons_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean and re-inject generated code into every defined file
    Apply {
        #[command(flatten)]
        target: Target,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Strip all generated code from every defined file
    Remove {
        #[command(flatten)]
        target: Target,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Report generated regions found in every script under the add-on root
    Status {
        #[command(flatten)]
        target: Target,
    },

    /// Report which defined files `apply` would change
    Check {
        #[command(flatten)]
        target: Target,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Apply {
            target,
            dry_run,
            diff,
        } => cmd_apply(target, dry_run, diff),

        Commands::Remove {
            target,
            dry_run,
            diff,
        } => cmd_remove(target, dry_run, diff),

        Commands::Status { target } => cmd_status(target),

        Commands::Check { target } => cmd_check(target),
    }
}

/// Load the definition file and guard the add-on root it resolves to.
fn load_target(target: &Target) -> Result<(DefinitionConfig, AddonGuard)> {
    let config = load_from_path(&target.config)?;
    let guard = open_root(target.addons_dir.as_deref(), &config)?;
    Ok((config, guard))
}

fn open_root(explicit: Option<&Path>, config: &DefinitionConfig) -> Result<AddonGuard> {
    let root = resolve_addons_dir(explicit, config).context(
        "Could not determine the add-on directory; pass --addons-dir or set YELL_PATCHER_ADDONS_DIR",
    )?;
    AddonGuard::new(&root)
        .with_context(|| format!("Add-on directory not usable: {}", root.display()))
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => continue,
        };
        print!("{}", sign);
        if change.missing_newline() {
            println!();
        }
    }
}

#[derive(Default)]
struct Totals {
    changed: usize,
    unchanged: usize,
    warnings: usize,
    failed: usize,
}

impl Totals {
    fn print(&self, changed_label: &str) {
        println!();
        println!("{}", "Summary:".bold());
        println!("  {} {}", format!("{}", self.changed).green(), changed_label);
        println!("  {} up to date", format!("{}", self.unchanged).yellow());
        println!("  {} anchor warnings", format!("{}", self.warnings).cyan());
        println!("  {} failed", format!("{}", self.failed).red());
    }
}

fn report_results(
    results: Vec<(String, Result<FileReport, ApplicationError>)>,
    dry_run: bool,
    show_diff: bool,
) -> Totals {
    let mut totals = Totals::default();

    for (file, result) in results {
        match result {
            Ok(report) => {
                if report.changed {
                    let verb = if dry_run { "Would change" } else { "Updated" };
                    println!(
                        "{} {}: {} (-{} +{} lines)",
                        "✓".green(),
                        file,
                        verb,
                        report.removed_lines,
                        report.inserted_lines
                    );
                    totals.changed += 1;
                    if show_diff {
                        display_diff(&report.file, &report.original, &report.patched);
                    }
                } else {
                    println!("{} {}: Up to date", "⊙".yellow(), file);
                    totals.unchanged += 1;
                }

                for issue in &report.issues {
                    println!("  {} {}", "warning:".yellow(), issue);
                }
                totals.warnings += report.issues.len();
            }
            Err(e) => {
                eprintln!("{} {}: Error - {}", "✗".red(), file, e);
                totals.failed += 1;

                if let ApplicationError::Scan { .. } = &e {
                    eprintln!("  {}", "File left untouched".red());
                    eprintln!("  Fix or delete the unterminated generated block, then re-run");
                }
            }
        }
    }

    totals
}

fn cmd_apply(target: Target, dry_run: bool, show_diff: bool) -> Result<()> {
    let (config, guard) = load_target(&target)?;

    println!("Add-ons: {}", guard.root().display());
    println!("Definitions: {}", target.config.display());
    if dry_run {
        println!("{}", "[DRY RUN - showing what would be applied]".cyan());
    }
    println!();

    let results = apply_definitions(&config, &guard, dry_run);
    report_results(results, dry_run, show_diff).print("patched");

    Ok(())
}

fn cmd_remove(target: Target, dry_run: bool, show_diff: bool) -> Result<()> {
    let (config, guard) = load_target(&target)?;

    println!("Add-ons: {}", guard.root().display());
    if dry_run {
        println!("{}", "[DRY RUN - showing what would be removed]".cyan());
    }
    println!();

    let results = remove_definitions(&config, &guard, dry_run);
    report_results(results, dry_run, show_diff).print("cleaned");

    Ok(())
}

fn cmd_check(target: Target) -> Result<()> {
    let (config, guard) = load_target(&target)?;

    println!("{}", "Checking definitions...".bold());
    println!("Add-ons: {}", guard.root().display());
    println!();

    let results = check_definitions(&config, &guard);
    report_results(results, true, false).print("would change");

    Ok(())
}

fn cmd_status(target: Target) -> Result<()> {
    // The definition file is optional here; it only contributes addonsDir.
    let config = if target.config.exists() {
        load_from_path(&target.config)?
    } else {
        DefinitionConfig::default()
    };
    let guard = open_root(target.addons_dir.as_deref(), &config)?;

    println!("{}", "Generated Code Report".bold());
    println!("Add-ons: {}", guard.root().display());
    println!();

    let mut patched = Vec::new();
    let mut malformed = Vec::new();
    let mut clean = 0;

    for entry in WalkDir::new(guard.root()).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file()
            || entry.path().extension().and_then(|s| s.to_str()) != Some("lua")
        {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(guard.root())
            .unwrap_or(entry.path())
            .display()
            .to_string();
        let content = match fs::read_to_string(entry.path()) {
            Ok(content) => content,
            Err(e) => {
                malformed.push((relative, e.to_string()));
                continue;
            }
        };

        let buffer = LineBuffer::parse(&content);
        match strip_generated(buffer.lines()) {
            Ok((_, summary)) if summary.is_clean() => clean += 1,
            Ok((_, summary)) => patched.push((relative, summary)),
            Err(e) => malformed.push((relative, e.to_string())),
        }
    }

    if !patched.is_empty() {
        println!(
            "{} {} ({} files)",
            "✓".green(),
            "PATCHED".green().bold(),
            patched.len()
        );
        for (file, summary) in &patched {
            println!(
                "  - {} {}",
                file,
                format!(
                    "({} blocks, {} tagged lines, {} commented originals)",
                    summary.blocks, summary.tagged_lines, summary.restored_lines
                )
                .dimmed()
            );
        }
        println!();
    }

    if !malformed.is_empty() {
        println!(
            "{} {} ({} files)",
            "✗".red(),
            "MALFORMED".red().bold(),
            malformed.len()
        );
        for (file, reason) in &malformed {
            println!("  - {} ({})", file, reason.dimmed());
        }
        println!();
    }

    println!("{} {} clean scripts", "⊙".yellow(), clean);

    Ok(())
}
