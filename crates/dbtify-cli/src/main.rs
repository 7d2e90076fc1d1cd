use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dbtify_core::{Config, ObjectType, RewriteRequest, RewriteResult, Submission};
use dbtify_dbt::{CatalogHandle, CatalogIndex};
use dbtify_sql::{rewrite_submission, ReferenceRewriter, SubmissionRewrite};

/// dbtify - Convert raw warehouse SQL into dbt models
#[derive(Parser)]
#[command(name = "dbtify")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: dbtify.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to dbt manifest.json (overrides config and DBTIFY_MANIFEST)
    #[arg(short = 'f', long, global = true)]
    manifest: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a single SQL query into a dbt model
    Rewrite {
        /// SQL file to read (stdin if omitted)
        input: Option<PathBuf>,

        /// Alias written into the config() header
        #[arg(short, long)]
        name: String,

        /// Object type: table or view (default from config)
        #[arg(short = 't', long = "type")]
        object_type: Option<ObjectType>,

        /// Write the model to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert every level of a submission document
    Convert {
        /// Submission JSON file
        submission: PathBuf,

        /// Output file for the converted levels (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the models and sources in the catalog
    Catalog,

    /// Write a default dbtify.toml
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // .env is optional
    let _ = dotenvy::dotenv();
    init_tracing(cli.verbose);

    if let Commands::Init { force } = cli.command {
        let path = cli.config.unwrap_or_else(|| PathBuf::from("dbtify.toml"));
        return init_command(&path, force);
    }

    let mut config = load_config(cli.config.as_deref(), cli.verbose)?;
    config.apply_env();
    if let Some(manifest) = &cli.manifest {
        config.manifest_path = manifest.clone();
    }

    let handle = CatalogHandle::new();
    let manifest_path = config.resolved_manifest_path();
    load_catalog(&handle, &manifest_path, cli.verbose)?;

    match cli.command {
        Commands::Rewrite { input, name, object_type, output } => {
            let object_type = object_type.unwrap_or(config.default_object_type);
            rewrite_command(&handle, input.as_deref(), &name, object_type, output.as_deref(), cli.verbose)
        }
        Commands::Convert { submission, output } => {
            convert_command(&handle, &submission, output.as_deref(), cli.verbose)
        }
        Commands::Catalog => catalog_command(&handle),
        Commands::Init { .. } => unreachable!("init runs before the catalog is loaded"),
    }
}

/// Log to stderr; RUST_LOG wins over --verbose
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    if let Some(config_path) = path {
        return Config::from_file(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()));
    }

    let default_path = Path::new("dbtify.toml");
    if default_path.exists() {
        return Config::from_file(default_path).context("Failed to load dbtify.toml");
    }

    if verbose {
        eprintln!("{}", "No config file found, using defaults".yellow());
    }
    Ok(Config::default())
}

fn load_catalog(handle: &CatalogHandle, manifest_path: &Path, verbose: bool) -> Result<()> {
    if !manifest_path.exists() {
        return Err(anyhow::anyhow!(
            "Manifest not found at {}. Run 'dbt compile' or 'dbt build' first.",
            manifest_path.display()
        ));
    }

    if verbose {
        eprintln!("{} {}", "Loading manifest from:".cyan(), manifest_path.display());
    }

    handle
        .refresh_from_manifest(manifest_path)
        .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;

    Ok(())
}

/// Rewrite command - convert one query
fn rewrite_command(
    handle: &CatalogHandle,
    input: Option<&Path>,
    name: &str,
    object_type: ObjectType,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let sql = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read SQL file {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read SQL from stdin")?;
            buffer
        }
    };

    let request = RewriteRequest::new(sql, object_type, name);
    let result = ReferenceRewriter::rewrite_published(handle, &request)?;

    if verbose {
        print_resolutions(&result);
    }

    match output {
        Some(path) => {
            std::fs::write(path, &result.rewritten_sql)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if verbose {
                eprintln!("{} {}", "Model saved to:".green(), path.display());
            }
        }
        None => println!("{}", result.rewritten_sql),
    }

    Ok(())
}

/// Convert command - rewrite all levels of a submission
fn convert_command(
    handle: &CatalogHandle,
    submission_path: &Path,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let submissions = Submission::all_from_file(submission_path)?;
    let index = handle.snapshot()?;
    let converted: Vec<SubmissionRewrite> = submissions
        .iter()
        .map(|submission| rewrite_submission(&index, submission))
        .collect();

    // a single document keeps its single-object output
    let json = match converted.as_slice() {
        [single] => serde_json::to_string_pretty(single)?,
        all => serde_json::to_string_pretty(all)?,
    };
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => println!("{}", json),
    }

    if verbose {
        for submission in &converted {
            eprintln!(
                "Converted {} levels for project {}",
                submission.levels.len(),
                submission.project_id.green()
            );
        }
    }

    let unresolved: usize = converted.iter().map(SubmissionRewrite::unresolved_count).sum();
    if unresolved > 0 {
        eprintln!(
            "{}",
            format!("⚠ {} table references had no catalog entry", unresolved).yellow()
        );
    }

    Ok(())
}

/// Init command - write the default configuration
///
/// Refuses to replace an existing file unless `force` is set.
fn init_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow::anyhow!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        ));
    }

    Config::default()
        .save_to_file(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} {}", "✓ Wrote".green(), path.display());
    Ok(())
}

/// Catalog command - list index entries
fn catalog_command(handle: &CatalogHandle) -> Result<()> {
    let index = handle.snapshot()?;
    print_catalog(&index);
    Ok(())
}

fn print_catalog(index: &CatalogIndex) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Catalog".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    if index.is_empty() {
        println!("{}", "No models or sources in manifest".yellow());
    }

    for entry in index.entries() {
        println!("  {:<8} {:<40} {}", entry.kind.to_string().cyan(), entry.lookup_key, entry.rendered_ref);
    }

    println!();
    println!("{} {}", "Entries:".bold(), index.len());
    println!("{} {}", "Fingerprint:".bold(), index.fingerprint());
}

fn print_resolutions(result: &RewriteResult) {
    if result.resolutions.is_empty() {
        eprintln!("{}", "No FROM/JOIN table references found".yellow());
        return;
    }

    for resolution in &result.resolutions {
        match &resolution.rendered_ref {
            Some(rendered) => eprintln!(
                "  {} {} -> {} ({})",
                "✓".green(),
                resolution.identifier,
                rendered,
                resolution.rule
            ),
            None => eprintln!(
                "  {} {} (no catalog entry)",
                "✗".yellow(),
                resolution.identifier
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_loadable_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbtify.toml");

        init_command(&path, false).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.manifest_path, Config::default().manifest_path);
        assert_eq!(config.default_object_type, Config::default().default_object_type);
        assert_eq!(config.resolved_manifest_path(), dir.path().join("target/manifest.json"));
    }

    #[test]
    fn init_keeps_existing_config_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dbtify.toml");
        std::fs::write(&path, "manifest_path = \"custom/manifest.json\"\n").unwrap();

        assert!(init_command(&path, false).is_err());
        assert!(std::fs::read_to_string(&path).unwrap().contains("custom/manifest.json"));

        init_command(&path, true).unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.manifest_path, PathBuf::from("target/manifest.json"));
    }
}
