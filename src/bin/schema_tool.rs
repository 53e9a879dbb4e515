//! Schema Tool CLI
//!
//! Compiles compact schemas and validates JSON documents against schemas.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use compact_schemas::config::ToolConfig;
use compact_schemas::{Compiler, DirectoryFetcher, DraftVersion, SchemaFetcher, SchemaStore};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-tool")]
#[command(about = "Compile compact schemas and validate JSON against them")]
struct Cli {
    /// Configuration file layered over schemas.toml and SCHEMAS__* variables
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a compact schema into a JSON Schema document
    Compile {
        /// Compact schema file
        file: PathBuf,
        /// Root URI for bare reference names
        #[arg(long)]
        root: Option<String>,
        /// Draft to emit (draft-03 or draft-04)
        #[arg(long)]
        draft: Option<DraftVersion>,
        /// Directory mirroring the schema root
        #[arg(long)]
        schema_dir: Option<PathBuf>,
        /// Write the schema here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a JSON document and print a report
    Validate {
        /// JSON document to validate
        data: PathBuf,
        /// Schema file
        #[arg(short, long)]
        schema: PathBuf,
        /// The schema is in compact notation; compile it first
        #[arg(long)]
        compile: bool,
        /// Directory mirroring the schema root
        #[arg(long)]
        schema_dir: Option<PathBuf>,
        /// Register an extra schema, as URI=FILE
        #[arg(long = "add", value_name = "URI=FILE")]
        add: Vec<String>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `false` when the command ran but the outcome is a failure
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = ToolConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Compile {
            file,
            root,
            draft,
            schema_dir,
            output,
        } => {
            if let Some(root) = root {
                config.compiler.root_uri = root;
            }
            if let Some(draft) = draft {
                config.compiler.draft = draft;
            }
            if schema_dir.is_some() {
                config.fetch.schema_dir = schema_dir;
            }

            let compiler = compiler(&config)?;
            let text = read(&file)?;
            let schema = compiler
                .compile_str(&text)
                .await
                .with_context(|| format!("compiling {}", file.display()))?;
            let rendered = config.output.format.render(&schema)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, rendered + "\n")
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), "schema written");
                }
                None => println!("{}", rendered),
            }
            Ok(true)
        }

        Commands::Validate {
            data,
            schema,
            compile,
            schema_dir,
            add,
        } => {
            if schema_dir.is_some() {
                config.fetch.schema_dir = schema_dir;
            }

            let data: Value = serde_json::from_str(&read(&data)?)
                .with_context(|| format!("parsing {}", data.display()))?;

            let mut store = SchemaStore::new();
            if let Some(dir) = config.schema_dir() {
                let count = store.load_directory(&dir, &config.compiler.root_uri)?;
                debug!(count, dir = %dir.display(), "registered schema directory");
            }
            for entry in &add {
                let (uri, path) = entry
                    .split_once('=')
                    .ok_or_else(|| anyhow!("--add expects URI=FILE, got {entry:?}"))?;
                let document: Value = serde_json::from_str(&read(Path::new(path))?)
                    .with_context(|| format!("parsing {path}"))?;
                store.add_schema(uri, document);
            }

            let schema_text = read(&schema)?;
            let schema_doc: Value = if compile {
                compiler(&config)?
                    .compile_str(&schema_text)
                    .await
                    .with_context(|| format!("compiling {}", schema.display()))?
                    .into_value()
            } else {
                serde_json::from_str(&schema_text)
                    .with_context(|| format!("parsing {}", schema.display()))?
            };

            let report = store.validate(&data, &schema_doc);
            println!("{}", config.output.format.render(&report)?);

            let missing_fails = config.validation.fail_on_missing && !report.missing.is_empty();
            Ok(report.valid && !missing_fails)
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(true)
        }
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn compiler(config: &ToolConfig) -> anyhow::Result<Compiler> {
    let fetcher = fetcher(config)?;
    Ok(Compiler::new(&config.compiler.root_uri, fetcher).with_version(config.compiler.draft))
}

fn fetcher(config: &ToolConfig) -> anyhow::Result<Arc<dyn SchemaFetcher>> {
    if let Some(dir) = config.schema_dir() {
        if !dir.is_dir() {
            bail!("schema directory {} does not exist", dir.display());
        }
        let fetcher = DirectoryFetcher::new(config.compiler.root_uri.clone(), dir)
            .with_extension(&config.fetch.extension);
        return Ok(Arc::new(fetcher));
    }
    http_fetcher(config)
}

#[cfg(feature = "http")]
fn http_fetcher(config: &ToolConfig) -> anyhow::Result<Arc<dyn SchemaFetcher>> {
    let timeout = std::time::Duration::from_secs(config.fetch.http_timeout_secs);
    Ok(Arc::new(compact_schemas::HttpFetcher::new(timeout)?))
}

#[cfg(not(feature = "http"))]
fn http_fetcher(_config: &ToolConfig) -> anyhow::Result<Arc<dyn SchemaFetcher>> {
    debug!("no schema directory and no http support; references will not resolve");
    Ok(Arc::new(compact_schemas::StaticFetcher::new()))
}
