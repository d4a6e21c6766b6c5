//! metabrowse CLI - detect and normalize JSON metadata documents
//!
//! Reads a JSON document, detects its collection type with the built-in
//! registry and prints the metadata of every entity.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use metabrowse::serialization::write_collection;
use metabrowse::{Detection, IngestConfig, NoMatchPolicy, OutputFormat, TypeRegistry};

#[derive(Parser)]
#[command(name = "metabrowse")]
#[command(version, about = "Detect and normalize JSON metadata documents", long_about = None)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Ndjson,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Ndjson => OutputFormat::Ndjson,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the collection type detected for a document
    Detect {
        /// JSON document to inspect
        file: PathBuf,
    },

    /// Parse a document and print the metadata of every entity
    Parse {
        /// JSON document to parse
        file: PathBuf,

        /// Output format (overrides the configuration)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Parse with the default collection type when detection fails
        #[arg(long)]
        fallback_default: bool,
    },

    /// List registered entity types, collection types and detection rules
    Types,
}

/// Configuration precedence: CLI flags > environment > config file > defaults
fn load_config(path: Option<&Path>) -> Result<IngestConfig> {
    let config = match path {
        Some(path) => IngestConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => IngestConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn init_tracing(config: &IngestConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_document(path: &Path) -> Result<serde_json::Value> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };
    init_tracing(&config);

    let result = match cli.command {
        Commands::Detect { file } => detect(&file),
        Commands::Parse {
            file,
            format,
            fallback_default,
        } => {
            let mut config = config;
            if let Some(format) = format {
                config.output_format = format.into();
            }
            if fallback_default {
                config.no_match_policy = NoMatchPolicy::DefaultCollection;
            }
            parse(&file, &config)
        }
        Commands::Types => list_types(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn detect(file: &Path) -> Result<()> {
    let document = read_document(file)?;

    match TypeRegistry::global().detect_collection_type(&document) {
        Detection::Matched(collection) => {
            println!("{}", collection.name());
            Ok(())
        }
        Detection::NoMatch => bail!("No registered format matches {}", file.display()),
    }
}

fn parse(file: &Path, config: &IngestConfig) -> Result<()> {
    let document = read_document(file)?;

    let collection = TypeRegistry::global()
        .parse_document_with_policy(document, config.no_match_policy)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let warnings: usize = collection
        .get_entities()
        .iter()
        .map(|entity| entity.diagnostics().len())
        .sum();

    let stdout = io::stdout();
    let written = write_collection(stdout.lock(), collection.as_ref(), config.output_format)?;

    tracing::info!(
        collection = collection.collection_type(),
        entities = written,
        warnings,
        "parsed {}",
        file.display()
    );
    Ok(())
}

fn list_types() -> Result<()> {
    let summary = TypeRegistry::global().summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
