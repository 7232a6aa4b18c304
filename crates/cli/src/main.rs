use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use photosort_core::config::{self, AppConfig, ProcessingMode, RunOptions};
use photosort_core::logsink;
use photosort_core::organizer::Organizer;
use std::path::PathBuf;
use std::sync::Arc;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Organize(args) => run_organize(cfg, args),
        Commands::Tags { command } => run_tags(cfg, command),
    }
}

#[derive(Parser)]
#[command(name = "photosort")]
#[command(about = "Tag-aware photo organizer", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify photos and move them into a dated, tag-named tree
    Organize(OrganizeArgs),
    /// Inspect or edit the custom tag vocabulary file
    Tags {
        #[command(subcommand)]
        command: TagsCommand,
    },
}

#[derive(Parser)]
struct OrganizeArgs {
    /// Folder to read photos from
    source: PathBuf,

    /// Base folder the dated tree is created under
    destination: PathBuf,

    /// Custom filename prefix (e.g. SFH); camera prefixes apply when omitted
    #[arg(long)]
    prefix: Option<String>,

    /// Delimiter between filename components and tags
    #[arg(long)]
    delimiter: Option<String>,

    /// Maximum number of tags embedded per filename
    #[arg(long)]
    top_tags: Option<usize>,

    /// Minimum tag probability for filename eligibility (0.0 - 1.0)
    #[arg(long)]
    threshold: Option<f32>,

    /// Processing mode: jpg_and_raw or raw_only
    #[arg(long)]
    mode: Option<String>,

    /// Glob patterns to leave alone
    #[arg(long, value_delimiter = ',', num_args = 1.., default_values_t = Vec::<String>::new())]
    exclude: Vec<String>,

    /// Directory holding visual.onnx, textual.onnx and tokenizer.json
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Custom tag phrases file, one per line
    #[arg(long)]
    custom_tags: Option<PathBuf>,

    /// Print a JSON summary of the run counters
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum TagsCommand {
    /// Print the custom tag phrases
    List,
    /// Add phrases to the custom tag file (deduplicated and sorted on save)
    Add { phrases: Vec<String> },
}

fn run_organize(cfg: AppConfig, args: OrganizeArgs) -> Result<()> {
    let mut options = RunOptions::new(args.source, args.destination);
    options.prefix = args.prefix.unwrap_or(cfg.naming.prefix);
    options.delimiter = args.delimiter.unwrap_or(cfg.naming.delimiter);
    options.top_tags = args.top_tags.unwrap_or(cfg.naming.top_tags);
    options.confidence_threshold = args.threshold.unwrap_or(cfg.naming.confidence_threshold);
    options.mode = args
        .mode
        .as_deref()
        .map(ProcessingMode::from)
        .unwrap_or(cfg.naming.mode);
    options.exclude = args.exclude;
    options.validate()?;

    let tags_file = args.custom_tags.unwrap_or(cfg.tags.custom_file);
    let custom_tags = scorers::load_custom_tags(&tags_file)
        .with_context(|| format!("reading custom tags from {}", tags_file.display()))?;
    if !custom_tags.is_empty() {
        tracing::info!(
            "loaded {} custom tags from {}",
            custom_tags.len(),
            tags_file.display()
        );
    }

    let model_dir = args.model_dir.unwrap_or(cfg.model.dir);
    let scorer = scorers::ClipScorer::load(&model_dir, &custom_tags)
        .with_context(|| format!("loading CLIP model from {}", model_dir.display()))?;

    let scratch_dir = options.scratch_dir.clone();
    let mut organizer = Organizer::new(options, Arc::new(scorer), logsink::tracing_sink());
    let ok = organizer.organize();

    // The pipeline already cleans up after itself; this covers an aborted
    // worker leaving the scratch directory behind.
    if scratch_dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(&scratch_dir) {
            tracing::warn!("final scratch cleanup failed: {e}");
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&organizer.counters())?);
    }
    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn run_tags(cfg: AppConfig, command: TagsCommand) -> Result<()> {
    let path = cfg.tags.custom_file;
    match command {
        TagsCommand::List => {
            for tag in scorers::load_custom_tags(&path)? {
                println!("{tag}");
            }
        }
        TagsCommand::Add { phrases } => {
            let mut tags = scorers::load_custom_tags(&path)?;
            for phrase in phrases {
                tags.push(conventional_phrase(&phrase));
            }
            scorers::save_custom_tags(&path, &tags)
                .with_context(|| format!("writing {}", path.display()))?;
            println!(
                "{} custom tags in {}",
                scorers::load_custom_tags(&path)?.len(),
                path.display()
            );
        }
    }
    Ok(())
}

/// Tag files conventionally store full "a photo of ..." phrases.
fn conventional_phrase(phrase: &str) -> String {
    let trimmed = phrase.trim();
    if trimmed.to_ascii_lowercase().starts_with("a photo of ") {
        trimmed.to_string()
    } else {
        format!("a photo of {trimmed}")
    }
}
