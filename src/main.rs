use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use folio_config::{ExecutionOptions, FolioConfig};
use folio_engine::{ExecutionResult, PageEngine, Subscription};
use folio_source::{ContentSource, HttpContentSource, StaticContentSource};

/// Folio - fetch, track and validate CMS-authored pages
#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the config file (default: ~/.folio/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Serve pages from a JSON fixture file instead of the content API
  #[arg(long, global = true)]
  fixtures: Option<PathBuf>,

  /// Content API key, overrides the config file
  #[arg(long, global = true, env = "FOLIO_API_KEY")]
  api_key: Option<String>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Execute pages concurrently
  Run {
    #[arg(required = true)]
    urls: Vec<String>,

    #[command(flatten)]
    options: RunOptions,
  },

  /// Execute pages one at a time through the throttled queue
  Queue {
    #[arg(required = true)]
    urls: Vec<String>,

    #[command(flatten)]
    options: RunOptions,
  },

  /// List every page the content source knows and execute them all
  Discover,

  /// Execute a page and check it against the validation rules
  Validate { url: String },
}

#[derive(Args)]
struct RunOptions {
  /// Content model to fetch from (default from config)
  #[arg(long)]
  model: Option<String>,

  /// Fetch draft content
  #[arg(long)]
  preview: bool,

  /// Bypass the content API cache
  #[arg(long)]
  cache_bust: bool,

  /// Resolve references inside the content
  #[arg(long)]
  include_refs: bool,

  /// Targeting attribute, repeatable
  #[arg(long = "attr", value_name = "KEY=VALUE", value_parser = parse_attribute)]
  attributes: Vec<(String, String)>,
}

impl RunOptions {
  fn into_execution_options(self) -> ExecutionOptions {
    let mut options = ExecutionOptions::new()
      .with_preview(self.preview)
      .with_cache_bust(self.cache_bust)
      .with_include_refs(self.include_refs);
    if let Some(model) = self.model {
      options = options.with_model(model);
    }
    for (key, value) in self.attributes {
      options = options.with_attribute(key, value);
    }
    options
  }
}

fn parse_attribute(raw: &str) -> Result<(String, String), String> {
  let (key, value) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
  if key.is_empty() {
    return Err(format!("attribute key is empty in '{raw}'"));
  }
  Ok((key.to_string(), value.to_string()))
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio=info")),
    )
    .with_writer(std::io::stderr)
    .init();

  let Some(command) = cli.command else {
    println!("folio - use --help to see available commands");
    return Ok(());
  };

  let config_path = match cli.config {
    Some(path) => path,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".folio")
      .join("config.json"),
  };
  let mut config = FolioConfig::load(&config_path)
    .with_context(|| format!("failed to load config: {}", config_path.display()))?;
  if cli.api_key.is_some() {
    config.source.api_key = cli.api_key;
  }

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run(command, config, cli.fixtures).await })
}

async fn run(command: Commands, config: FolioConfig, fixtures: Option<PathBuf>) -> Result<()> {
  let source: Arc<dyn ContentSource> = match fixtures {
    Some(path) => Arc::new(
      StaticContentSource::from_fixture_file(&path)
        .await
        .with_context(|| format!("failed to load fixtures: {}", path.display()))?,
    ),
    None => Arc::new(
      HttpContentSource::new(&config.source).context("failed to create content API client")?,
    ),
  };

  let engine = PageEngine::new(source, config.engine);
  let _progress = log_progress(&engine);

  match command {
    Commands::Run { urls, options } => {
      engine
        .execute_pages(&urls, &options.into_execution_options())
        .await;
      print_summary(&engine)?;
    }
    Commands::Queue { urls, options } => {
      let options = options.into_execution_options();
      for url in urls {
        engine.queue_execution(url, options.clone());
      }
      engine.wait_for_queue().await;
      print_summary(&engine)?;
    }
    Commands::Discover => {
      engine.discover_and_execute_pages().await;
      print_summary(&engine)?;
    }
    Commands::Validate { url } => {
      let report = engine.validate_page(&url).await;
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
  }

  engine.shutdown();
  Ok(())
}

/// Log each time another page reaches a terminal status.
fn log_progress(engine: &PageEngine) -> Subscription {
  let reported = AtomicUsize::new(0);
  engine.subscribe(move |results: &[ExecutionResult]| {
    let finished = results.iter().filter(|r| r.is_terminal()).count();
    if finished > reported.swap(finished, Ordering::Relaxed) {
      info!(finished, known = results.len(), "progress");
    }
  })
}

fn print_summary(engine: &PageEngine) -> Result<()> {
  let mut results = engine.results();
  results.sort_by(|a, b| a.url.cmp(&b.url));

  let output = json!({
    "results": results,
    "stats": engine.performance_stats(),
  });
  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}
