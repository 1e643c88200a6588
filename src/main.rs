mod app;
mod commands;

use clap::Parser;
use color_eyre::Result;
use pagefetch::config::Config;
use pagefetch::logging::{self, LogTarget};
use pagefetch::{FetchQuery, PageCursor, SavingMethod, StorageEnv};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pagefetch")]
#[command(about = "Page through a JSON API with optional caching")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pagefetch/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// URL template with {limit}, {skip} and {page} placeholders
  #[arg(short, long)]
  url: Option<String>,

  /// Items per page
  #[arg(long)]
  page_size: Option<usize>,

  /// Total number of pages
  #[arg(long)]
  pages: Option<usize>,

  /// Cache responses
  #[arg(long)]
  save: bool,

  /// Where to cache responses: session, persistent, response-cache
  #[arg(long, value_parser = parse_method)]
  method: Option<SavingMethod>,

  /// Log to stderr instead of the log file
  #[arg(short, long)]
  verbose: bool,
}

fn parse_method(s: &str) -> std::result::Result<SavingMethod, String> {
  match s {
    "session" => Ok(SavingMethod::Session),
    "persistent" | "local" => Ok(SavingMethod::Persistent),
    "response-cache" | "response_cache" | "cache" => Ok(SavingMethod::ResponseCache),
    other => Err(format!("unknown saving method '{}'", other)),
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = logging::init(if args.verbose {
    LogTarget::Stderr
  } else {
    LogTarget::File
  })?;

  let mut config = Config::load(args.config.as_deref())?;

  // Command line overrides
  if let Some(url) = args.url {
    config.source.url_template = url;
  }
  if let Some(size) = args.page_size {
    config.pagination.items_per_page = size;
  }
  if let Some(pages) = args.pages {
    config.pagination.total_pages = pages;
  }
  if args.save {
    config.fetch.save = true;
  }
  if let Some(method) = args.method {
    config.fetch.saving_method = method;
  }

  info!(
    template = %config.source.url_template,
    save = config.fetch.save,
    method = %config.fetch.saving_method,
    "starting"
  );

  let env = if config.fetch.save {
    config.storage.open_env(config.fetch.saving_method)?
  } else {
    StorageEnv::session_only()
  };
  let fetcher = Arc::new(config.http.fetcher()?);
  let query = FetchQuery::new(fetcher, &env, config.fetch);

  let source = config.source.clone();
  let cursor = PageCursor::new(
    move |page, size| source.build_url(page, size),
    config.pagination,
    query,
  )?;

  let mut app = app::App::new(cursor);
  app.run().await?;

  Ok(())
}
