mod cache;
mod config;
mod event;
mod http;
mod net;
mod registration;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cache::{CacheStore, MemoryStore, SqliteStore};
use crate::config::{CacheNames, Config};
use crate::event::EventHost;
use crate::http::Request;
use crate::net::HttpFetcher;
use crate::registration::{Registration, WorkerVersion};
use crate::worker::{FetchOutcome, Message, Worker, WorkerSettings};

#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(about = "Offline-first app-shell cache worker for static web apps")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./shellcache.yaml or $XDG_CONFIG_HOME/shellcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Keep the cache in memory instead of the on-disk store
  #[arg(long)]
  ephemeral: bool,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Precache the app shell into the static cache
  Install,

  /// Drop stale cache generations and take control of clients
  Activate,

  /// Install, then activate: a full rollout of the configured version
  Up,

  /// Resolve a URL through the worker, cache-first
  Fetch {
    /// Path or absolute URL
    url: String,

    /// Treat the request as a top-level navigation
    #[arg(long)]
    navigate: bool,
  },

  /// Show cache generations and entry counts
  Status,

  /// Print the current worker version
  Version,

  /// Deliver a push payload and print the resulting notification
  Push {
    /// JSON payload; omit to use the configured defaults
    payload: Option<String>,
  },

  /// Trigger a background sync
  Sync { tag: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_tracing(args.log_file.as_deref())?;

  let config = Config::load(args.config.as_deref())?;

  if args.ephemeral {
    run(MemoryStore::new(), config, args.command).await
  } else {
    let store = match &config.store_path {
      Some(path) => SqliteStore::open_at(path)?,
      None => SqliteStore::open()?,
    };
    run(store, config, args.command).await
  }
}

async fn run<S: CacheStore + 'static>(store: S, config: Config, command: Command) -> Result<()> {
  // Status only reads the store; no worker needed
  if let Command::Status = command {
    return print_status(&store, &config);
  }

  let settings = WorkerSettings::from_config(&config)?;
  let fetcher = HttpFetcher::new(config.upstream.clone())?;
  let worker = Worker::new(settings, store, fetcher);
  let (host, handle) = EventHost::new(worker);
  tokio::spawn(host.run());

  let names = CacheNames::new(&config.app);

  match command {
    Command::Install => {
      handle.install().await?;
      println!("shell precached into {}", names.static_cache);
    }
    Command::Activate => {
      handle.activate().await?;
      println!("active generations: {}, {}", names.static_cache, names.runtime_cache);
    }
    Command::Up => {
      let version = WorkerVersion::compute(&names.static_cache, &config.shell_assets);
      let mut registration = Registration::new("/sw.js", config.resolve("/")?);
      info!(
        script = registration.script_url(),
        scope = registration.scope(),
        "registering worker"
      );
      registration.register(version);

      handle.install().await?;
      registration.installed();
      if registration.update_available() {
        info!("new version installed behind an active one; clients should reload");
      }

      handle.activate().await?;
      registration.activate();
      println!("worker active: {}", names.static_cache);
    }
    Command::Fetch { url, navigate } => {
      let absolute = config.resolve(&url)?;
      let mut request = Request::get(absolute);
      if navigate {
        request = request.navigate();
      }

      match handle.fetch(request).await? {
        FetchOutcome::Passthrough => {
          eprintln!("request passed through (not intercepted)");
        }
        FetchOutcome::Response(response) => {
          eprintln!("{} {}", response.status, response.status_text);
          std::io::stdout().write_all(&response.body)?;
        }
      }
    }
    Command::Status => unreachable!("handled above"),
    Command::Version => {
      let reply = handle
        .message(Message::GetVersion)
        .await?
        .ok_or_else(|| eyre!("worker did not report a version"))?;
      println!("{}", reply.version);
    }
    Command::Push { payload } => {
      let notification = handle.push(payload.map(String::into_bytes)).await?;
      println!("{}", serde_json::to_string_pretty(&notification)?);
    }
    Command::Sync { tag } => {
      handle.sync(tag).await?;
      println!("sync handled");
    }
  }

  Ok(())
}

fn print_status<S: CacheStore>(store: &S, config: &Config) -> Result<()> {
  let names = CacheNames::new(&config.app);
  let cache_names = store.cache_names()?;

  if cache_names.is_empty() {
    println!("no caches yet; run `shellcache install` first");
    return Ok(());
  }

  for name in cache_names {
    let count = store.entry_count(&name)?;
    let marker = if names.is_current(&name) { "" } else { " (stale)" };
    println!("{}  {} entries{}", name, count, marker);
  }
  Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shellcache=info"));

  match log_file {
    Some(path) => {
      let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| eyre!("Failed to open log file {}: {}", path.display(), e))?;
      let (writer, guard) = tracing_appender::non_blocking(file);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
  }
}
