//! proxy-console: edit a reverse proxy's declarative configuration.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI / view                 ┌──────────────────────────────┐
//!   ───────────────────────────▶  form::FormEditor            │
//!                              │  descriptors → draft →       │
//!                              │  validate → submit           │
//!                              └──────────────┬───────────────┘
//!                                             │ Upsert
//!                              ┌──────────────▼───────────────┐
//!                              │  store::ConfigStore          │
//!                              │  cached document, events     │
//!                              └──────────────┬───────────────┘
//!                                             │ ConfigService
//!                              ┌──────────────▼───────────────┐
//!                              │  remote: http | file | memory │
//!                              └──────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use proxy_console::config::{load_config, ConsoleConfig, RemoteKind};
use proxy_console::document::{Category, Resource};
use proxy_console::form::{descriptors_for, FormEditor, StoreUpsert, SubmitError};
use proxy_console::observability::logging::init_logging;
use proxy_console::remote::{ConfigService, FileService, FileWatcher, HttpService, MemoryService};
use proxy_console::store::{ConfigStore, StoreEvent};

#[derive(Parser)]
#[command(name = "proxy-console")]
#[command(about = "Edit reverse proxy configuration resources", long_about = None)]
struct Cli {
    /// Console settings file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Admin API base URL (overrides settings).
    #[arg(short, long)]
    url: Option<String>,

    /// Admin API key (overrides settings).
    #[arg(short, long)]
    key: Option<String>,

    /// Edit a local TOML document instead of the admin API.
    #[arg(short, long)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List resource names of a category
    List { category: Category },
    /// Show one resource
    Show { category: Category, name: String },
    /// Create or update a resource: field=value, list+=entry, list-=entry
    Set {
        category: Category,
        name: String,
        #[arg(required = true)]
        assignments: Vec<String>,
    },
    /// Delete a resource
    Delete { category: Category, name: String },
    /// Print a category every time the document changes
    Watch { category: Category },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => load_config(path)?,
        None => ConsoleConfig::default(),
    };
    if let Some(url) = cli.url {
        settings.remote.kind = RemoteKind::Http;
        settings.remote.url = url;
    }
    if let Some(key) = cli.key {
        settings.remote.api_key = Some(key);
    }
    if let Some(file) = cli.file {
        settings.remote.kind = RemoteKind::File;
        settings.remote.path = file.to_string_lossy().into_owned();
    }

    init_logging(&settings.observability.log_level);

    let service: Arc<dyn ConfigService> = match settings.remote.kind {
        RemoteKind::Http => Arc::new(HttpService::new(
            &settings.remote.url,
            settings.remote.api_key.as_deref(),
            settings.remote.timeout(),
        )?),
        RemoteKind::File => Arc::new(FileService::new(&settings.remote.path)),
        RemoteKind::Memory => Arc::new(MemoryService::new()),
    };

    let store = ConfigStore::new(service);
    store.initialize().await?;

    match cli.command {
        Commands::List { category } => {
            print_json(&store.names(category)?)?;
        }
        Commands::Show { category, name } => match store.resource(category, &name)? {
            Some(resource) => {
                print_json(&resource)?;
                let missing = resource.missing_required(category);
                if !missing.is_empty() {
                    eprintln!("Warning: {} '{}' lacks required field(s): {}", category, name, missing.join(", "));
                }
            }
            None => return Err(format!("{} '{}' not found", category, name).into()),
        },
        Commands::Set { category, name, assignments } => {
            set(&store, category, &name, &assignments).await?;
            if let Some(resource) = store.resource(category, &name)? {
                print_json(&resource)?;
            }
        }
        Commands::Delete { category, name } => {
            store.remove(category, &name).await?;
            eprintln!("Deleted {} '{}'", category, name);
        }
        Commands::Watch { category } => {
            let watcher = match settings.remote.kind {
                RemoteKind::File => Some(FileWatcher::new(Path::new(&settings.remote.path), store.clone()).run()?),
                _ => None,
            };
            let mut poll = tokio::time::interval(settings.remote.poll_interval());
            poll.tick().await;

            let mut events = store.subscribe();
            let mut shown = store.data()?.resources(category).clone();
            print_json(&shown)?;
            loop {
                tokio::select! {
                    event = events.recv() => match watch_step(event) {
                        WatchStep::Report(e) => eprintln!("Reload failed: {}", e),
                        WatchStep::Reread => {
                            let current = store.data()?.resources(category).clone();
                            if current != shown {
                                print_json(&current)?;
                                shown = current;
                            }
                        }
                        WatchStep::Stop => break,
                    },
                    _ = poll.tick(), if watcher.is_none() => {
                        // Failures arrive as LoadFailed events.
                        let _ = store.refresh().await;
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq)]
enum WatchStep {
    Reread,
    Report(String),
    Stop,
}

/// Missed events only mean the view may be stale; the channel closing ends the watch.
fn watch_step(event: Result<StoreEvent, RecvError>) -> WatchStep {
    match event {
        Ok(StoreEvent::LoadFailed(e)) => WatchStep::Report(e),
        Ok(_) => WatchStep::Reread,
        Err(RecvError::Lagged(skipped)) => {
            tracing::debug!(skipped, "Watch fell behind store events");
            WatchStep::Reread
        }
        Err(RecvError::Closed) => WatchStep::Stop,
    }
}

/// Drive one upsert through the form editor so it gets full validation.
async fn set(
    store: &ConfigStore,
    category: Category,
    name: &str,
    assignments: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let current: Option<Resource> = store.resource(category, name)?;
    let items = descriptors_for(category, current.as_ref());
    let editor = FormEditor::new(name, items.clone(), StoreUpsert::new(store.clone(), category));

    for assignment in assignments {
        let (id, op, value) = parse_assignment(assignment)?;
        let is_list = items
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.kind.is_list())
            .ok_or_else(|| format!("{} has no field '{}'", category, id))?;

        match (op, is_list) {
            ("+=", true) => editor.push_entry(id, value)?,
            ("-=", true) => {
                let entries = editor.value(id).and_then(|v| v.as_list().map(<[String]>::to_vec)).unwrap_or_default();
                let index = entries
                    .iter()
                    .position(|e| e == value)
                    .ok_or_else(|| format!("'{}' is not in {}", value, id))?;
                editor.remove_entry(id, index)?;
            }
            ("=", true) => {
                let entries = value
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(String::from)
                    .collect();
                editor.set_list(id, entries)?;
            }
            ("=", false) => editor.set_text(id, value)?,
            _ => return Err(format!("'{}' cannot be used with field '{}'", op, id).into()),
        }
    }

    match editor.submit().await {
        Ok(()) => Ok(()),
        Err(SubmitError::Invalid(errors)) => {
            for (field, error) in &errors {
                eprintln!("  {}: {}", field, error);
            }
            Err(format!("{} field(s) failed validation", errors.len()).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// `field=value`, `field+=entry` or `field-=entry`.
fn parse_assignment(raw: &str) -> Result<(&str, &'static str, &str), String> {
    let (lhs, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{}'", raw))?;
    let (id, op) = if let Some(id) = lhs.strip_suffix('+') {
        (id, "+=")
    } else if let Some(id) = lhs.strip_suffix('-') {
        (id, "-=")
    } else {
        (lhs, "=")
    };
    if id.is_empty() {
        return Err(format!("missing field name in '{}'", raw));
    }
    Ok((id, op, value))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
