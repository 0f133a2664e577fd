//! `parley`: administrative tool for a Parley comment database.
//!
//! Reads `parley.toml` (or the path given with `--config`) and `PARLEY_*`
//! environment variables, opens the SQLite store and runs one moderation
//! command.
//!
//! # Usage
//!
//! ```
//! parley init
//! parley list --mode pending --limit 20
//! parley activate 12 13
//! PARLEY_PATH=/var/lib/parley/comments.db parley purge --days 14
//! ```

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use parley_core::{
  comment::{Mode, ModeMask, ThreadedComment},
  query::{AdminQuery, SortColumn},
  store::{CommentStore, PreferenceStore},
};
use parley_store_sqlite::{SqliteStore, StoreConfig};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Parley comment store administration")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "parley.toml")]
  config: PathBuf,

  /// Print results as JSON.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Create the schema and seed default preferences.
  Init,
  /// Comment counts per moderation state.
  Stats,
  /// List comments across all threads.
  List {
    #[arg(long, value_enum, default_value_t = ModeArg::Pending)]
    mode:       ModeArg,
    /// Sort column: id, created, modified, likes or dislikes.
    #[arg(long, default_value = "created")]
    order_by:   String,
    #[arg(long)]
    descending: bool,
    #[arg(long, default_value_t = 100)]
    limit:      u32,
    #[arg(long, default_value_t = 0)]
    page:       u32,
  },
  /// Approve pending comments.
  Activate { ids: Vec<i64> },
  /// Delete comments; those with replies become tombstones.
  Delete { ids: Vec<i64> },
  /// Remove pending comments older than the given age.
  Purge {
    #[arg(long, default_value_t = 30)]
    days: u64,
  },
  /// Number of approved comments per thread URI.
  Count { uris: Vec<String> },
  /// Read or write a stored preference.
  #[command(subcommand)]
  Preference(PreferenceCommand),
}

#[derive(Subcommand)]
enum PreferenceCommand {
  Get { key: String },
  Set { key: String, value: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
  Valid,
  Pending,
  Tombstoned,
  Visible,
  All,
}

impl From<ModeArg> for ModeMask {
  fn from(mode: ModeArg) -> Self {
    match mode {
      ModeArg::Valid => ModeMask::VALID,
      ModeArg::Pending => ModeMask::PENDING,
      ModeArg::Tombstoned => ModeMask::TOMBSTONED,
      ModeArg::Visible => ModeMask::VISIBLE,
      ModeArg::All => ModeMask::ALL,
    }
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .set_default("path", "comments.db")?
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(
      config::Environment::with_prefix("PARLEY")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let store_cfg: StoreConfig = settings
    .try_deserialize()
    .context("failed to deserialise StoreConfig")?;

  let store = SqliteStore::open(&store_cfg)
    .await
    .with_context(|| format!("failed to open store at {:?}", store_cfg.path))?;

  let result = run(&store, cli.command, cli.json).await;
  store.db().dispose().await;
  result
}

async fn run(store: &SqliteStore, command: Command, json: bool) -> anyhow::Result<()> {
  match command {
    Command::Init => {
      let seeded = store
        .seed_preferences()
        .await
        .context("seeding preferences")?;
      let version = store.db().version().await?;
      tracing::info!(seeded, sqlite = %version, "database ready");
    }

    Command::Stats => {
      let modes = store.count_modes().await.context("counting comments")?;
      let stats = Stats {
        valid:      modes.get(&Mode::Valid).copied().unwrap_or(0),
        pending:    modes.get(&Mode::Pending).copied().unwrap_or(0),
        tombstoned: modes.get(&Mode::Tombstoned).copied().unwrap_or(0),
        sqlite:     store.db().version().await?,
      };
      if json {
        print_json(&stats)?;
      } else {
        println!("valid:      {}", stats.valid);
        println!("pending:    {}", stats.pending);
        println!("tombstoned: {}", stats.tombstoned);
        println!("sqlite:     {}", stats.sqlite);
      }
    }

    Command::List { mode, order_by, descending, limit, page } => {
      let query = AdminQuery {
        mask: mode.into(),
        order_by: SortColumn::from_name(&order_by),
        ascending: !descending,
        limit: Some(limit),
        page,
        ..Default::default()
      };
      let comments = store.fetchall(&query).await.context("listing comments")?;
      if json {
        print_json(&comments)?;
      } else {
        for c in &comments {
          print_comment(c);
        }
      }
    }

    Command::Activate { ids } => {
      for id in ids {
        store
          .activate(id)
          .await
          .with_context(|| format!("activating comment {id}"))?;
        tracing::info!(id, "activated comment");
      }
    }

    Command::Delete { ids } => {
      for id in ids {
        let tombstone = store
          .delete(id)
          .await
          .with_context(|| format!("deleting comment {id}"))?;
        tracing::info!(id, tombstoned = tombstone.is_some(), "deleted comment");
      }
    }

    Command::Purge { days } => {
      store
        .purge(Duration::from_secs(days * 24 * 60 * 60))
        .await
        .context("purging pending comments")?;
    }

    Command::Count { uris } => {
      let refs: Vec<&str> = uris.iter().map(String::as_str).collect();
      let counts = store.count(&refs).await.context("counting comments")?;
      if json {
        let map: serde_json::Map<_, _> = uris
          .into_iter()
          .zip(counts)
          .map(|(uri, n)| (uri, serde_json::Value::from(n)))
          .collect();
        print_json(&map)?;
      } else {
        for (uri, n) in uris.iter().zip(counts) {
          println!("{n:>6}  {uri}");
        }
      }
    }

    Command::Preference(PreferenceCommand::Get { key }) => {
      match store.get_preference(&key).await? {
        Some(value) => println!("{value}"),
        None => anyhow::bail!("no preference named {key:?}"),
      }
    }

    Command::Preference(PreferenceCommand::Set { key, value }) => {
      store
        .set_preference(&key, &value)
        .await
        .with_context(|| format!("setting preference {key:?}"))?;
    }
  }

  Ok(())
}

// ─── Output ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Stats {
  valid:      u64,
  pending:    u64,
  tombstoned: u64,
  sqlite:     String,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn print_comment(c: &ThreadedComment) {
  let created = DateTime::<Utc>::from_timestamp(c.comment.created as i64, 0)
    .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_default();
  let author = c.comment.author.as_deref().unwrap_or("anonymous");
  let text = c.comment.text.as_deref().unwrap_or_default();
  let excerpt: String = text.chars().take(60).collect();

  println!(
    "#{:<6} {:?} {created}  {author} on {}\n        {excerpt}",
    c.comment.id, c.comment.mode, c.uri
  );
}
