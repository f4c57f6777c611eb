//! passcore CLI - inspect and maintain a local encrypted item cache.
//!
//! Works offline against the SQLite cache and the device key; it never
//! talks to the remote services.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use passcore_common::{
    ClientConfig, ItemContentData, ItemId, ItemIdentifier, ShareId, UserId,
};
use passcore_storage::{
    DeviceKeyProvider, FileKeyStorage, LocalItemStore, SqliteItemStore, SymmetricallyEncryptedItem,
};

#[derive(Parser)]
#[command(name = "passcore")]
#[command(about = "passcore - Local encrypted item cache tool")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: <data dir>/passcore/config.json).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file and create the device key.
    Init {
        /// Directory for the cache database and key storage.
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Page size for paginated remote endpoints.
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Show the effective configuration.
    Config,

    /// Inspect and edit cached items.
    #[command(subcommand)]
    Items(ItemsCommand),

    /// Manage the device key.
    #[command(subcommand)]
    DeviceKey(DeviceKeyCommand),
}

#[derive(Subcommand)]
enum ItemsCommand {
    /// List cached items of a user.
    List {
        #[arg(short, long)]
        user: String,

        /// Only items of this share.
        #[arg(short, long)]
        share: Option<String>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List pinned items of a user.
    Pinned {
        #[arg(short, long)]
        user: String,

        #[arg(long)]
        json: bool,
    },

    /// Decrypt and print one item.
    Show {
        #[command(flatten)]
        target: ItemTarget,

        /// Print secret fields instead of masking them.
        #[arg(long)]
        reveal: bool,
    },

    /// Pin an item locally.
    Pin {
        #[command(flatten)]
        target: ItemTarget,
    },

    /// Unpin an item locally.
    Unpin {
        #[command(flatten)]
        target: ItemTarget,
    },

    /// Remove an item from the local cache.
    Delete {
        #[command(flatten)]
        target: ItemTarget,
    },
}

#[derive(Subcommand)]
enum DeviceKeyCommand {
    /// Delete the device key. Cached items become unreadable.
    Clear {
        /// Also delete the item cache.
        #[arg(long)]
        purge_cache: bool,
    },
}

#[derive(Args)]
struct ItemTarget {
    #[arg(short, long)]
    user: String,

    #[arg(short, long)]
    share: String,

    #[arg(short, long)]
    item: String,
}

impl ItemTarget {
    fn parse(&self) -> Result<(UserId, ItemIdentifier)> {
        let user = UserId::new(self.user.as_str()).context("Invalid user id")?;
        let share = ShareId::new(self.share.as_str()).context("Invalid share id")?;
        let item = ItemId::new(self.item.as_str()).context("Invalid item id")?;
        Ok((user, ItemIdentifier::new(share, item)))
    }
}

/// Row printed by the listing commands.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemRow {
    share_id: String,
    item_id: String,
    revision: u64,
    key_rotation: u64,
    pinned: bool,
    flags: u32,
    modified: Option<String>,
    last_used: Option<String>,
}

impl From<&SymmetricallyEncryptedItem> for ItemRow {
    fn from(item: &SymmetricallyEncryptedItem) -> Self {
        Self {
            share_id: item.share_id.to_string(),
            item_id: item.item_id.to_string(),
            revision: item.item.revision,
            key_rotation: item.item.key_rotation,
            pinned: item.is_pinned,
            flags: item.flags.bits(),
            modified: format_time(item.item.modify_time),
            last_used: item.last_use_time.and_then(format_time),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.unwrap_or_else(ClientConfig::default_path);

    match cli.command {
        Commands::Init {
            data_dir,
            page_size,
        } => cmd_init(&config_path, data_dir, page_size),

        Commands::Config => cmd_config(&config_path),

        Commands::Items(command) => {
            let config = load_config(&config_path)?;
            cmd_items(&config, command).await
        }

        Commands::DeviceKey(DeviceKeyCommand::Clear { purge_cache }) => {
            let config = load_config(&config_path)?;
            cmd_device_key_clear(&config, purge_cache)
        }
    }
}

fn load_config(path: &Path) -> Result<ClientConfig> {
    ClientConfig::load(path).with_context(|| {
        format!(
            "Failed to load config from {} (run `passcore init` first)",
            path.display()
        )
    })
}

fn device_keys(config: &ClientConfig) -> Result<DeviceKeyProvider> {
    let storage = FileKeyStorage::new(&config.key_storage_dir)
        .context("Failed to open key storage")?;
    Ok(DeviceKeyProvider::new(
        Arc::new(storage),
        config.device_key_name.as_str(),
    ))
}

async fn open_store(config: &ClientConfig) -> Result<SqliteItemStore> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    SqliteItemStore::open(&config.database_path)
        .await
        .context("Failed to open item cache")
}

/// Create configuration and device key.
fn cmd_init(config_path: &Path, data_dir: Option<PathBuf>, page_size: Option<usize>) -> Result<()> {
    let mut config = ClientConfig::default();
    if let Some(dir) = data_dir {
        config.database_path = dir.join("items.sqlite");
        config.key_storage_dir = dir.join("keys");
    }
    if let Some(size) = page_size {
        config.page_size = size;
    }
    config.validate().context("Invalid configuration")?;

    config
        .save(config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;
    info!("Wrote config to {}", config_path.display());

    device_keys(&config)?
        .get_or_create()
        .context("Failed to create device key")?;

    println!("Initialized passcore.");
    println!("  Config: {}", config_path.display());
    println!("  Cache: {}", config.database_path.display());
    println!("  Key storage: {}", config.key_storage_dir.display());

    Ok(())
}

fn cmd_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    println!("{}", config.to_json()?);
    Ok(())
}

async fn cmd_items(config: &ClientConfig, command: ItemsCommand) -> Result<()> {
    let store = open_store(config).await?;
    debug!(store = store.name(), "Opened item cache");

    match command {
        ItemsCommand::List { user, share, json } => {
            let user = UserId::new(user).context("Invalid user id")?;
            let mut items = store.get_all(&user).await?;
            if let Some(share) = share {
                let share = ShareId::new(share).context("Invalid share id")?;
                items.retain(|item| item.share_id == share);
            }
            print_items(&items, json)
        }

        ItemsCommand::Pinned { user, json } => {
            let user = UserId::new(user).context("Invalid user id")?;
            let items = store.get_all_pinned(&user).await?;
            print_items(&items, json)
        }

        ItemsCommand::Show { target, reveal } => {
            let (user, id) = target.parse()?;
            let item = store
                .get_item(&user, &id.share_id, &id.item_id)
                .await?
                .with_context(|| format!("Item {} is not cached", id))?;

            let device_key = device_keys(config)?
                .get()?
                .context("No device key; the cache cannot be decrypted")?;
            let content = item
                .decrypt_content(&device_key)
                .context("Failed to decrypt item")?;

            println!("Item {}", id);
            println!("  Name: {}", content.name);
            match &content.data {
                ItemContentData::Login {
                    username,
                    password,
                    urls,
                    ..
                } => {
                    println!("  Type: login");
                    println!("  Username: {}", username);
                    println!("  Password: {}", mask(password, reveal));
                    for url in urls {
                        println!("  URL: {}", url);
                    }
                }
                ItemContentData::CreditCard { .. } => println!("  Type: credit card"),
                ItemContentData::Note => println!("  Type: note"),
                ItemContentData::Alias => println!("  Type: alias"),
            }
            if !content.note.is_empty() {
                println!("  Note: {}", mask(&content.note, reveal));
            }
            for field in &content.extra_fields {
                let value = if field.hidden {
                    mask(&field.value, reveal)
                } else {
                    field.value.clone()
                };
                println!("  {}: {}", field.title, value);
            }
            println!("  Pinned: {}", item.is_pinned);
            println!("  Revision: {}", item.item.revision);
            Ok(())
        }

        ItemsCommand::Pin { target } => set_pinned(&store, &target, true).await,

        ItemsCommand::Unpin { target } => set_pinned(&store, &target, false).await,

        ItemsCommand::Delete { target } => {
            let (user, id) = target.parse()?;
            let removed = store.delete(&user, std::slice::from_ref(&id)).await?;
            if removed == 0 {
                anyhow::bail!("Item {} is not cached", id);
            }
            println!("Removed {} from the local cache.", id);
            Ok(())
        }
    }
}

async fn set_pinned(store: &SqliteItemStore, target: &ItemTarget, pinned: bool) -> Result<()> {
    let (user, id) = target.parse()?;
    store
        .set_pinned(&user, &id, pinned)
        .await
        .with_context(|| format!("Failed to update {}", id))?;
    println!("{} {}.", if pinned { "Pinned" } else { "Unpinned" }, id);
    Ok(())
}

fn cmd_device_key_clear(config: &ClientConfig, purge_cache: bool) -> Result<()> {
    device_keys(config)?
        .clear()
        .context("Failed to clear device key")?;
    println!("Device key cleared.");

    if purge_cache && config.database_path.exists() {
        std::fs::remove_file(&config.database_path).context("Failed to delete item cache")?;
        println!("Deleted {}", config.database_path.display());
    }
    Ok(())
}

fn print_items(items: &[SymmetricallyEncryptedItem], json: bool) -> Result<()> {
    let rows: Vec<ItemRow> = items.iter().map(ItemRow::from).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No cached items.");
        return Ok(());
    }

    println!(
        "{:<20} {:<24} {:>8} {:>4} {:<6} {}",
        "SHARE", "ITEM", "REVISION", "KEY", "PINNED", "MODIFIED"
    );
    for row in rows {
        println!(
            "{:<20} {:<24} {:>8} {:>4} {:<6} {}",
            row.share_id,
            row.item_id,
            row.revision,
            row.key_rotation,
            if row.pinned { "yes" } else { "" },
            row.modified.unwrap_or_default()
        );
    }
    Ok(())
}

fn mask(value: &str, reveal: bool) -> String {
    if reveal {
        value.to_string()
    } else {
        "********".to_string()
    }
}

/// Render a unix timestamp in seconds.
fn format_time(seconds: i64) -> Option<String> {
    if seconds <= 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(seconds, 0).map(|t| t.format("%Y-%m-%d %H:%M").to_string())
}
