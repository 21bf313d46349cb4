//! Diagnostic CLI over the Later count core.
//!
//! # Responsibility
//! - Drive spaces, items and reconciliation against a database file.
//! - Print one JSON document per command for scripting.

use clap::{Parser, Subcommand, ValueEnum};
use later_core::{
    init_logging, ContainerId, CoreConfig, CountService, ItemId, ItemKind, ItemPayload,
};
use log::error;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_DB_FILE_NAME: &str = "later.sqlite3";

#[derive(Parser)]
#[command(name = "later")]
#[command(about = "Later space item count diagnostics")]
struct Cli {
    /// Database file; falls back to `LATER_DB_PATH`, then `./later.sqlite3`.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Checks core linkage.
    Ping,
    /// Creates an empty space.
    SpaceCreate {
        name: String,
        #[arg(long)]
        icon: Option<String>,
    },
    /// Lists spaces with their cached counts.
    Spaces,
    /// Creates an item; the kind is detected when omitted.
    ItemCreate {
        #[arg(long)]
        space: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    ItemDelete {
        #[arg(long)]
        item: String,
    },
    ItemMove {
        #[arg(long)]
        item: String,
        #[arg(long)]
        to: String,
    },
    /// Shows cached and stored counts for one space.
    Count {
        #[arg(long)]
        space: String,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Reconciles one space.
    Reconcile {
        #[arg(long)]
        space: String,
    },
    /// Reconciles every space and prints drained desync events.
    Sweep,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Note,
    TodoList,
    List,
}

impl From<KindArg> for ItemKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Note => ItemKind::Note,
            KindArg::TodoList => ItemKind::TodoList,
            KindArg::List => ItemKind::List,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            error!("event=cli_command module=cli status=error error={message}");
            eprintln!("{}", json!({ "ok": false, "error": message }));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Value, String> {
    if let Commands::Ping = cli.command {
        return Ok(json!({
            "ping": later_core::ping(),
            "version": later_core::core_version(),
        }));
    }

    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, &log_dir.to_string_lossy())
            .map_err(|err| err.to_string())?;
    }
    let db_path = cli
        .db
        .or(config.db_path)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE_NAME));
    let service =
        CountService::open_sqlite(&db_path, config.reconcile).map_err(|err| err.to_string())?;

    let output = match cli.command {
        Commands::Ping => Value::Null,
        Commands::SpaceCreate { name, icon } => {
            let space = service
                .create_container(name, icon)
                .await
                .map_err(|err| err.to_string())?;
            json!({ "ok": true, "space": space })
        }
        Commands::Spaces => {
            let spaces = service.list_containers().await.map_err(|err| err.to_string())?;
            json!({ "ok": true, "spaces": spaces })
        }
        Commands::ItemCreate {
            space,
            title,
            content,
            kind,
        } => {
            let space_id = parse_space(&space)?;
            let payload = match kind {
                Some(kind) => ItemPayload::new(kind.into(), title, content),
                None => ItemPayload::detect(title, content),
            };
            let item = service
                .create_item(space_id, payload)
                .await
                .map_err(|err| err.to_string())?;
            let count = service.get_count(space_id).await.map_err(|err| err.to_string())?;
            json!({ "ok": true, "item": item, "item_count": count })
        }
        Commands::ItemDelete { item } => {
            let item_id = parse_item(&item)?;
            service
                .delete_item(item_id)
                .await
                .map_err(|err| err.to_string())?;
            json!({ "ok": true, "item_id": item_id })
        }
        Commands::ItemMove { item, to } => {
            let item_id = parse_item(&item)?;
            let target = parse_space(&to)?;
            let item = service
                .move_item(item_id, target)
                .await
                .map_err(|err| err.to_string())?;
            json!({ "ok": true, "item": item })
        }
        Commands::Count { space, kind } => {
            let space_id = parse_space(&space)?;
            let cached = service.get_count(space_id).await.map_err(|err| err.to_string())?;
            let stored = service
                .count_items(space_id, kind.map(ItemKind::from))
                .await
                .map_err(|err| err.to_string())?;
            json!({
                "ok": true,
                "space_id": space_id,
                "kind": kind.map(|kind| ItemKind::from(kind).as_str()),
                "cached": cached,
                "stored": stored,
            })
        }
        Commands::Reconcile { space } => {
            let space_id = parse_space(&space)?;
            let result = service
                .reconcile(space_id)
                .await
                .map_err(|err| err.to_string())?;
            json!({ "ok": true, "result": result })
        }
        Commands::Sweep => {
            let results = service.reconcile_all().await;
            json!({
                "ok": true,
                "results": results,
                "events": service.drain_events(),
            })
        }
    };
    Ok(output)
}

fn parse_space(raw: &str) -> Result<ContainerId, String> {
    ContainerId::parse(raw.trim()).map_err(|err| err.to_string())
}

fn parse_item(raw: &str) -> Result<ItemId, String> {
    ItemId::parse(raw.trim()).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, KindArg};
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_item_create_with_kind() {
        let cli = Cli::try_parse_from([
            "later",
            "--db",
            "counts.db",
            "item-create",
            "--space",
            "00000000-0000-4000-8000-000000000000",
            "--title",
            "Groceries",
            "--kind",
            "todo-list",
        ])
        .unwrap();

        assert_eq!(cli.db.as_deref(), Some(std::path::Path::new("counts.db")));
        match cli.command {
            Commands::ItemCreate { title, kind, .. } => {
                assert_eq!(title, "Groceries");
                assert!(matches!(kind, Some(KindArg::TodoList)));
            }
            _ => panic!("expected item-create"),
        }
    }

    #[tokio::test]
    async fn ping_needs_no_database() {
        let cli = Cli::try_parse_from(["later", "ping"]).unwrap();
        let output = super::run(cli).await.unwrap();
        assert_eq!(output["ping"], "pong");
    }

    #[tokio::test]
    async fn create_then_count_against_temp_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("later.db");
        let db_arg = db.to_string_lossy().to_string();

        let created = super::run(
            Cli::try_parse_from(["later", "--db", db_arg.as_str(), "space-create", "Inbox"])
                .unwrap(),
        )
        .await
        .unwrap();
        let space_id = created["space"]["id"].as_str().unwrap().to_string();

        super::run(
            Cli::try_parse_from([
                "later",
                "--db",
                db_arg.as_str(),
                "item-create",
                "--space",
                space_id.as_str(),
                "--title",
                "Buy milk",
            ])
            .unwrap(),
        )
        .await
        .unwrap();

        let count = super::run(
            Cli::try_parse_from([
                "later",
                "--db",
                db_arg.as_str(),
                "count",
                "--space",
                space_id.as_str(),
            ])
            .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(count["cached"], 1);
        assert_eq!(count["stored"], 1);
    }
}
