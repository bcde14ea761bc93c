//! Operator CLI over the officebook core.
//!
//! # Responsibility
//! - Map subcommands onto `RecordService` use-cases.
//! - Print every result as JSON on stdout.
//!
//! # Invariants
//! - All numbering goes through the core repository; the CLI never writes SQL.
//! - Logging stays off unless a log directory is configured.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use officebook_core::db::open_db;
use officebook_core::{
    default_log_level, entity_configs, init_logging, EntityType, RecordId, RecordListQuery,
    RecordPatch, RecordService, ResetWindow, SqliteRecordRepository,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DEFAULT_DB_PATH: &str = "officebook.sqlite3";

/// Officebook - sequenced ledgers for an insurance office
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SQLite database file
    #[arg(long, env = "OFFICEBOOK_DB", default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Directory for rolling log files (logging is off when unset)
    #[arg(long, env = "OFFICEBOOK_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, env = "OFFICEBOOK_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create and number a record
    Create {
        #[arg(value_parser = parse_entity)]
        entity: EntityType,
        /// Business date of the record (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Discriminator value, e.g. `motor` or `sip`
        #[arg(long)]
        category: Option<String>,
        /// Field assignment `key=value`; JSON values are parsed, others kept as text
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    /// Show the number the next record would receive
    Next {
        #[arg(value_parser = parse_entity)]
        entity: EntityType,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Show one record
    Show {
        id: RecordId,
        #[arg(long)]
        include_deleted: bool,
    },
    /// List one ledger, optionally narrowed to a reset window
    List {
        #[arg(value_parser = parse_entity)]
        entity: EntityType,
        /// Any date inside the window to list
        #[arg(long)]
        window_of: Option<NaiveDate>,
        #[arg(long)]
        include_deleted: bool,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Edit date, category or fields of an active record
    Update {
        id: RecordId,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    /// Soft-delete a record
    Delete { id: RecordId },
    /// Restore a soft-deleted record
    Restore { id: RecordId },
    /// Print the ledger configuration table
    Entities,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(log_dir) = &args.log_dir {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        let log_dir = absolute_dir(log_dir)?;
        init_logging(level, &log_dir.to_string_lossy()).context("failed to start logging")?;
    }

    let output = run(&args.db, args.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run(db_path: &Path, command: Command) -> Result<Value> {
    let mut conn = match command {
        Command::Entities => return Ok(entities_table()),
        _ => open_db(db_path)
            .with_context(|| format!("failed to open database `{}`", db_path.display()))?,
    };
    let repo = SqliteRecordRepository::try_new(&mut conn)?;
    let mut service = RecordService::new(repo);

    let output = match command {
        Command::Create {
            entity,
            date,
            category,
            fields,
        } => {
            let record =
                service.create_record(entity, date, category, fields.into_iter().collect())?;
            info!(
                "event=cli_create module=cli status=ok entity={} sequence={:?}",
                entity, record.sequence_number
            );
            serde_json::to_value(record)?
        }
        Command::Next { entity, date } => {
            let window = ResetWindow::containing(date, entity.config().window_policy)?;
            let next = service.next_sequence(entity, date)?;
            json!({
                "entity": entity.as_str(),
                "window": window,
                "next_sequence": next,
            })
        }
        Command::Show {
            id,
            include_deleted,
        } => {
            let record = service
                .get_record(id, include_deleted)?
                .ok_or_else(|| anyhow!("record {id} not found"))?;
            serde_json::to_value(record)?
        }
        Command::List {
            entity,
            window_of,
            include_deleted,
            limit,
            offset,
        } => {
            let window_key = window_of
                .map(|date| ResetWindow::containing(date, entity.config().window_policy))
                .transpose()?
                .map(|window| window.key);
            let records = service.list_records(&RecordListQuery {
                entity: Some(entity),
                window_key,
                include_deleted,
                limit,
                offset,
            })?;
            serde_json::to_value(records)?
        }
        Command::Update {
            id,
            date,
            category,
            fields,
        } => {
            let patch = RecordPatch {
                occurred_on: date,
                category,
                fields: fields.into_iter().collect::<BTreeMap<_, _>>(),
            };
            serde_json::to_value(service.edit_record(id, patch)?)?
        }
        Command::Delete { id } => {
            service.soft_delete_record(id)?;
            json!({ "id": id, "deleted": true })
        }
        Command::Restore { id } => serde_json::to_value(service.restore_record(id)?)?,
        Command::Entities => entities_table(),
    };
    Ok(output)
}

fn entities_table() -> Value {
    entity_configs()
        .iter()
        .map(|config| {
            let rules = config.field_rules.map(|rules| {
                json!({
                    "discriminator": rules.discriminator,
                    "categories": rules.categories().collect::<Vec<_>>(),
                })
            });
            json!({
                "entity": config.entity.as_str(),
                "window_policy": config.window_policy.as_str(),
                "base_sequence": config.base_sequence,
                "include_deleted_in_max": config.include_deleted_in_max,
                "field_rules": rules,
            })
        })
        .collect()
}

fn absolute_dir(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(dir))
}

fn parse_entity(value: &str) -> Result<EntityType, String> {
    EntityType::parse(value).ok_or_else(|| {
        let known = EntityType::ALL.map(EntityType::as_str).join(", ");
        format!("unknown entity `{value}`; expected one of {known}")
    })
}

/// Parses `key=value`; the value is JSON when it parses as JSON, text otherwise.
fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let Some((key, value)) = raw.split_once('=') else {
        return Err(format!("expected key=value, got `{raw}`"));
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in `{raw}`"));
    }
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
