//! townrecords operator CLI.
//!
//! Runs duplicate detection, merge/unmerge operations, search index
//! maintenance and searches against the configured database. Every command
//! prints JSON on stdout.
//!
//! Usage:
//! ```bash
//! townrecords detect-duplicates
//! townrecords merge-person 12 7 --actor clerk
//! townrecords search "budget hearing" --type document --type topic
//! townrecords watch
//! ```

use clap::{Parser, Subcommand};
use serde::Serialize;

use townrecords_lib::audit::AuditContext;
use townrecords_lib::db::RecordsDb;
use townrecords_lib::error::OperationOutcome;
use townrecords_lib::services::{attendees, people, search};
use townrecords_lib::state::load_config;
use townrecords_lib::types::Config;

#[derive(Parser, Debug)]
#[clap(name = "townrecords")]
#[clap(about = "Attendee identity resolution and search for municipal meeting records")]
struct Args {
    /// SQLite file to use instead of the configured one
    #[clap(long, value_name = "FILE", env = "TOWNRECORDS_DB")]
    database: Option<String>,

    /// Name recorded in the audit log for mutations
    #[clap(long, default_value = "cli")]
    actor: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild duplicate suggestions for every person
    DetectDuplicates,
    /// List duplicate clusters awaiting review
    Groups {
        /// Only clusters with a member in this town
        #[clap(long)]
        town: Option<i64>,
    },
    /// Merge one person into another
    MergePerson { source: i64, target: i64 },
    /// Merge one attendee into another
    MergeAttendee { source: i64, target: i64 },
    /// Split an attendee out into a new person
    UnmergeAttendee { attendee: i64 },
    /// Drop and repopulate the search index
    RebuildSearchIndex,
    /// Full-text search
    Search {
        query: String,
        /// Restrict to document, topic, person or governing_body (repeatable)
        #[clap(long = "type", value_name = "TYPE")]
        types: Vec<String>,
        /// Maximum results (defaults to the configured full search limit)
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Run duplicate detection on the configured interval until stopped
    Watch,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_db(config: &Config) -> anyhow::Result<RecordsDb> {
    RecordsDb::open(config).map_err(|e| anyhow::anyhow!("Failed to open database: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config =
        load_config().map_err(|e| anyhow::anyhow!("Failed to load townrecords config: {e}"))?;
    if let Some(path) = args.database {
        config.database_path = Some(path);
    }
    let ctx = AuditContext::new(args.actor, None);

    match args.command {
        Command::Watch => {
            townrecords_lib::jobs::run_detection_loop(config).await;
            Ok(())
        }
        Command::DetectDuplicates => {
            let db = open_db(&config)?;
            print_json(&OperationOutcome::from(people::detect_duplicates(
                &db,
                &config,
                &AuditContext::system(),
            )))
        }
        Command::Groups { town } => {
            let db = open_db(&config)?;
            print_json(&OperationOutcome::from(people::list_duplicate_groups(&db, town)))
        }
        Command::MergePerson { source, target } => {
            let db = open_db(&config)?;
            print_json(&OperationOutcome::from(people::merge_person(
                &db, &ctx, source, target,
            )))
        }
        Command::MergeAttendee { source, target } => {
            let db = open_db(&config)?;
            print_json(&OperationOutcome::from(attendees::merge_attendee(
                &db, &ctx, source, target,
            )))
        }
        Command::UnmergeAttendee { attendee } => {
            let db = open_db(&config)?;
            print_json(&OperationOutcome::from(people::unmerge_attendee(
                &db, &ctx, attendee,
            )))
        }
        Command::RebuildSearchIndex => {
            let db = open_db(&config)?;
            let summary = search::rebuild_search_index(&db)?;
            townrecords_lib::audit::record(
                &db,
                &AuditContext::system(),
                townrecords_lib::audit::ACTION_SEARCH_REBUILD,
                serde_json::to_value(&summary)?,
            );
            print_json(&summary)
        }
        Command::Search {
            query,
            types,
            limit,
        } => {
            let db = open_db(&config)?;
            let type_refs: Vec<&str> = types.iter().map(String::as_str).collect();
            let filter = if type_refs.is_empty() {
                None
            } else {
                Some(type_refs.as_slice())
            };
            let results = search::search(
                &db,
                &query,
                filter,
                limit.unwrap_or(config.full_search_limit),
            );
            let counts = search::search_counts(&db, &query);
            print_json(&serde_json::json!({
                "results": results,
                "counts": counts,
                "total": counts.total(),
            }))
        }
    }
}
