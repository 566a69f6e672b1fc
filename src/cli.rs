use clap::{Parser, Subcommand};
use inquire::Text;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::handler::parse_role_list;
use crate::models::event::Event;
use crate::runtime::{RuntimeSettings, build_scheduler};
use crate::service::event_store::{EventSpec, EventStore};
use crate::service::sync_service::SyncDestination;
use crate::storage::DB;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an event from arguments.
    Create {
        title: String,
        /// RFC3339, e.g. 2026-03-01T20:00:00Z
        start_time: String,
        duration_minutes: i64,
        channel: String,
        space: String,
        /// Roles as name:emoji:slots, comma separated.
        #[arg(long, default_value = "")]
        roles: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value_t = 0)]
        max_participants: u32,
    },
    /// Create an event through interactive prompts.
    CreatePrompt {
        channel: String,
        space: String,
    },
    /// List stored events for a space.
    List { space: String },
    /// Show one event with its signups.
    Show { id: String },
    /// Run one calendar sync cycle.
    Sync {
        channel: String,
        space: String,
        /// Only sync sources matching this name/locator fragment.
        #[arg(long)]
        source: Option<String>,
    },
}

pub async fn cli(shared_db: Arc<Mutex<DB<Event>>>, settings: RuntimeSettings) {
    // Fine to panic here
    let cli = Cli::parse();
    match cli.command {
        Commands::Create {
            title,
            start_time,
            duration_minutes,
            channel,
            space,
            roles,
            description,
            max_participants,
        } => {
            let roles = match parse_role_list(&roles) {
                Ok(roles) => roles,
                Err(err) => {
                    println!("Invalid roles: {}", err);
                    return;
                }
            };
            let mut db = shared_db.lock().await;
            match EventStore::create(
                &mut db,
                EventSpec {
                    title,
                    description,
                    start_time,
                    duration_minutes,
                    max_participants,
                    roles,
                    channel,
                    space,
                },
            ) {
                Ok(event) => println!("Created event {} ({})", event.title, event.id),
                Err(err) => println!("Failed to create event: {}", err),
            }
        }
        Commands::CreatePrompt { channel, space } => {
            if let Err(err) = create_event_from_prompt(&shared_db, channel, space).await {
                println!("Failed to create event: {}", err);
            }
        }
        Commands::List { space } => {
            let db = shared_db.lock().await;
            let mut events = EventStore::list_by_space(&db, &space);
            events.sort_by_key(|event| event.start_time);
            if events.is_empty() {
                println!("No events stored for space {}", space);
            }
            for event in events {
                println!(
                    "{}  {}  {} ({} min)",
                    event.id, event.start_time, event.title, event.duration_minutes
                );
            }
        }
        Commands::Show { id } => {
            let db = shared_db.lock().await;
            match EventStore::get(&db, &id) {
                Some(event) => {
                    println!(
                        "{}  {}  {} ({} min)",
                        event.id, event.start_time, event.title, event.duration_minutes
                    );
                    for role in &event.roles {
                        let users = event.signups.get(&role.name).cloned().unwrap_or_default();
                        let slots = match role.max_slots {
                            Some(max) => format!("{}/{}", users.len(), max),
                            None => format!("{}", users.len()),
                        };
                        println!("  {} {} ({}): {}", role.emoji, role.name, slots, users.join(", "));
                    }
                }
                None => println!("No event with id {}", id),
            }
        }
        Commands::Sync {
            channel,
            space,
            source,
        } => {
            let scheduler = build_scheduler(shared_db.clone(), &settings);
            let destination = SyncDestination { channel, space };
            let report = scheduler.trigger(&destination, source.as_deref()).await;
            println!("Sync: {}", report.message);
            for error in &report.source_errors {
                println!("  source {} failed: {}", error.source_name, error.message);
            }
        }
    }
}

async fn create_event_from_prompt(
    shared_db: &Arc<Mutex<DB<Event>>>,
    channel: String,
    space: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let title = Text::new("Event title:").prompt()?;
    let start_time = Text::new("Start time (RFC3339):").prompt()?;
    let duration: i64 = Text::new("Duration in minutes:")
        .with_default("60")
        .prompt()?
        .trim()
        .parse()?;
    let roles_raw = Text::new("Roles (name:emoji:slots, comma separated, empty for none):")
        .with_default("")
        .prompt()?;
    let roles = parse_role_list(&roles_raw).map_err(|e| -> Box<dyn std::error::Error> { e.into() })?;

    let mut db = shared_db.lock().await;
    let event = EventStore::create(
        &mut db,
        EventSpec {
            title,
            description: String::new(),
            start_time,
            duration_minutes: duration,
            max_participants: 0,
            roles,
            channel,
            space,
        },
    )?;
    println!("Created event {} ({})", event.title, event.id);
    Ok(())
}
