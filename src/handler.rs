use serenity::all::{Command, CommandInteraction, CommandOptionType, Interaction};
use serenity::async_trait;
use serenity::builder::{
    CreateCommand,
    CreateCommandOption,
    CreateInteractionResponse,
    CreateInteractionResponseMessage,
};
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::event::{Event, Role};
use crate::service::event_store::{EventSpec, EventStore};
use crate::service::signup_service::{SignupError, SignupService};
use crate::service::sync_service::SyncDestination;
use crate::storage::DB;
use crate::tasks::sync_loop::SyncScheduler;

pub struct BotHandler {
    db: Arc<Mutex<DB<Event>>>,
    scheduler: Arc<SyncScheduler>,
    default_interval_ms: u64,
}

impl BotHandler {
    pub fn new(
        db: Arc<Mutex<DB<Event>>>,
        scheduler: Arc<SyncScheduler>,
        default_interval_ms: u64,
    ) -> Self {
        BotHandler {
            db,
            scheduler,
            default_interval_ms,
        }
    }
}

fn str_option(command: &CommandInteraction, name: &str) -> Option<String> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| match &opt.value {
            serenity::all::CommandDataOptionValue::String(s) => Some(s.clone()),
            _ => None,
        })
}

fn int_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| match &opt.value {
            serenity::all::CommandDataOptionValue::Integer(i) => Some(*i),
            _ => None,
        })
}

/// Parses "Tank:🛡️:2,Healer:💉" into roles; the slot count is optional.
pub fn parse_role_list(raw: &str) -> Result<Vec<Role>, String> {
    let mut roles = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let mut parts = entry.split(':');
        let name = parts.next().unwrap_or("").trim();
        let emoji = parts.next().unwrap_or("").trim();
        if name.is_empty() || emoji.is_empty() {
            return Err(format!("Invalid role entry: {}", entry));
        }
        let max_slots = match parts.next() {
            Some(raw_slots) => Some(
                raw_slots
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid slot count in role entry: {}", entry))?,
            ),
            None => None,
        };
        roles.push(Role {
            name: name.to_string(),
            emoji: emoji.to_string(),
            max_slots,
        });
    }
    Ok(roles)
}

impl BotHandler {
    async fn respond(&self, ctx: &Context, command: &CommandInteraction, content: String, ephemeral: bool) {
        let _ = command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content(content)
                        .ephemeral(ephemeral),
                ),
            )
            .await;
    }

    async fn handle_event_create(&self, ctx: &Context, command: &CommandInteraction) {
        let roles = match parse_role_list(&str_option(command, "roles").unwrap_or_default()) {
            Ok(roles) => roles,
            Err(err) => {
                self.respond(ctx, command, err, true).await;
                return;
            }
        };
        let spec = EventSpec {
            title: str_option(command, "title").unwrap_or_default(),
            description: str_option(command, "description").unwrap_or_default(),
            start_time: str_option(command, "start_time").unwrap_or_default(),
            duration_minutes: int_option(command, "duration").unwrap_or(60),
            max_participants: int_option(command, "max_participants").unwrap_or(0).max(0) as u32,
            roles,
            channel: command.channel_id.to_string(),
            space: command
                .guild_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        };

        let mut db = self.db.lock().await;
        match EventStore::create(&mut db, spec) {
            Ok(event) => {
                self.respond(
                    ctx,
                    command,
                    format!("Created event **{}** (id `{}`).", event.title, event.id),
                    false,
                )
                .await;
            }
            Err(err) => {
                self.respond(ctx, command, format!("Failed to create event: {}", err), true)
                    .await;
            }
        }
    }

    async fn handle_event_list(&self, ctx: &Context, command: &CommandInteraction) {
        let space = command
            .guild_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let db = self.db.lock().await;
        let mut events = EventStore::list_by_space(&db, &space);
        events.sort_by_key(|event| event.start_time);
        if events.is_empty() {
            self.respond(ctx, command, "No events scheduled.".to_string(), true)
                .await;
            return;
        }
        let mut body = String::from("Upcoming events:");
        for event in events {
            body.push_str(&format!(
                "\n`{}` — **{}** <t:{}:F>",
                event.id,
                event.title,
                event.start_time.timestamp()
            ));
        }
        self.respond(ctx, command, body, false).await;
    }

    async fn handle_event_delete(&self, ctx: &Context, command: &CommandInteraction) {
        let id = str_option(command, "id").unwrap_or_default();
        let mut db = self.db.lock().await;
        match EventStore::delete(&mut db, &id) {
            Ok(true) => {
                self.respond(ctx, command, format!("Deleted event `{}`.", id), false)
                    .await;
            }
            Ok(false) => {
                self.respond(ctx, command, format!("No event with id `{}`.", id), true)
                    .await;
            }
            Err(err) => {
                self.respond(ctx, command, format!("Failed to delete event: {}", err), true)
                    .await;
            }
        }
    }

    async fn handle_addrole(&self, ctx: &Context, command: &CommandInteraction) {
        let event_id = str_option(command, "event_id").unwrap_or_default();
        let role = Role {
            name: str_option(command, "name").unwrap_or_default(),
            emoji: str_option(command, "emoji").unwrap_or_default(),
            max_slots: int_option(command, "max_slots").map(|n| n.max(0) as u32),
        };
        let mut db = self.db.lock().await;
        match SignupService::add_role(&mut db, &event_id, role) {
            Ok(event) => {
                self.respond(
                    ctx,
                    command,
                    format!("Added role to **{}**.", event.title),
                    false,
                )
                .await;
            }
            Err(err) => {
                self.respond(ctx, command, signup_error_message(&err), true).await;
            }
        }
    }

    async fn handle_signup(&self, ctx: &Context, command: &CommandInteraction) {
        let event_id = str_option(command, "event_id").unwrap_or_default();
        let role_name = str_option(command, "role").unwrap_or_default();
        let user_id = command.user.id.to_string();
        let mut db = self.db.lock().await;
        match SignupService::signup(&mut db, &event_id, &user_id, &role_name) {
            Ok(event) => {
                self.respond(
                    ctx,
                    command,
                    format!("<@{}> signed up as **{}** for **{}**.", user_id, role_name, event.title),
                    false,
                )
                .await;
            }
            Err(err) => {
                self.respond(ctx, command, signup_error_message(&err), true).await;
            }
        }
    }

    async fn handle_leave(&self, ctx: &Context, command: &CommandInteraction) {
        let event_id = str_option(command, "event_id").unwrap_or_default();
        let user_id = command.user.id.to_string();
        let mut db = self.db.lock().await;
        match SignupService::leave(&mut db, &event_id, &user_id) {
            Ok(true) => {
                self.respond(ctx, command, format!("<@{}> left the event.", user_id), false)
                    .await;
            }
            Ok(false) => {
                self.respond(
                    ctx,
                    command,
                    "You were not signed up for this event.".to_string(),
                    true,
                )
                .await;
            }
            Err(err) => {
                self.respond(ctx, command, signup_error_message(&err), true).await;
            }
        }
    }

    fn destination_for(command: &CommandInteraction) -> SyncDestination {
        SyncDestination {
            channel: command.channel_id.to_string(),
            space: command
                .guild_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        }
    }

    async fn handle_sync_now(&self, ctx: &Context, command: &CommandInteraction) {
        let filter = str_option(command, "source");
        let destination = Self::destination_for(command);
        // Syncing talks to every configured calendar; ack first so the
        // interaction does not time out.
        let _ = command.defer(&ctx.http).await;
        let report = self.scheduler.trigger(&destination, filter.as_deref()).await;
        let mut body = format!("Sync: {}", report.message);
        for error in &report.source_errors {
            body.push_str(&format!("\n⚠️ {}: {}", error.source_name, error.message));
        }
        let _ = command
            .create_followup(
                &ctx.http,
                serenity::builder::CreateInteractionResponseFollowup::new().content(body),
            )
            .await;
    }

    async fn handle_sync_start(&self, ctx: &Context, command: &CommandInteraction) {
        let interval_ms = int_option(command, "interval_minutes")
            .map(|minutes| minutes.max(1) as u64 * 60 * 1000)
            .unwrap_or(self.default_interval_ms);
        let destination = Self::destination_for(command);
        let started = self.scheduler.start(destination, interval_ms).await;
        let body = if started {
            format!("Auto-sync started (every {} ms).", interval_ms)
        } else {
            "Auto-sync is already running.".to_string()
        };
        self.respond(ctx, command, body, false).await;
    }

    async fn handle_sync_stop(&self, ctx: &Context, command: &CommandInteraction) {
        let stopped = self.scheduler.stop().await;
        let body = if stopped {
            "Auto-sync stopped.".to_string()
        } else {
            "Auto-sync was not running.".to_string()
        };
        self.respond(ctx, command, body, false).await;
    }

    async fn handle_sync_status(&self, ctx: &Context, command: &CommandInteraction) {
        let status = self.scheduler.status().await;
        let body = if status.running {
            format!("Auto-sync running, interval {} ms.", status.interval_ms)
        } else {
            "Auto-sync is idle.".to_string()
        };
        self.respond(ctx, command, body, true).await;
    }
}

#[async_trait]
impl EventHandler for BotHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        println!("{} is connected!", ready.user.name);

        let commands = vec![
            CreateCommand::new("event_create")
                .description("Create a scheduled event")
                .add_option(
                    CreateCommandOption::new(CommandOptionType::String, "title", "Event title")
                        .required(true),
                )
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        "start_time",
                        "Start time, RFC3339 (e.g. 2026-03-01T20:00:00Z)",
                    )
                    .required(true),
                )
                .add_option(CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "duration",
                    "Duration in minutes",
                ))
                .add_option(CreateCommandOption::new(
                    CommandOptionType::String,
                    "description",
                    "Event description",
                ))
                .add_option(CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "max_participants",
                    "Maximum participants (0 = unlimited)",
                ))
                .add_option(CreateCommandOption::new(
                    CommandOptionType::String,
                    "roles",
                    "Roles as name:emoji:slots, comma separated",
                )),
            CreateCommand::new("event_list").description("List events in this server"),
            CreateCommand::new("event_delete")
                .description("Delete an event")
                .add_option(
                    CreateCommandOption::new(CommandOptionType::String, "id", "Event id")
                        .required(true),
                ),
            CreateCommand::new("addrole")
                .description("Add a signup role to an event")
                .add_option(
                    CreateCommandOption::new(CommandOptionType::String, "event_id", "Event id")
                        .required(true),
                )
                .add_option(
                    CreateCommandOption::new(CommandOptionType::String, "name", "Role name")
                        .required(true),
                )
                .add_option(
                    CreateCommandOption::new(CommandOptionType::String, "emoji", "Role emoji")
                        .required(true),
                )
                .add_option(CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "max_slots",
                    "Maximum slots for this role",
                )),
            CreateCommand::new("signup")
                .description("Sign up for an event role")
                .add_option(
                    CreateCommandOption::new(CommandOptionType::String, "event_id", "Event id")
                        .required(true),
                )
                .add_option(
                    CreateCommandOption::new(CommandOptionType::String, "role", "Role name")
                        .required(true),
                ),
            CreateCommand::new("leave")
                .description("Leave an event you signed up for")
                .add_option(
                    CreateCommandOption::new(CommandOptionType::String, "event_id", "Event id")
                        .required(true),
                ),
            CreateCommand::new("sync_now")
                .description("Run one calendar sync cycle now")
                .add_option(CreateCommandOption::new(
                    CommandOptionType::String,
                    "source",
                    "Only sync sources matching this name/locator fragment",
                )),
            CreateCommand::new("sync_start")
                .description("Start periodic calendar syncing into this channel")
                .add_option(CreateCommandOption::new(
                    CommandOptionType::Integer,
                    "interval_minutes",
                    "Minutes between sync cycles",
                )),
            CreateCommand::new("sync_stop").description("Stop periodic calendar syncing"),
            CreateCommand::new("sync_status").description("Show the sync scheduler state"),
        ];

        for builder in commands {
            let _ = Command::create_global_command(&ctx.http, builder).await;
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            match command.data.name.as_str() {
                "event_create" => self.handle_event_create(&ctx, &command).await,
                "event_list" => self.handle_event_list(&ctx, &command).await,
                "event_delete" => self.handle_event_delete(&ctx, &command).await,
                "addrole" => self.handle_addrole(&ctx, &command).await,
                "signup" => self.handle_signup(&ctx, &command).await,
                "leave" => self.handle_leave(&ctx, &command).await,
                "sync_now" => self.handle_sync_now(&ctx, &command).await,
                "sync_start" => self.handle_sync_start(&ctx, &command).await,
                "sync_stop" => self.handle_sync_stop(&ctx, &command).await,
                "sync_status" => self.handle_sync_status(&ctx, &command).await,
                _ => {}
            }
        }
    }
}

fn signup_error_message(err: &SignupError) -> String {
    match err {
        SignupError::EventNotFound => "No event with that id.".to_string(),
        SignupError::RoleNotFound => "That event has no such role.".to_string(),
        SignupError::RoleFull => "That role is already full.".to_string(),
        SignupError::DuplicateRole => "A role with that name already exists.".to_string(),
        SignupError::Storage(message) => format!("Storage error: {}", message),
    }
}
