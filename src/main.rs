#![allow(non_snake_case)]

mod calendar;
mod cli;
mod config;
mod handler;
mod models;
mod runtime;
mod service;
mod storage;
mod tasks;

use std::env;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::models::event;
use crate::models::event::Event;
use crate::runtime::RuntimeSettings;
use crate::service::sync_service::SyncDestination;
use crate::storage::{DB, load_db};

const DEFAULT_RUN_MODE: &str = "cli";

#[tokio::main]
async fn main() {
    let config = match env::var("CONFIG_FILE") {
        Ok(path) => AppConfig::from_file(&path).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    };

    let db: DB<Event> = load_db(&event::get_db_location()).expect("Unable to load event database.");
    let shared_db = Arc::new(tokio::sync::Mutex::new(db));

    let sources = config
        .calendar_sources()
        .unwrap_or_else(|err| {
            println!("Ignoring CALENDAR_SOURCES: {}", err);
            Vec::new()
        });

    let auto_sync_destination = match (config.get("SYNC_CHANNEL_ID"), config.get("SYNC_GUILD_ID")) {
        (Some(channel), Some(space)) => Some(SyncDestination { channel, space }),
        _ => None,
    };

    let run_mode = config.get("RUN_MODE").unwrap_or(DEFAULT_RUN_MODE.to_string());
    if run_mode == "api" {
        let discord_client_secret = config
            .get("DISCORD_CLIENT_SECRET")
            .expect("DISCORD_CLIENT_SECRET must be set for bot mode");
        let settings = RuntimeSettings {
            discord_client_secret,
            calendar_api_token: config.get("CALENDAR_API_TOKEN").unwrap_or_default(),
            sources,
            sync_interval_ms: config.sync_interval_ms(),
            sync_window_seconds: config.sync_window_seconds(),
            auto_sync_destination,
        };
        runtime::run_api(shared_db.clone(), settings).await;
    } else if run_mode == "cli" {
        let settings = RuntimeSettings {
            discord_client_secret: config.get("DISCORD_CLIENT_SECRET").unwrap_or_default(),
            calendar_api_token: config.get("CALENDAR_API_TOKEN").unwrap_or_default(),
            sources,
            sync_interval_ms: config.sync_interval_ms(),
            sync_window_seconds: config.sync_window_seconds(),
            auto_sync_destination,
        };
        cli::cli(shared_db.clone(), settings).await;
    } else {
        println!("Invalid run mode {}", run_mode);
    }
}
