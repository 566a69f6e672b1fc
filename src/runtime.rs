use std::sync::Arc;

use serenity::model::gateway::GatewayIntents;
use tokio::sync::Mutex;

use crate::calendar::aggregator::CalendarAggregator;
use crate::calendar::api_source::ApiSourceClient;
use crate::calendar::feed_source::FeedSourceClient;
use crate::handler;
use crate::models::event::Event;
use crate::models::source::CalendarSource;
use crate::service::notifier::DiscordNotifier;
use crate::service::sync_service::SyncDestination;
use crate::storage::DB;
use crate::tasks::sync_loop::SyncScheduler;

pub struct RuntimeSettings {
    pub discord_client_secret: String,
    pub calendar_api_token: String,
    pub sources: Vec<CalendarSource>,
    pub sync_interval_ms: u64,
    pub sync_window_seconds: u64,
    /// When configured, periodic syncing starts on boot.
    pub auto_sync_destination: Option<SyncDestination>,
}

pub fn build_scheduler(
    shared_db: Arc<Mutex<DB<Event>>>,
    settings: &RuntimeSettings,
) -> Arc<SyncScheduler> {
    let aggregator = Arc::new(CalendarAggregator::new(
        settings.sources.clone(),
        Arc::new(ApiSourceClient::new(settings.calendar_api_token.clone())),
        Arc::new(FeedSourceClient::new()),
    ));
    let notifier = Arc::new(DiscordNotifier::new(settings.discord_client_secret.clone()));
    Arc::new(SyncScheduler::new(
        shared_db,
        aggregator,
        notifier,
        settings.sync_window_seconds,
    ))
}

pub async fn run_api(shared_db: Arc<Mutex<DB<Event>>>, settings: RuntimeSettings) {
    let scheduler = build_scheduler(shared_db.clone(), &settings);

    if let Some(destination) = settings.auto_sync_destination.clone() {
        let scheduler = scheduler.clone();
        let interval_ms = settings.sync_interval_ms;
        tokio::spawn(async move {
            if scheduler.start(destination, interval_ms).await {
                println!("Auto-sync started on boot (every {} ms)", interval_ms);
            }
        });
    }

    let token = settings.discord_client_secret;
    let intents = GatewayIntents::GUILD_MESSAGES | GatewayIntents::DIRECT_MESSAGES;
    let mut client = serenity::Client::builder(token, intents)
        .event_handler(handler::BotHandler::new(
            shared_db,
            scheduler,
            settings.sync_interval_ms,
        ))
        .await
        .expect("Error creating Serenity client");

    if let Err(why) = client.start().await {
        eprintln!("Client error: {:?}", why);
    }
}
