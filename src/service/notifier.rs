use serenity::async_trait;
use serenity::http::Http;
use serenity::model::id::ChannelId;

use crate::models::event::Event;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Posts an announcement for the event and returns an opaque message
    /// reference on success.
    async fn post(&self, event: &Event) -> Result<String, String>;
}

pub struct DiscordNotifier {
    token: String,
}

impl DiscordNotifier {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn post(&self, event: &Event) -> Result<String, String> {
        let channel = event
            .channel
            .parse::<u64>()
            .map(ChannelId::new)
            .map_err(|_| "Failed to parse channel id".to_string())?;
        let http: Http = Http::new(&self.token);
        let message = channel
            .say(&http, format_event_announcement(event))
            .await
            .map_err(|e| format!("Error posting event announcement: {:?}", e))?;
        Ok(message.id.to_string())
    }
}

pub fn format_event_announcement(event: &Event) -> String {
    let mut body = format!(
        "**{}**\nStarts: <t:{}:F> ({} min)",
        event.title,
        event.start_time.timestamp(),
        event.duration_minutes
    );
    if !event.description.trim().is_empty() {
        body.push_str(&format!("\n{}", event.description.trim()));
    }
    if let Some(info) = event.imported_from() {
        body.push_str(&format!("\nFrom calendar: {}", info.source_name));
        if let Some(link) = &info.link {
            body.push_str(&format!("\n{}", link));
        }
    }
    if event.max_participants > 0 {
        body.push_str(&format!("\nMax participants: {}", event.max_participants));
    }
    for role in &event.roles {
        let taken = event.signups.get(&role.name).map_or(0, |users| users.len());
        let slots = match role.max_slots {
            Some(max) => format!("{}/{}", taken, max),
            None => format!("{}", taken),
        };
        body.push_str(&format!("\n{} {} ({})", role.emoji, role.name, slots));
    }
    body
}
