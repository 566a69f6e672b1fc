pub mod event_store;
pub mod notifier;
pub mod signup_service;
pub mod sync_service;
