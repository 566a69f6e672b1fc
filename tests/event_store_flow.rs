use std::collections::HashMap;
use std::env;
use std::sync::{Mutex, OnceLock};

use chrono::TimeZone;
use chrono::Utc;
use eventBot::calendar::NormalizedOccurrence;
use eventBot::models::event::{Event, EventOrigin};
use eventBot::service::event_store::{EventSpec, EventStore};
use eventBot::storage::DB;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn temp_db_location() -> std::sync::MutexGuard<'static, ()> {
    let guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
    let temp_dir = env::temp_dir().join(format!("eventbot_it_{}", uuid::Uuid::new_v4()));
    unsafe {
        env::set_var("DB_LOCATION", &temp_dir);
    }
    guard
}

fn occurrence(id: &str) -> NormalizedOccurrence {
    let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
    NormalizedOccurrence {
        source_name: "Guild".to_string(),
        source_id: "cal-a".to_string(),
        external_occurrence_id: id.to_string(),
        title: "Raid night".to_string(),
        description: "From the guild calendar".to_string(),
        start_time: start,
        end_time: start + chrono::Duration::minutes(30),
        link: Some("https://example.com/e1".to_string()),
    }
}

#[test]
fn importing_the_same_occurrence_twice_stores_one_event() {
    let _guard = temp_db_location();
    let mut db: DB<Event> = HashMap::new();

    let first = EventStore::import_if_new(&mut db, &occurrence("e1"), "123", "456")
        .expect("import should succeed");
    let second = EventStore::import_if_new(&mut db, &occurrence("e1"), "123", "456")
        .expect("import should succeed");

    let imported = first.expect("first import yields a new event");
    assert!(second.is_none());
    assert_eq!(db.len(), 1);

    assert_eq!(imported.title, "Raid night");
    assert_eq!(imported.duration_minutes, 30);
    assert_eq!(imported.channel, "123");
    match &imported.origin {
        EventOrigin::Imported(info) => {
            assert_eq!(info.dedup_key, "cal-a::e1");
            assert_eq!(info.source_name, "Guild");
            assert_eq!(info.link.as_deref(), Some("https://example.com/e1"));
        }
        EventOrigin::Manual => panic!("imported event must carry import metadata"),
    }
}

#[test]
fn imported_event_ids_are_deterministic() {
    let _guard = temp_db_location();
    let mut db_one: DB<Event> = HashMap::new();
    let mut db_two: DB<Event> = HashMap::new();

    let a = EventStore::import_if_new(&mut db_one, &occurrence("e1"), "123", "456")
        .unwrap()
        .unwrap();
    let b = EventStore::import_if_new(&mut db_two, &occurrence("e1"), "123", "456")
        .unwrap()
        .unwrap();
    assert_eq!(a.id, b.id);
}

#[test]
fn record_posted_reference_sets_the_ref_and_tolerates_deletion() {
    let _guard = temp_db_location();
    let mut db: DB<Event> = HashMap::new();

    let event = EventStore::import_if_new(&mut db, &occurrence("e1"), "123", "456")
        .unwrap()
        .unwrap();
    EventStore::record_posted_reference(&mut db, &event.id, "msg-1")
        .expect("recording should succeed");
    assert_eq!(
        db.get(&event.id).unwrap().posted_message_ref.as_deref(),
        Some("msg-1")
    );

    // Deleted between fetch and post: logged, not an error.
    EventStore::record_posted_reference(&mut db, "gone", "msg-2")
        .expect("unknown id is swallowed");
}

#[test]
fn list_by_space_filters_other_spaces() {
    let _guard = temp_db_location();
    let mut db: DB<Event> = HashMap::new();

    for (title, space) in [("one", "456"), ("two", "456"), ("elsewhere", "789")] {
        EventStore::create(
            &mut db,
            EventSpec {
                title: title.to_string(),
                description: String::new(),
                start_time: "2026-03-01T20:00:00Z".to_string(),
                duration_minutes: 60,
                max_participants: 0,
                roles: Vec::new(),
                channel: "123".to_string(),
                space: space.to_string(),
            },
        )
        .expect("create should succeed");
    }

    let events = EventStore::list_by_space(&db, "456");
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| event.space == "456"));
}
