use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::init_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = ActionLog::new(ActionType::CreateClass, "admin-1")
        .with_class("class-1")
        .with_payload(json!({"name": "高等数学"}))
        .with_detail("创建教学班");
    let id = repo.insert(&log).unwrap();

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found.action_type, ActionType::CreateClass);
    assert_eq!(found.class_id.as_deref(), Some("class-1"));
    assert_eq!(found.payload_json, Some(json!({"name": "高等数学"})));
}

#[test]
fn test_find_by_class_only_returns_that_class() {
    let repo = ActionLogRepository::new(setup_test_db());

    repo.insert(&ActionLog::new(ActionType::CreateClass, "u").with_class("c1"))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::CancelClassDates, "u").with_class("c1"))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::CreateClass, "u").with_class("c2"))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::CreateTimeInterval, "u"))
        .unwrap();

    let logs = repo.find_by_class("c1").unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.class_id.as_deref() == Some("c1")));
}

#[test]
fn test_find_recent_respects_limit() {
    let repo = ActionLogRepository::new(setup_test_db());
    for _ in 0..5 {
        repo.insert(&ActionLog::new(ActionType::UpdateClass, "u"))
            .unwrap();
    }
    assert_eq!(repo.find_recent(3).unwrap().len(), 3);
}
