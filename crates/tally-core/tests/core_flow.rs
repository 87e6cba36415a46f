use std::fs;

use chrono::Utc;
use tally_core::storage::{FileStorage, StorageBackend};
use tally_core::tasks::{TaskFilter, TaskList};
use tempfile::tempdir;

#[test]
fn task_lifecycle_is_mirrored_to_disk() {
    let temp = tempdir().expect("tempdir");
    let storage = FileStorage::open(temp.path()).expect("open storage");
    let mut list = TaskList::open(&storage);
    assert!(list.tasks().is_empty());

    let id = list.add("Buy milk", Utc::now()).expect("task added");
    let stats = list.stats();
    assert_eq!((stats.total, stats.active, stats.completed), (1, 1, 0));

    assert!(list.toggle(id, Utc::now()));
    let stats = list.stats();
    assert_eq!((stats.total, stats.active, stats.completed), (1, 0, 1));
    assert!(list.find(id).expect("task present").completed_at.is_some());

    let reopened = TaskList::open(&storage);
    let task = reopened.find(id).expect("persisted task");
    assert!(task.completed);
    assert!(task.completed_at.is_some());
    assert_eq!(reopened.filtered(TaskFilter::Completed).len(), 1);

    assert!(list.remove(id));
    assert!(list.tasks().is_empty());

    let reopened = TaskList::open(&storage);
    assert!(reopened.tasks().is_empty());
    assert_eq!(
        storage.get_item("tasks").expect("read"),
        Some("[]".to_string())
    );
}

#[test]
fn corrupted_task_file_falls_back_to_empty() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("tasks.json"), "[{\"id\": 42").expect("write");

    let storage = FileStorage::open(temp.path()).expect("open storage");
    let mut list = TaskList::open(&storage);
    assert!(list.tasks().is_empty());

    list.add("fresh start", Utc::now());
    let reopened = TaskList::open(&storage);
    assert_eq!(reopened.tasks().len(), 1);
}

#[test]
fn browser_exported_tasks_load_with_real_timestamps() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join("tasks.json"),
        r#"[
            {"id":"6f1c0e4a-1b2c-4d3e-8f90-a1b2c3d4e5f6","title":"Water plants",
             "completed":false,"createdAt":"2026-05-01T08:00:00.000Z"},
            {"id":"7a2d1f5b-2c3d-4e4f-9a01-b2c3d4e5f6a7","title":"Pay rent",
             "completed":true,"createdAt":"2026-05-01T08:00:00.000Z",
             "completedAt":"2026-05-02T09:30:00.000Z"}
        ]"#,
    )
    .expect("write");

    let storage = FileStorage::open(temp.path()).expect("open storage");
    let list = TaskList::open(&storage);
    assert_eq!(list.tasks().len(), 2);

    let done = &list.tasks()[1];
    let completed_at = done.completed_at.expect("completed_at parsed");
    assert!(completed_at > done.created_at);
    assert_eq!(list.filtered(TaskFilter::Active)[0].title, "Water plants");
}
