use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::storage::StorageBackend;
use crate::store::{PersistentStore, StateUpdate};
use crate::task::Task;

pub const TASKS_STORAGE_KEY: &str = "tasks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl TaskFilter {
    pub const ALL: [TaskFilter; 3] = [TaskFilter::All, TaskFilter::Active, TaskFilter::Completed];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskFilter::All => "all",
            TaskFilter::Active => "active",
            TaskFilter::Completed => "completed",
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Active => !task.completed,
            TaskFilter::Completed => task.completed,
        }
    }

    pub fn empty_message(self) -> &'static str {
        match self {
            TaskFilter::All => "No tasks yet. Add your first task above!",
            TaskFilter::Active => "No active tasks. Great job!",
            TaskFilter::Completed => "No completed tasks yet.",
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(TaskFilter::All),
            "active" => Ok(TaskFilter::Active),
            "completed" | "done" => Ok(TaskFilter::Completed),
            other => Err(anyhow!(
                "unknown task filter: {other} (expected all, active or completed)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
}

impl TaskStats {
    pub fn count_for(&self, filter: TaskFilter) -> usize {
        match filter {
            TaskFilter::All => self.total,
            TaskFilter::Active => self.active,
            TaskFilter::Completed => self.completed,
        }
    }
}

/// Insertion order is preserved.
pub fn filtered_tasks(tasks: &[Task], filter: TaskFilter) -> Vec<&Task> {
    tasks.iter().filter(|task| filter.matches(task)).collect()
}

pub fn stats(tasks: &[Task]) -> TaskStats {
    let total = tasks.len();
    let completed = tasks.iter().filter(|task| task.completed).count();
    TaskStats {
        total,
        completed,
        active: total - completed,
    }
}

/// The task collection bound to the `"tasks"` storage key.
pub struct TaskList<B> {
    store: PersistentStore<Vec<Task>, B>,
}

impl<B: StorageBackend> TaskList<B> {
    /// Stored records with a blank title are dropped and completion
    /// mismatches are repaired; the repaired list is written back.
    pub fn open(backend: B) -> Self {
        let mut store = PersistentStore::open(backend, TASKS_STORAGE_KEY, Vec::<Task>::new());

        let mut repaired = 0;
        let mut tasks = Vec::with_capacity(store.get().len());
        for task in store.get() {
            if task.title.trim().is_empty() {
                warn!(id = %task.id, "dropping stored task with empty title");
                repaired += 1;
                continue;
            }
            let mut task = task.clone();
            if task.normalize() {
                warn!(id = %task.id, "repaired completion timestamp of stored task");
                repaired += 1;
            }
            tasks.push(task);
        }
        if repaired > 0 {
            store.set(tasks);
        }

        debug!(count = store.get().len(), repaired, "loaded task list");
        Self { store }
    }

    pub fn tasks(&self) -> &[Task] {
        self.store.get()
    }

    pub fn filtered(&self, filter: TaskFilter) -> Vec<&Task> {
        filtered_tasks(self.tasks(), filter)
    }

    pub fn stats(&self) -> TaskStats {
        stats(self.tasks())
    }

    pub fn find(&self, id: Uuid) -> Option<&Task> {
        self.tasks().iter().find(|task| task.id == id)
    }

    /// Resolves a full id or a unique prefix of its simple (dash-less) form.
    pub fn find_by_prefix(&self, prefix: &str) -> anyhow::Result<&Task> {
        let needle = prefix.trim().to_ascii_lowercase().replace('-', "");
        if needle.is_empty() {
            return Err(anyhow!("task id cannot be empty"));
        }

        let mut matches = self
            .tasks()
            .iter()
            .filter(|task| task.id.simple().to_string().starts_with(&needle));
        let first = matches
            .next()
            .ok_or_else(|| anyhow!("no task matches id {prefix}"))?;
        if matches.next().is_some() {
            return Err(anyhow!("task id {prefix} is ambiguous"));
        }
        Ok(first)
    }

    /// Returns the new id, or `None` when the trimmed title is empty.
    #[tracing::instrument(skip(self, now))]
    pub fn add(&mut self, title: &str, now: DateTime<Utc>) -> Option<Uuid> {
        let title = title.trim();
        if title.is_empty() {
            debug!("ignoring empty task title");
            return None;
        }

        let task = Task::new(title.to_string(), now);
        let id = task.id;
        self.store.set(StateUpdate::with(move |prev: &Vec<Task>| {
            let mut next = prev.clone();
            next.push(task);
            next
        }));
        info!(%id, "added task");
        Some(id)
    }

    /// Returns whether a task with `id` existed.
    #[tracing::instrument(skip(self, now))]
    pub fn toggle(&mut self, id: Uuid, now: DateTime<Utc>) -> bool {
        if self.find(id).is_none() {
            debug!(%id, "toggle ignored; no such task");
            return false;
        }

        self.store.set(StateUpdate::with(|prev: &Vec<Task>| {
            prev.iter()
                .cloned()
                .map(|mut task| {
                    if task.id == id {
                        task.toggle(now);
                    }
                    task
                })
                .collect()
        }));
        info!(%id, "toggled task");
        true
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, id: Uuid) -> bool {
        if self.find(id).is_none() {
            debug!(%id, "remove ignored; no such task");
            return false;
        }

        self.store.set(StateUpdate::with(|prev: &Vec<Task>| {
            prev.iter().filter(|task| task.id != id).cloned().collect()
        }));
        info!(%id, "removed task");
        true
    }

    #[tracing::instrument(skip(self))]
    pub fn clear(&mut self) -> usize {
        let removed = self.tasks().len();
        self.store.set(Vec::<Task>::new());
        info!(removed, "cleared task list");
        removed
    }
}
