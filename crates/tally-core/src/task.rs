use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::timestamp_serde;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,

    pub title: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(with = "timestamp_serde")]
    pub created_at: DateTime<Utc>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp_serde::option"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Timestamps are stored with millisecond precision, so they are held that way
/// in memory too.
fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

impl Task {
    /// Callers are expected to pass an already trimmed, non-empty title.
    pub fn new(title: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            completed: false,
            created_at: stored_precision(now),
            completed_at: None,
        }
    }

    /// Flips completion. `completed_at` tracks `completed`.
    pub fn toggle(&mut self, now: DateTime<Utc>) {
        self.completed = !self.completed;
        self.completed_at = if self.completed {
            Some(stored_precision(now))
        } else {
            None
        };
    }

    /// Repairs a stored record whose `completed_at` disagrees with
    /// `completed`. Returns whether anything changed.
    pub fn normalize(&mut self) -> bool {
        match (self.completed, self.completed_at) {
            (true, None) => {
                self.completed_at = Some(self.created_at);
                true
            }
            (false, Some(_)) => {
                self.completed_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}
