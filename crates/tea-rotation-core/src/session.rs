//! Tea sessions.
//!
//! A session is created active, collects orders, and is completed exactly once
//! by the assignment engine. Completed sessions are never reopened.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{SessionId, UserId};

/// Default window during which a just-completed session is still "current".
pub const DEFAULT_COMPLETED_GRACE_SECONDS: i64 = 300;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Collecting orders.
    Active,
    /// Summarized and closed.
    Completed,
}

impl SessionStatus {
    /// Column representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Parse the column representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One round of tea ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session id.
    pub id: SessionId,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// When the session was started.
    pub created_at: DateTime<Utc>,
    /// When the session was completed.
    pub ended_at: Option<DateTime<Utc>>,
    /// Display name of the assignee, set on completion.
    pub assignee_name: Option<String>,
    /// Number of participating orders at completion.
    pub total_drinks_in_session: Option<i64>,
    /// User who confirmed the assignee, when known.
    pub summarized_by: Option<UserId>,
}

impl Session {
    /// Start a new active session.
    #[must_use]
    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::generate(),
            status: SessionStatus::Active,
            created_at: now,
            ended_at: None,
            assignee_name: None,
            total_drinks_in_session: None,
            summarized_by: None,
        }
    }

    /// Whether the session still accepts orders and can be committed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Apply a completion record.
    pub fn complete(&mut self, completion: &SessionCompletion) {
        self.status = SessionStatus::Completed;
        self.ended_at = Some(completion.ended_at);
        self.assignee_name = Some(completion.assignee_name.clone());
        self.total_drinks_in_session = Some(completion.total_drinks_in_session);
        self.summarized_by = completion.summarized_by;
    }
}

/// Fields written when a session is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCompletion {
    /// Commit time.
    pub ended_at: DateTime<Utc>,
    /// Display name of the confirmed assignee.
    pub assignee_name: String,
    /// Number of participating orders.
    pub total_drinks_in_session: i64,
    /// Resolved summarizer, if any.
    pub summarized_by: Option<UserId>,
}

/// Earliest `ended_at` for which a completed session still counts as current.
#[must_use]
pub fn completed_grace_cutoff(now: DateTime<Utc>, grace_seconds: i64) -> DateTime<Utc> {
    now - Duration::seconds(grace_seconds.max(0))
}

/// Pick the current session from the active one and the latest completed one.
///
/// The active session always wins. Otherwise a completed session is current
/// only while its `ended_at` is within the grace window.
#[must_use]
pub fn current_session(
    active: Option<Session>,
    latest_completed: Option<Session>,
    now: DateTime<Utc>,
    grace_seconds: i64,
) -> Option<Session> {
    if active.is_some() {
        return active;
    }
    let cutoff = completed_grace_cutoff(now, grace_seconds);
    latest_completed.filter(|s| s.ended_at.is_some_and(|ended| ended >= cutoff))
}
