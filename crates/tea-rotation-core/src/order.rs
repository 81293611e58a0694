//! Drink orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SessionId, User, UserId};

/// Default drink when a user has no remembered preference.
pub const DEFAULT_DRINK: &str = "Tea";

/// Default sugar level when a user has no remembered preference.
pub const DEFAULT_SUGAR_LEVEL: &str = "Normal";

/// One user's drink request within a session.
///
/// There is at most one order per `(session_id, user_id)`; placing a second
/// order replaces the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Session the order belongs to.
    pub session_id: SessionId,
    /// Ordering user.
    pub user_id: UserId,
    /// Requested drink, e.g. "Tea".
    pub drink_type: String,
    /// Requested sugar level, e.g. "Normal", "Less", "No Sugar".
    pub sugar_level: String,
    /// Excused orders are shown but take no part in fairness accounting.
    pub is_excused: bool,
    /// Submission time of the latest version.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create an order stamped with the current time.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        drink_type: impl Into<String>,
        sugar_level: impl Into<String>,
        is_excused: bool,
    ) -> Self {
        Self {
            session_id,
            user_id,
            drink_type: drink_type.into(),
            sugar_level: sugar_level.into(),
            is_excused,
            created_at: Utc::now(),
        }
    }
}

/// An order joined with its user's display name, for listings and summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWithUser {
    /// The order.
    #[serde(flatten)]
    pub order: Order,
    /// The ordering user's display name.
    pub user_name: String,
}

/// A non-excused order joined with its full user row.
///
/// This is the input to ranking and to the commit bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Requested drink.
    pub drink_type: String,
    /// Requested sugar level.
    pub sugar_level: String,
    /// The participating user.
    pub user: User,
}

impl Participant {
    /// The participating user's id.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user.id
    }
}
