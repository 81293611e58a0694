//! Storage layer for the tea rotation service.
//!
//! The [`Store`] trait is the data-store port the service is written against.
//! Two backends implement it:
//!
//! - [`MemoryStore`]: process-local, used by tests and single-node demos
//! - [`PgStore`]: PostgreSQL via `sqlx` (feature `postgres-backend`)
//!
//! # Write contract
//!
//! Counter updates are atomic increments at the store level, never
//! read-modify-write in the caller. Session completion is a conditional write
//! predicated on the session still being active and on the caller holding the
//! commit claim; a `false` return means zero rows were affected.
//!
//! Orders are frozen once a session is claimed or its bookkeeping has begun:
//! `upsert_order` and `delete_order` refuse such sessions with
//! `StoreError::Conflict`, so the participant set a committer reads after
//! claiming is the one it completes with.
//!
//! # Example
//!
//! ```no_run
//! use tea_rotation_core::NewUser;
//! use tea_rotation_store::{MemoryStore, Store};
//!
//! # async fn demo() -> tea_rotation_store::Result<()> {
//! let store = MemoryStore::new();
//! let alice = store
//!     .create_user(NewUser { name: "Alice".into(), auth_user_id: None })
//!     .await?;
//! store.increment_drink_count(&alice.id, 1).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
#[cfg(feature = "postgres-backend")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "postgres-backend")]
pub use postgres::PgStore;

use tea_rotation_core::{
    NewUser, Order, OrderWithUser, Participant, Session, SessionCompletion, SessionId, User,
    UserId,
};

/// A commit claim on an active session.
///
/// Held by exactly one committer at a time. A claim older than its lease is
/// considered abandoned and may be taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitClaim {
    /// Token identifying the holder.
    pub token: Uuid,
    /// When the claim was taken.
    pub claimed_at: DateTime<Utc>,
    /// How long the claim stays exclusive.
    pub lease: Duration,
}

impl CommitClaim {
    /// A fresh claim taken at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>, lease: Duration) -> Self {
        Self {
            token: Uuid::new_v4(),
            claimed_at: now,
            lease,
        }
    }

    /// Claims taken before this instant have expired.
    #[must_use]
    pub fn stale_before(&self) -> DateTime<Utc> {
        self.claimed_at - self.lease
    }
}

/// Result of [`Store::claim_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The session is not active, or another committer holds a live claim.
    Refused,
    /// Claimed, and no bookkeeping has been applied yet.
    Fresh,
    /// Claimed, but an earlier holder already applied the bookkeeping for
    /// `assignee`. Only the completion write is left.
    Resumed {
        /// Assignee the bookkeeping was applied for.
        assignee: UserId,
    },
}

/// The storage trait defining all data-store operations.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Insert a new user with zeroed counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create_user(&self, new_user: NewUser) -> Result<User>;

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// All users ordered by name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Users whose name equals `name` ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_users_by_name(&self, name: &str) -> Result<Vec<User>>;

    /// The user linked to an external auth subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_user_by_auth_id(&self, auth_user_id: &str) -> Result<Option<User>>;

    /// Overwrite the cached last drink and sugar level.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    async fn update_user_preferences(
        &self,
        user_id: &UserId,
        drink_type: &str,
        sugar_level: &str,
    ) -> Result<()>;

    /// Atomically add `amount` to `drink_count`. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    async fn increment_drink_count(&self, user_id: &UserId, amount: i64) -> Result<i64>;

    /// Atomically add `amount` to `total_drinks_bought`. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    async fn increment_total_drinks_bought(&self, user_id: &UserId, amount: i64) -> Result<i64>;

    /// Set `last_assigned_at`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    async fn set_last_assigned_at(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<()>;

    // =========================================================================
    // Session Operations
    // =========================================================================

    /// Start a new active session.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if an active session already exists.
    async fn create_session(&self, now: DateTime<Utc>) -> Result<Session>;

    /// Get a session by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>>;

    /// The active session, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn active_session(&self) -> Result<Option<Session>>;

    /// The most recently completed session with `ended_at >= cutoff`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn latest_completed_since(&self, cutoff: DateTime<Utc>) -> Result<Option<Session>>;

    /// Take the commit claim on an active session.
    ///
    /// Succeeds only if the session is active and unclaimed, or its existing
    /// claim is older than the lease. A successful claim reports whether
    /// bookkeeping was already recorded by [`Store::mark_bookkeeping`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn claim_session(
        &self,
        session_id: &SessionId,
        claim: &CommitClaim,
    ) -> Result<ClaimOutcome>;

    /// Record that bookkeeping for `assignee` starts under the claim `token`.
    ///
    /// The marker outlives the claim: every later claim on the session comes
    /// back [`ClaimOutcome::Resumed`]. Returns `false` if the session is not
    /// active, the token doesn't hold the claim, or a marker already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn mark_bookkeeping(
        &self,
        session_id: &SessionId,
        token: Uuid,
        assignee: &UserId,
    ) -> Result<bool>;

    /// Drop a claim held under `token`. No-op if the token doesn't match.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn release_claim(&self, session_id: &SessionId, token: Uuid) -> Result<()>;

    /// Mark a claimed active session completed.
    ///
    /// Updates only if the session is still active and claimed under `token`.
    /// Returns `false` when zero rows matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn complete_session(
        &self,
        session_id: &SessionId,
        token: Uuid,
        completion: &SessionCompletion,
    ) -> Result<bool>;

    /// Delete every active session together with its orders.
    ///
    /// Returns the number of sessions removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn clear_active_sessions(&self) -> Result<u64>;

    // =========================================================================
    // Order Operations
    // =========================================================================

    /// Insert or replace the order for `(session_id, user_id)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the session or user doesn't exist,
    /// and `StoreError::Conflict` if the session no longer accepts orders.
    async fn upsert_order(&self, order: &Order) -> Result<()>;

    /// Remove the order for `(session_id, user_id)`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the session doesn't exist, and
    /// `StoreError::Conflict` if it no longer accepts orders.
    async fn delete_order(&self, session_id: &SessionId, user_id: &UserId) -> Result<bool>;

    /// All orders of a session with user names, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_orders(&self, session_id: &SessionId) -> Result<Vec<OrderWithUser>>;

    /// Non-excused orders of a session joined with their users, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn participating_orders(&self, session_id: &SessionId) -> Result<Vec<Participant>>;
}
