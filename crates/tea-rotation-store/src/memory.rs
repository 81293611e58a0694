//! In-memory storage implementation.
//!
//! All state sits behind a single `tokio::sync::RwLock`, so every trait method
//! is atomic with respect to the others. Conditional writes check and write
//! under the same write guard.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use tea_rotation_core::{
    NewUser, Order, OrderWithUser, Participant, Session, SessionCompletion, SessionId,
    SessionStatus, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::{ClaimOutcome, CommitClaim, Store};

#[derive(Debug, Clone)]
struct SessionRecord {
    session: Session,
    claim: Option<(Uuid, DateTime<Utc>)>,
    bookkept_for: Option<UserId>,
}

impl SessionRecord {
    fn accepts_orders(&self) -> bool {
        self.session.is_active() && self.claim.is_none() && self.bookkept_for.is_none()
    }

    fn held_by(&self, token: Uuid) -> bool {
        self.claim.is_some_and(|(held, _)| held == token)
    }
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, User>,
    sessions: HashMap<SessionId, SessionRecord>,
    orders: Vec<Order>,
    #[cfg(any(test, feature = "test-util"))]
    faults: Faults,
}

/// Injected failures for exercising error paths.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
struct Faults {
    failing_users: HashSet<UserId>,
    failing_completions: u32,
}

impl Inner {
    fn user_mut(&mut self, user_id: &UserId) -> Result<&mut User> {
        #[cfg(any(test, feature = "test-util"))]
        if self.faults.failing_users.contains(user_id) {
            return Err(StoreError::Database(format!(
                "injected write failure for user {user_id}"
            )));
        }
        self.users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::user_not_found(user_id))
    }

    fn ensure_accepts_orders(&self, session_id: &SessionId) -> Result<()> {
        let record = self
            .sessions
            .get(session_id)
            .ok_or_else(|| StoreError::session_not_found(session_id))?;
        if record.accepts_orders() {
            Ok(())
        } else {
            Err(StoreError::orders_closed())
        }
    }

    fn orders_of(&self, session_id: &SessionId) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self
            .orders
            .iter()
            .filter(|o| o.session_id == *session_id)
            .collect();
        orders.sort_by_key(|o| (o.created_at, o.user_id));
        orders
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed user, counters included.
    ///
    /// Lets tests and seed scripts start from existing rotation history.
    pub async fn insert_user(&self, user: User) {
        self.inner.write().await.users.insert(user.id, user);
    }

    /// Make every per-user write for `user_id` fail with a database error.
    ///
    /// Reads are unaffected. Used to exercise best-effort bookkeeping.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn fail_writes_for(&self, user_id: UserId) {
        self.inner.write().await.faults.failing_users.insert(user_id);
    }

    /// Make the next `times` calls to `complete_session` fail with a
    /// database error before touching the session.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn fail_completions(&self, times: u32) {
        self.inner.write().await.faults.failing_completions = times;
    }
}

#[async_trait]
impl Store for MemoryStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut user = User::new(new_user.name);
        user.auth_user_id = new_user.auth_user_id;
        self.inner.write().await.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.inner.read().await.users.values().cloned().collect();
        users.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(users)
    }

    async fn find_users_by_name(&self, name: &str) -> Result<Vec<User>> {
        let needle = name.to_lowercase();
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .filter(|u| u.name.to_lowercase() == needle)
            .cloned()
            .collect())
    }

    async fn find_user_by_auth_id(&self, auth_user_id: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.auth_user_id.as_deref() == Some(auth_user_id))
            .cloned())
    }

    async fn update_user_preferences(
        &self,
        user_id: &UserId,
        drink_type: &str,
        sugar_level: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let user = inner.user_mut(user_id)?;
        user.last_ordered_drink = Some(drink_type.to_string());
        user.last_sugar_level = Some(sugar_level.to_string());
        Ok(())
    }

    async fn increment_drink_count(&self, user_id: &UserId, amount: i64) -> Result<i64> {
        let mut inner = self.inner.write().await;
        let user = inner.user_mut(user_id)?;
        user.drink_count += amount;
        Ok(user.drink_count)
    }

    async fn increment_total_drinks_bought(&self, user_id: &UserId, amount: i64) -> Result<i64> {
        let mut inner = self.inner.write().await;
        let user = inner.user_mut(user_id)?;
        user.total_drinks_bought += amount;
        Ok(user.total_drinks_bought)
    }

    async fn set_last_assigned_at(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.user_mut(user_id)?.last_assigned_at = Some(at);
        Ok(())
    }

    // =========================================================================
    // Session Operations
    // =========================================================================

    async fn create_session(&self, now: DateTime<Utc>) -> Result<Session> {
        let mut inner = self.inner.write().await;
        if inner.sessions.values().any(|r| r.session.is_active()) {
            return Err(StoreError::Conflict(
                "an active session already exists".into(),
            ));
        }
        let session = Session::start(now);
        inner.sessions.insert(
            session.id,
            SessionRecord {
                session: session.clone(),
                claim: None,
                bookkept_for: None,
            },
        );
        Ok(session)
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>> {
        Ok(self
            .inner
            .read()
            .await
            .sessions
            .get(session_id)
            .map(|r| r.session.clone()))
    }

    async fn active_session(&self) -> Result<Option<Session>> {
        Ok(self
            .inner
            .read()
            .await
            .sessions
            .values()
            .find(|r| r.session.is_active())
            .map(|r| r.session.clone()))
    }

    async fn latest_completed_since(&self, cutoff: DateTime<Utc>) -> Result<Option<Session>> {
        Ok(self
            .inner
            .read()
            .await
            .sessions
            .values()
            .filter(|r| r.session.status == SessionStatus::Completed)
            .filter(|r| r.session.ended_at.is_some_and(|ended| ended >= cutoff))
            .max_by_key(|r| r.session.ended_at)
            .map(|r| r.session.clone()))
    }

    async fn claim_session(
        &self,
        session_id: &SessionId,
        claim: &CommitClaim,
    ) -> Result<ClaimOutcome> {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.sessions.get_mut(session_id) else {
            return Ok(ClaimOutcome::Refused);
        };
        if !record.session.is_active() {
            return Ok(ClaimOutcome::Refused);
        }
        let free = match record.claim {
            None => true,
            Some((_, claimed_at)) => claimed_at < claim.stale_before(),
        };
        if !free {
            return Ok(ClaimOutcome::Refused);
        }
        record.claim = Some((claim.token, claim.claimed_at));
        Ok(match record.bookkept_for {
            None => ClaimOutcome::Fresh,
            Some(assignee) => ClaimOutcome::Resumed { assignee },
        })
    }

    async fn mark_bookkeeping(
        &self,
        session_id: &SessionId,
        token: Uuid,
        assignee: &UserId,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.sessions.get_mut(session_id) else {
            return Ok(false);
        };
        if !record.session.is_active() || !record.held_by(token) || record.bookkept_for.is_some()
        {
            return Ok(false);
        }
        record.bookkept_for = Some(*assignee);
        Ok(true)
    }

    async fn release_claim(&self, session_id: &SessionId, token: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner.sessions.get_mut(session_id) {
            if record.held_by(token) {
                record.claim = None;
            }
        }
        Ok(())
    }

    async fn complete_session(
        &self,
        session_id: &SessionId,
        token: Uuid,
        completion: &SessionCompletion,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        #[cfg(any(test, feature = "test-util"))]
        if inner.faults.failing_completions > 0 {
            inner.faults.failing_completions -= 1;
            return Err(StoreError::Database("injected completion failure".into()));
        }
        let Some(record) = inner.sessions.get_mut(session_id) else {
            return Ok(false);
        };
        if !record.session.is_active() || !record.held_by(token) {
            return Ok(false);
        }
        record.session.complete(completion);
        record.claim = None;
        Ok(true)
    }

    async fn clear_active_sessions(&self) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let active: HashSet<SessionId> = inner
            .sessions
            .values()
            .filter(|r| r.session.is_active())
            .map(|r| r.session.id)
            .collect();
        inner.sessions.retain(|id, _| !active.contains(id));
        inner.orders.retain(|o| !active.contains(&o.session_id));
        Ok(active.len() as u64)
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    async fn upsert_order(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.ensure_accepts_orders(&order.session_id)?;
        if !inner.users.contains_key(&order.user_id) {
            return Err(StoreError::user_not_found(order.user_id));
        }
        let existing = inner
            .orders
            .iter()
            .position(|o| o.session_id == order.session_id && o.user_id == order.user_id);
        match existing {
            Some(idx) => inner.orders[idx] = order.clone(),
            None => inner.orders.push(order.clone()),
        }
        Ok(())
    }

    async fn delete_order(&self, session_id: &SessionId, user_id: &UserId) -> Result<bool> {
        let mut inner = self.inner.write().await;
        inner.ensure_accepts_orders(session_id)?;
        let before = inner.orders.len();
        inner
            .orders
            .retain(|o| !(o.session_id == *session_id && o.user_id == *user_id));
        Ok(inner.orders.len() != before)
    }

    async fn list_orders(&self, session_id: &SessionId) -> Result<Vec<OrderWithUser>> {
        let inner = self.inner.read().await;
        Ok(inner
            .orders_of(session_id)
            .into_iter()
            .map(|order| OrderWithUser {
                order: order.clone(),
                user_name: inner
                    .users
                    .get(&order.user_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn participating_orders(&self, session_id: &SessionId) -> Result<Vec<Participant>> {
        let inner = self.inner.read().await;
        Ok(inner
            .orders_of(session_id)
            .into_iter()
            .filter(|o| !o.is_excused)
            .filter_map(|order| {
                inner.users.get(&order.user_id).map(|user| Participant {
                    drink_type: order.drink_type.clone(),
                    sugar_level: order.sugar_level.clone(),
                    user: user.clone(),
                })
            })
            .collect())
    }
}
