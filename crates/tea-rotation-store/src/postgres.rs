//! PostgreSQL storage implementation.
//!
//! Counters are bumped with `SET x = x + $n` so concurrent commits never lose
//! an update. Session completion is an `UPDATE ... WHERE status = 'active'`
//! that also matches the commit token; zero affected rows means some other
//! committer got there first.
//!
//! Order writes lock the session row `FOR SHARE` and re-check that it still
//! accepts orders, so they serialize against the claim update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use tea_rotation_core::{
    NewUser, Order, OrderWithUser, Participant, Session, SessionCompletion, SessionId,
    SessionStatus, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::{ClaimOutcome, CommitClaim, Store};

const USER_COLUMNS: &str = "id, name, auth_user_id, drink_count, total_drinks_bought, \
     last_assigned_at, last_ordered_drink, last_sugar_level, created_at";

const SESSION_COLUMNS: &str =
    "id, status, created_at, ended_at, assignee_name, total_drinks_in_session, summarized_by";

/// PostgreSQL-backed storage implementation.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database and run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!(max_connections, "PostgreSQL store ready");

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Migrations are the caller's responsibility.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Why an order write matched no session row.
    async fn order_refusal(&self, session_id: &SessionId) -> Result<StoreError> {
        let exists = sqlx::query("SELECT 1 FROM sessions WHERE id = $1")
            .bind(*session_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        Ok(if exists {
            StoreError::orders_closed()
        } else {
            StoreError::session_not_found(session_id)
        })
    }
}

fn expect_user_row(user_id: &UserId, rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        return Err(StoreError::user_not_found(user_id));
    }
    Ok(())
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        auth_user_id: row.try_get("auth_user_id")?,
        drink_count: row.try_get("drink_count")?,
        total_drinks_bought: row.try_get("total_drinks_bought")?,
        last_assigned_at: row.try_get::<Option<DateTime<Utc>>, _>("last_assigned_at")?,
        last_ordered_drink: row.try_get("last_ordered_drink")?,
        last_sugar_level: row.try_get("last_sugar_level")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn session_from_row(row: &PgRow) -> Result<Session> {
    let status: String = row.try_get("status")?;
    let status = SessionStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown session status: {status}")))?;

    Ok(Session {
        id: SessionId::from_uuid(row.try_get("id")?),
        status,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        ended_at: row.try_get::<Option<DateTime<Utc>>, _>("ended_at")?,
        assignee_name: row.try_get("assignee_name")?,
        total_drinks_in_session: row.try_get("total_drinks_in_session")?,
        summarized_by: row
            .try_get::<Option<Uuid>, _>("summarized_by")?
            .map(UserId::from_uuid),
    })
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    Ok(Order {
        session_id: SessionId::from_uuid(row.try_get("session_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        drink_type: row.try_get("drink_type")?,
        sugar_level: row.try_get("sugar_level")?,
        is_excused: row.try_get("is_excused")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl Store for PgStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut user = User::new(new_user.name);
        user.auth_user_id = new_user.auth_user_id;

        sqlx::query(
            r"
            INSERT INTO users (id, name, auth_user_id, created_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(*user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.auth_user_id)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(*user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY lower(name) ASC, created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn find_users_by_name(&self, name: &str) -> Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(name) = lower($1)"
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn find_user_by_auth_id(&self, auth_user_id: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE auth_user_id = $1"
        ))
        .bind(auth_user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn update_user_preferences(
        &self,
        user_id: &UserId,
        drink_type: &str,
        sugar_level: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET last_ordered_drink = $1,
                last_sugar_level = $2
            WHERE id = $3
            ",
        )
        .bind(drink_type)
        .bind(sugar_level)
        .bind(*user_id.as_uuid())
        .execute(&self.pool)
        .await?;

        expect_user_row(user_id, result.rows_affected())
    }

    async fn increment_drink_count(&self, user_id: &UserId, amount: i64) -> Result<i64> {
        let row = sqlx::query(
            "UPDATE users SET drink_count = drink_count + $1 WHERE id = $2 RETURNING drink_count",
        )
        .bind(amount)
        .bind(*user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::user_not_found(user_id))?;

        Ok(row.try_get("drink_count")?)
    }

    async fn increment_total_drinks_bought(&self, user_id: &UserId, amount: i64) -> Result<i64> {
        let row = sqlx::query(
            r"
            UPDATE users
            SET total_drinks_bought = total_drinks_bought + $1
            WHERE id = $2
            RETURNING total_drinks_bought
            ",
        )
        .bind(amount)
        .bind(*user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::user_not_found(user_id))?;

        Ok(row.try_get("total_drinks_bought")?)
    }

    async fn set_last_assigned_at(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE users SET last_assigned_at = $1 WHERE id = $2")
            .bind(at)
            .bind(*user_id.as_uuid())
            .execute(&self.pool)
            .await?;

        expect_user_row(user_id, result.rows_affected())
    }

    // =========================================================================
    // Session Operations
    // =========================================================================

    async fn create_session(&self, now: DateTime<Utc>) -> Result<Session> {
        let session = Session::start(now);

        // The partial unique index rejects a second active row.
        sqlx::query("INSERT INTO sessions (id, status, created_at) VALUES ($1, $2, $3)")
            .bind(*session.id.as_uuid())
            .bind(session.status.as_str())
            .bind(session.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => {
                    StoreError::Conflict("an active session already exists".into())
                }
                other => other,
            })?;

        Ok(session)
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(*session_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn active_session(&self) -> Result<Option<Session>> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE status = 'active' LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn latest_completed_since(&self, cutoff: DateTime<Utc>) -> Result<Option<Session>> {
        let row = sqlx::query(&format!(
            r"
            SELECT {SESSION_COLUMNS} FROM sessions
            WHERE status = 'completed' AND ended_at >= $1
            ORDER BY ended_at DESC
            LIMIT 1
            "
        ))
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn claim_session(
        &self,
        session_id: &SessionId,
        claim: &CommitClaim,
    ) -> Result<ClaimOutcome> {
        let row = sqlx::query(
            r"
            UPDATE sessions
            SET commit_token = $1,
                commit_claimed_at = $2
            WHERE id = $3
              AND status = 'active'
              AND (commit_token IS NULL OR commit_claimed_at < $4)
            RETURNING bookkept_for
            ",
        )
        .bind(claim.token)
        .bind(claim.claimed_at)
        .bind(*session_id.as_uuid())
        .bind(claim.stale_before())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(ClaimOutcome::Refused);
        };
        Ok(match row.try_get::<Option<Uuid>, _>("bookkept_for")? {
            None => ClaimOutcome::Fresh,
            Some(assignee) => ClaimOutcome::Resumed {
                assignee: UserId::from_uuid(assignee),
            },
        })
    }

    async fn mark_bookkeeping(
        &self,
        session_id: &SessionId,
        token: Uuid,
        assignee: &UserId,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE sessions
            SET bookkept_for = $1
            WHERE id = $2
              AND status = 'active'
              AND commit_token = $3
              AND bookkept_for IS NULL
            ",
        )
        .bind(*assignee.as_uuid())
        .bind(*session_id.as_uuid())
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_claim(&self, session_id: &SessionId, token: Uuid) -> Result<()> {
        sqlx::query(
            r"
            UPDATE sessions
            SET commit_token = NULL,
                commit_claimed_at = NULL
            WHERE id = $1 AND commit_token = $2
            ",
        )
        .bind(*session_id.as_uuid())
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete_session(
        &self,
        session_id: &SessionId,
        token: Uuid,
        completion: &SessionCompletion,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE sessions
            SET status = 'completed',
                ended_at = $1,
                assignee_name = $2,
                total_drinks_in_session = $3,
                summarized_by = $4,
                commit_token = NULL,
                commit_claimed_at = NULL
            WHERE id = $5
              AND status = 'active'
              AND commit_token = $6
            ",
        )
        .bind(completion.ended_at)
        .bind(&completion.assignee_name)
        .bind(completion.total_drinks_in_session)
        .bind(completion.summarized_by.map(|id| *id.as_uuid()))
        .bind(*session_id.as_uuid())
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear_active_sessions(&self) -> Result<u64> {
        // Orders go with their session through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM sessions WHERE status = 'active'")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Order Operations
    // =========================================================================

    async fn upsert_order(&self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r"
            INSERT INTO orders (session_id, user_id, drink_type, sugar_level, is_excused, created_at)
            SELECT s.id, $2, $3, $4, $5, $6
            FROM sessions s
            WHERE s.id = $1
              AND s.status = 'active'
              AND s.commit_token IS NULL
              AND s.bookkept_for IS NULL
            FOR SHARE OF s
            ON CONFLICT (session_id, user_id) DO UPDATE
            SET drink_type = EXCLUDED.drink_type,
                sugar_level = EXCLUDED.sugar_level,
                is_excused = EXCLUDED.is_excused,
                created_at = EXCLUDED.created_at
            ",
        )
        .bind(*order.session_id.as_uuid())
        .bind(*order.user_id.as_uuid())
        .bind(&order.drink_type)
        .bind(&order.sugar_level)
        .bind(order.is_excused)
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_foreign_key_violation() {
                    return if db.constraint() == Some("orders_user_id_fkey") {
                        StoreError::user_not_found(order.user_id)
                    } else {
                        StoreError::session_not_found(order.session_id)
                    };
                }
            }
            StoreError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(self.order_refusal(&order.session_id).await?);
        }
        Ok(())
    }

    async fn delete_order(&self, session_id: &SessionId, user_id: &UserId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let open = sqlx::query(
            r"
            SELECT 1 FROM sessions
            WHERE id = $1
              AND status = 'active'
              AND commit_token IS NULL
              AND bookkept_for IS NULL
            FOR SHARE
            ",
        )
        .bind(*session_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        if open.is_none() {
            drop(tx);
            return Err(self.order_refusal(session_id).await?);
        }

        let result = sqlx::query("DELETE FROM orders WHERE session_id = $1 AND user_id = $2")
            .bind(*session_id.as_uuid())
            .bind(*user_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_orders(&self, session_id: &SessionId) -> Result<Vec<OrderWithUser>> {
        let rows = sqlx::query(
            r"
            SELECT o.session_id, o.user_id, o.drink_type, o.sugar_level, o.is_excused,
                   o.created_at, u.name AS user_name
            FROM orders o
            JOIN users u ON u.id = o.user_id
            WHERE o.session_id = $1
            ORDER BY o.created_at ASC, o.user_id ASC
            ",
        )
        .bind(*session_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(OrderWithUser {
                    order: order_from_row(row)?,
                    user_name: row.try_get("user_name")?,
                })
            })
            .collect()
    }

    async fn participating_orders(&self, session_id: &SessionId) -> Result<Vec<Participant>> {
        let rows = sqlx::query(
            r"
            SELECT o.drink_type, o.sugar_level,
                   u.id, u.name, u.auth_user_id, u.drink_count, u.total_drinks_bought,
                   u.last_assigned_at, u.last_ordered_drink, u.last_sugar_level, u.created_at
            FROM orders o
            JOIN users u ON u.id = o.user_id
            WHERE o.session_id = $1 AND o.is_excused = FALSE
            ORDER BY o.created_at ASC, o.user_id ASC
            ",
        )
        .bind(*session_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Participant {
                    drink_type: row.try_get("drink_type")?,
                    sugar_level: row.try_get("sugar_level")?,
                    user: user_from_row(row)?,
                })
            })
            .collect()
    }
}
