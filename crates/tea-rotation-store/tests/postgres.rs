//! PostgreSQL backend tests.
//!
//! These need a disposable database and wipe its `public` schema, so they are
//! ignored by default:
//!
//! ```text
//! TEST_DATABASE_URL=postgres://localhost/tea_rotation_test \
//!     cargo test -p tea-rotation-store --test postgres -- --ignored
//! ```

#![cfg(feature = "postgres-backend")]

use chrono::{Duration, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use tea_rotation_core::{NewUser, Order, SessionCompletion, SessionId, SessionStatus, User};
use tea_rotation_store::{ClaimOutcome, CommitClaim, PgStore, Store, StoreError};

// Every test resets the same schema.
static DB_LOCK: Mutex<()> = Mutex::const_new(());

async fn create_test_db_pool() -> Pool<Postgres> {
    let url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/tea_rotation_test".to_string());

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .unwrap()
}

async fn clean_database(pool: &Pool<Postgres>) {
    sqlx::query("DROP SCHEMA public CASCADE")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("CREATE SCHEMA public")
        .execute(pool)
        .await
        .unwrap();
}

async fn fresh_store() -> (PgStore, MutexGuard<'static, ()>) {
    let guard = DB_LOCK.lock().await;
    let pool = create_test_db_pool().await;
    clean_database(&pool).await;
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    (PgStore::from_pool(pool), guard)
}

async fn user(store: &PgStore, name: &str) -> User {
    store
        .create_user(NewUser {
            name: name.into(),
            auth_user_id: None,
        })
        .await
        .unwrap()
}

fn completion(name: &str) -> SessionCompletion {
    SessionCompletion {
        ended_at: Utc::now(),
        assignee_name: name.into(),
        total_drinks_in_session: 1,
        summarized_by: None,
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn second_active_session_is_a_conflict() {
    let (store, _guard) = fresh_store().await;
    store.create_session(Utc::now()).await.unwrap();

    assert!(matches!(
        store.create_session(Utc::now()).await,
        Err(StoreError::Conflict(_))
    ));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn increments_are_atomic_adds() {
    let (store, _guard) = fresh_store().await;
    let alice = user(&store, "Alice").await;

    store.increment_drink_count(&alice.id, 1).await.unwrap();
    assert_eq!(store.increment_drink_count(&alice.id, 1).await.unwrap(), 2);
    assert_eq!(
        store.increment_total_drinks_bought(&alice.id, 3).await.unwrap(),
        3
    );
    assert!(matches!(
        store
            .increment_drink_count(&tea_rotation_core::UserId::generate(), 1)
            .await,
        Err(StoreError::NotFound { entity: "user", .. })
    ));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn claim_marker_resumes_after_lease_expiry() {
    let (store, _guard) = fresh_store().await;
    let alice = user(&store, "Alice").await;
    let now = Utc::now();
    let session = store.create_session(now).await.unwrap();
    let lease = Duration::seconds(60);

    let first = CommitClaim::new(now, lease);
    assert_eq!(
        store.claim_session(&session.id, &first).await.unwrap(),
        ClaimOutcome::Fresh
    );
    let rival = CommitClaim::new(now + Duration::seconds(5), lease);
    assert_eq!(
        store.claim_session(&session.id, &rival).await.unwrap(),
        ClaimOutcome::Refused
    );

    assert!(store
        .mark_bookkeeping(&session.id, first.token, &alice.id)
        .await
        .unwrap());
    assert!(!store
        .mark_bookkeeping(&session.id, first.token, &alice.id)
        .await
        .unwrap());

    let takeover = CommitClaim::new(now + Duration::seconds(120), lease);
    assert_eq!(
        store.claim_session(&session.id, &takeover).await.unwrap(),
        ClaimOutcome::Resumed { assignee: alice.id }
    );

    assert!(!store
        .complete_session(&session.id, first.token, &completion("Alice"))
        .await
        .unwrap());
    assert!(store
        .complete_session(&session.id, takeover.token, &completion("Alice"))
        .await
        .unwrap());

    let stored = store.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
    assert_eq!(stored.assignee_name.as_deref(), Some("Alice"));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn order_writes_respect_session_state() {
    let (store, _guard) = fresh_store().await;
    let alice = user(&store, "Alice").await;
    let now = Utc::now();
    let session = store.create_session(now).await.unwrap();
    let order = Order::new(session.id, alice.id, "Tea", "Normal", false);
    store.upsert_order(&order).await.unwrap();

    let unknown = Order::new(SessionId::generate(), alice.id, "Tea", "Normal", false);
    assert!(matches!(
        store.upsert_order(&unknown).await,
        Err(StoreError::NotFound { entity: "session", .. })
    ));

    let claim = CommitClaim::new(now, Duration::seconds(60));
    store.claim_session(&session.id, &claim).await.unwrap();
    assert_eq!(
        store.upsert_order(&order).await,
        Err(StoreError::orders_closed())
    );
    assert_eq!(
        store.delete_order(&session.id, &alice.id).await,
        Err(StoreError::orders_closed())
    );

    store.release_claim(&session.id, claim.token).await.unwrap();
    assert!(store.delete_order(&session.id, &alice.id).await.unwrap());
    assert!(!store.delete_order(&session.id, &alice.id).await.unwrap());
    assert!(!store
        .complete_session(&session.id, Uuid::new_v4(), &completion("Alice"))
        .await
        .unwrap());
}

#[tokio::test]
#[ignore = "requires PostgreSQL (TEST_DATABASE_URL)"]
async fn orders_with_equal_timestamps_list_by_user_id() {
    let (store, _guard) = fresh_store().await;
    let session = store.create_session(Utc::now()).await.unwrap();
    let placed_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

    let mut ids = Vec::new();
    for name in ["Alice", "Bob", "Carol"] {
        let u = user(&store, name).await;
        let mut order = Order::new(session.id, u.id, "Tea", "Normal", false);
        order.created_at = placed_at;
        store.upsert_order(&order).await.unwrap();
        ids.push(u.id);
    }
    ids.sort();

    let listed: Vec<_> = store
        .list_orders(&session.id)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.order.user_id)
        .collect();
    let participating: Vec<_> = store
        .participating_orders(&session.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.user.id)
        .collect();
    assert_eq!(listed, ids);
    assert_eq!(participating, ids);
}
