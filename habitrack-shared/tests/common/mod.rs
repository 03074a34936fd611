//! Shared fixtures for database-backed tests
//!
//! Tests need `DATABASE_URL` pointing at a disposable PostgreSQL database.
//! When it is unset, [`test_pool`] returns `None` and the test returns early.
//! Every fixture user gets a random email/username, so tests can run in
//! parallel against one database without cleanup.

#![allow(dead_code)]

use habitrack_shared::db::migrations::run_migrations;
use habitrack_shared::db::pool::{create_pool, DatabaseConfig};
use habitrack_shared::models::habit::Frequency;
use habitrack_shared::models::tag::NewTag;
use habitrack_shared::policy::Actor;
use habitrack_shared::service::habits::CreateHabit;
use habitrack_shared::service::{tags, users};
use sqlx::PgPool;
use uuid::Uuid;

pub const PASSWORD: &str = "Str0ng!Passw0rd";

pub async fn test_pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();

    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return None;
    };

    let pool = create_pool(DatabaseConfig::new(url).with_max_connections(5))
        .await
        .expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to run migrations");

    Some(pool)
}

/// Registers a fresh user and returns it as an actor
pub async fn new_actor(pool: &PgPool) -> Actor {
    let suffix = Uuid::new_v4().simple().to_string();

    let user = users::register(
        pool,
        users::Registration {
            email: format!("user-{}@example.com", &suffix[..12]),
            username: format!("user_{}", &suffix[..12]),
            password: PASSWORD.to_string(),
            first_name: Some("Test".to_string()),
            last_name: None,
        },
    )
    .await
    .expect("Failed to register test user");

    Actor::new(user.id)
}

pub async fn new_tag(pool: &PgPool, actor: &Actor, name: &str) -> Uuid {
    tags::create_tag(
        pool,
        actor,
        NewTag {
            name: name.to_string(),
            color: "#10B981".to_string(),
        },
    )
    .await
    .expect("Failed to create tag")
    .tag
    .id
}

pub async fn system_tag(pool: &PgPool, name: &str) -> Uuid {
    sqlx::query_scalar(
        "SELECT id FROM tags WHERE created_by_id IS NULL AND name = $1 AND deleted_at IS NULL",
    )
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("Seeded system tag missing")
}

pub fn daily_habit(name: &str, tag_ids: Vec<Uuid>) -> CreateHabit {
    CreateHabit {
        name: name.to_string(),
        description: None,
        frequency: Frequency::Daily,
        target_count: 1,
        is_active: true,
        tag_ids,
    }
}
