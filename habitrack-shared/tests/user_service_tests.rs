/// Account operations and migrations against a live database
///
/// Run with: DATABASE_URL=postgresql://... cargo test --test user_service_tests

mod common;

use habitrack_shared::db::migrations::{migration_status, run_migrations};
use habitrack_shared::error::CoreError;
use habitrack_shared::patch::Patch;
use habitrack_shared::service::users::{
    authenticate, delete_account, get_profile, register, update_profile, ProfileChanges,
    Registration,
};
use uuid::Uuid;

fn registration() -> Registration {
    let suffix = Uuid::new_v4().simple().to_string();
    Registration {
        email: format!("Person-{}@Example.com", &suffix[..10]),
        username: format!("person_{}", &suffix[..10]),
        password: common::PASSWORD.to_string(),
        first_name: Some("Pat".to_string()),
        last_name: Some("Doe".to_string()),
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let Some(pool) = common::test_pool().await else { return };

    run_migrations(&pool).await.unwrap();
    let status = migration_status(&pool).await.unwrap();

    assert!(status.is_up_to_date());
    assert!(status.applied.len() >= 3);
}

#[tokio::test]
async fn test_register_and_login_by_email_or_username() {
    let Some(pool) = common::test_pool().await else { return };
    let input = registration();
    let username = input.username.clone();
    let email = input.email.clone();

    let user = register(&pool, input).await.unwrap();
    assert_eq!(user.email, email.to_lowercase());
    assert_ne!(user.password_hash, common::PASSWORD);

    let by_email = authenticate(&pool, &email, common::PASSWORD).await.unwrap();
    assert_eq!(by_email.map(|u| u.id), Some(user.id));

    let by_username = authenticate(&pool, &username, common::PASSWORD).await.unwrap();
    assert_eq!(by_username.map(|u| u.id), Some(user.id));

    assert!(authenticate(&pool, &username, "Wr0ng!password")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let Some(pool) = common::test_pool().await else { return };
    let input = registration();
    register(&pool, input.clone()).await.unwrap();

    let mut again = registration();
    again.email = input.email;

    let err = register(&pool, again).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(ref msg) if msg.contains("Email")));
}

#[tokio::test]
async fn test_weak_password_is_rejected() {
    let Some(pool) = common::test_pool().await else { return };
    let mut input = registration();
    input.password = "password".to_string();

    assert_eq!(register(&pool, input).await.unwrap_err().code(), "validation");
}

#[tokio::test]
async fn test_update_profile_clears_and_keeps_names() {
    let Some(pool) = common::test_pool().await else { return };
    let actor = common::new_actor(&pool).await;

    let user = update_profile(
        &pool,
        &actor,
        ProfileChanges {
            first_name: Patch::Null,
            last_name: Patch::Value("Smith".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(user.first_name.is_none());
    assert_eq!(user.last_name.as_deref(), Some("Smith"));

    let unchanged = update_profile(&pool, &actor, ProfileChanges::default())
        .await
        .unwrap();
    assert_eq!(unchanged.last_name.as_deref(), Some("Smith"));
}

#[tokio::test]
async fn test_delete_account_twice_and_login_after() {
    let Some(pool) = common::test_pool().await else { return };
    let input = registration();
    let username = input.username.clone();
    let user = register(&pool, input).await.unwrap();
    let actor = habitrack_shared::policy::Actor::new(user.id);

    delete_account(&pool, &actor).await.unwrap();
    assert_eq!(
        delete_account(&pool, &actor).await.unwrap_err().code(),
        "already_deleted"
    );

    assert!(matches!(
        get_profile(&pool, &actor).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(authenticate(&pool, &username, common::PASSWORD)
        .await
        .unwrap()
        .is_none());
}
