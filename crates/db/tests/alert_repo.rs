//! Repository tests for the `alerts` table, run against a migrated database.

use fleetwatch_db::models::alert::{AlertFilter, NewAlert};
use fleetwatch_db::repositories::{AlertRepo, UserRepo, VehicleRepo};
use sqlx::PgPool;

async fn create_user(pool: &PgPool, email: &str, role: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO users (email, full_name, role) VALUES ($1, $2, $3) RETURNING id")
        .bind(email)
        .bind("Test User")
        .bind(role)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn new_alert(recipient_id: i64, dedup_key: Option<&str>) -> NewAlert {
    NewAlert {
        recipient_id,
        kind: "vehicle_expiry_warning".to_string(),
        category: "warning".to_string(),
        priority: "high".to_string(),
        title: "Upcoming deadline".to_string(),
        message: "Vehicle AB123CD: insurance deadline in 3 days".to_string(),
        metadata: serde_json::json!({"vehicle_id": 1, "expiry_type": "insurance"}),
        action_url: Some("/vehicles/1".to_string()),
        dedup_key: dedup_key.map(str::to_string),
    }
}

fn all() -> AlertFilter {
    AlertFilter {
        limit: 100,
        ..Default::default()
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_dedup_key_is_absorbed(pool: PgPool) {
    let user = create_user(&pool, "a@test.com", "employee").await;

    let first = AlertRepo::insert_deduped(&pool, &new_alert(user, Some("k1"))).await.unwrap();
    let second = AlertRepo::insert_deduped(&pool, &new_alert(user, Some("k1"))).await.unwrap();

    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(AlertRepo::list_for_recipient(&pool, user, &all()).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn null_dedup_keys_never_conflict(pool: PgPool) {
    let user = create_user(&pool, "a@test.com", "employee").await;

    for _ in 0..3 {
        let inserted = AlertRepo::insert_deduped(&pool, &new_alert(user, None)).await.unwrap();
        assert!(inserted.is_some());
    }
    assert_eq!(AlertRepo::unread_count(&pool, user).await.unwrap(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_inserts_with_same_key_persist_one_row(pool: PgPool) {
    let user = create_user(&pool, "a@test.com", "employee").await;

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                AlertRepo::insert_deduped(&pool, &new_alert(user, Some("race"))).await
            })
        })
        .collect();

    let mut created = 0;
    for task in tasks {
        if task.await.unwrap().unwrap().is_some() {
            created += 1;
        }
    }
    assert_eq!(created, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn mark_read_is_scoped_and_idempotent(pool: PgPool) {
    let owner = create_user(&pool, "owner@test.com", "employee").await;
    let other = create_user(&pool, "other@test.com", "employee").await;
    let alert = AlertRepo::insert_deduped(&pool, &new_alert(owner, None))
        .await
        .unwrap()
        .unwrap();

    assert!(!AlertRepo::mark_read(&pool, alert.id, other).await.unwrap());
    assert_eq!(AlertRepo::unread_count(&pool, owner).await.unwrap(), 1);

    assert!(AlertRepo::mark_read(&pool, alert.id, owner).await.unwrap());
    assert!(AlertRepo::mark_read(&pool, alert.id, owner).await.unwrap());
    assert_eq!(AlertRepo::unread_count(&pool, owner).await.unwrap(), 0);
    assert_eq!(AlertRepo::owner_of(&pool, alert.id).await.unwrap(), Some(owner));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn read_state_cannot_be_reverted(pool: PgPool) {
    let owner = create_user(&pool, "owner@test.com", "employee").await;
    let alert = AlertRepo::insert_deduped(&pool, &new_alert(owner, None))
        .await
        .unwrap()
        .unwrap();
    AlertRepo::mark_read(&pool, alert.id, owner).await.unwrap();

    let result = sqlx::query("UPDATE alerts SET read = false WHERE id = $1")
        .bind(alert.id)
        .execute(&pool)
        .await;
    assert!(result.is_err());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn clear_all_only_touches_recipient(pool: PgPool) {
    let a = create_user(&pool, "a@test.com", "employee").await;
    let b = create_user(&pool, "b@test.com", "employee").await;
    AlertRepo::insert_deduped(&pool, &new_alert(a, None)).await.unwrap();
    AlertRepo::insert_deduped(&pool, &new_alert(b, None)).await.unwrap();

    assert_eq!(AlertRepo::clear_all(&pool, a).await.unwrap(), 1);
    assert!(AlertRepo::list_for_recipient(&pool, a, &all()).await.unwrap().is_empty());
    assert_eq!(AlertRepo::list_for_recipient(&pool, b, &all()).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn trim_keeps_newest_per_recipient(pool: PgPool) {
    let user = create_user(&pool, "a@test.com", "employee").await;
    let mut ids = Vec::new();
    for _ in 0..5 {
        let alert = AlertRepo::insert_deduped(&pool, &new_alert(user, None))
            .await
            .unwrap()
            .unwrap();
        ids.push(alert.id);
    }

    assert_eq!(AlertRepo::trim_per_recipient(&pool, 2).await.unwrap(), 3);
    let remaining: Vec<i64> = AlertRepo::list_for_recipient(&pool, user, &all())
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(remaining, vec![ids[4], ids[3]]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn due_vehicles_include_unassigned(pool: PgPool) {
    let user = create_user(&pool, "driver@test.com", "employee").await;
    sqlx::query(
        "INSERT INTO vehicles (license_plate, insurance_expiry, assigned_to) VALUES \
         ('AA111AA', CURRENT_DATE + 3, $1), \
         ('BB222BB', CURRENT_DATE + 3, NULL), \
         ('CC333CC', CURRENT_DATE + 60, $1)",
    )
    .bind(user)
    .execute(&pool)
    .await
    .unwrap();

    let cutoff = chrono::Utc::now().date_naive() + chrono::Days::new(7);
    let due = VehicleRepo::list_due(&pool, cutoff).await.unwrap();
    let plates: Vec<String> = due.into_iter().map(|v| v.unwrap().license_plate).collect();
    assert_eq!(plates, vec!["AA111AA".to_string(), "BB222BB".to_string()]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reviewers_are_listed_by_role(pool: PgPool) {
    let manager = create_user(&pool, "m@test.com", "manager").await;
    let admin = create_user(&pool, "ad@test.com", "admin").await;
    create_user(&pool, "e@test.com", "employee").await;

    let ids = UserRepo::list_active_ids_by_roles(&pool, &["manager", "admin"]).await.unwrap();
    assert_eq!(ids, vec![manager, admin]);

    let contact = UserRepo::find_contact(&pool, manager).await.unwrap().unwrap();
    assert_eq!(contact.email, "m@test.com");
}
