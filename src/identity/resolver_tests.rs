use super::*;
use crate::backend::memory::MemoryStore;
use serde_json::json;

fn session(uid: &str) -> Session { Session::new("tok", uid, None) }

fn seeded() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::new()
            .with_row(PROFILE_TABLE, json!({"id": "u-1", "first_name": "Rhea", "belt_rank": "Purple", "stripes": 2, "gym_name": "North Mat", "years_training": 4.5}))
            .with_row(ROLE_TABLE, json!({"user_id": "u-1", "roles": {"name": "instructor"}}))
            .with_row(ROLE_TABLE, json!({"user_id": "u-1", "roles": [{"name": "Student"}]}))
            .with_row(ROLE_TABLE, json!({"user_id": "u-2", "roles": {"name": "admin"}}))
            .with_row(PROFILE_TABLE, json!({"id": "u-3", "first_name": "Kai"})),
    )
}

#[tokio::test]
async fn resolves_profile_and_roles_with_one_read_each() {
    let store = seeded();
    let resolver = IdentityResolver::new(store.clone());
    let id = resolver.resolve(&session("u-1")).await.unwrap();
    assert_eq!(id.user_id, "u-1");
    assert_eq!(id.profile.belt_rank.as_deref(), Some("Purple"));
    assert_eq!(id.profile.stripes, Some(2));
    assert_eq!(id.years_training(), Some(4.5));
    assert!(id.has_role(&Role::Instructor));
    assert!(id.has_role(&Role::Student));
    assert!(!id.has_role(&Role::Admin));
    assert_eq!(store.reads(), vec![PROFILE_TABLE.to_string(), ROLE_TABLE.to_string()]);
}

#[tokio::test]
async fn zero_role_rows_is_an_empty_set() {
    let resolver = IdentityResolver::new(seeded());
    let id = resolver.resolve(&session("u-3")).await.unwrap();
    assert!(id.roles.is_empty());
    assert_eq!(id.display_name(), "Kai");
}

#[tokio::test]
async fn missing_profile_is_not_found_without_role_read() {
    let store = seeded();
    let resolver = IdentityResolver::new(store.clone());
    let err = resolver.resolve(&session("u-2")).await.unwrap_err();
    assert_eq!(err, ResolveError::NotFound("u-2".into()));
    assert_eq!(store.reads(), vec![PROFILE_TABLE.to_string()]);
    let app: AppError = err.into();
    assert!(matches!(app, AppError::ProfileNotFound { .. }));
}

#[tokio::test]
async fn transport_failure_is_unavailable_and_not_retried() {
    let store = seeded();
    store.set_failing(true);
    let resolver = IdentityResolver::new(store.clone());
    let err = resolver.resolve(&session("u-1")).await.unwrap_err();
    assert!(matches!(err, ResolveError::Unavailable(_)));
    assert_eq!(store.reads().len(), 1);
}

#[tokio::test]
async fn legacy_role_column_on_profile_counts() {
    let store = Arc::new(MemoryStore::new().with_row("profiles", json!({"id": "u-9", "role": "instructor"})));
    let resolver = IdentityResolver::new(store).with_tables("profiles", "assignments");
    let id = resolver.resolve(&session("u-9")).await.unwrap();
    assert_eq!(id.roles.iter().cloned().collect::<Vec<_>>(), vec![Role::Instructor]);
}

#[tokio::test]
async fn mistyped_profile_columns_do_not_block_roles() {
    let store = Arc::new(
        MemoryStore::new()
            .with_row(PROFILE_TABLE, json!({"id": "coach", "first_name": "Rhea", "time_training": "3.5", "gym_id": "7f1c", "stripes": "2", "belt_rank": 3}))
            .with_row(ROLE_TABLE, json!({"user_id": "coach", "roles": {"name": "instructor"}})),
    );
    let id = IdentityResolver::new(store).resolve(&session("coach")).await.unwrap();
    assert!(id.has_role(&Role::Instructor));
    assert_eq!(id.profile.time_training, Some(3.5));
    assert_eq!(id.years_training(), Some(3.5));
    assert_eq!(id.profile.gym_id, None);
    assert_eq!(id.profile.stripes, Some(2));
    assert_eq!(id.profile.belt_rank.as_deref(), Some("3"));
    assert_eq!(id.profile.first_name.as_deref(), Some("Rhea"));
}

#[test]
fn role_names_accepts_all_row_shapes() {
    let row = |v: serde_json::Value| v.as_object().unwrap().clone();
    assert_eq!(role_names(&row(json!({"role": "fighter"}))), vec!["fighter"]);
    assert_eq!(role_names(&row(json!({"role_name": "annotator"}))), vec!["annotator"]);
    assert_eq!(role_names(&row(json!({"roles": {"name": "instructor"}}))), vec!["instructor"]);
    assert_eq!(role_names(&row(json!({"roles": [{"name": "a"}, "b", {"nope": 1}]}))), vec!["a", "b"]);
    assert!(role_names(&row(json!({"roles": null, "role": "  "}))).is_empty());
}
