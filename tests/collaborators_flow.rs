mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{acquire_db_lock, read_json, TestApp};

#[derive(Debug, Deserialize)]
struct Collaborator {
    user_id: Uuid,
    username: String,
    permission: String,
    visit_count: i32,
}

#[tokio::test]
async fn viewers_read_and_editors_write() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    let (_, owner) = app.user_with_token("host").await?;
    let (viewer_id, viewer) = app.user_with_token("guest").await?;
    let trip_id = app.create_trip(&owner, "Kyoto").await?;
    let collaborators = format!("/api/trips/{trip_id}/collaborators");

    let unknown = app
        .post_json(
            &collaborators,
            &json!({ "username": "ghost", "permission": "view" }),
            Some(&owner),
        )
        .await?;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let self_invite = app
        .post_json(
            &collaborators,
            &json!({ "username": "host", "permission": "edit" }),
            Some(&owner),
        )
        .await?;
    assert_eq!(self_invite.status(), StatusCode::BAD_REQUEST);

    let added = app
        .post_json(
            &collaborators,
            &json!({ "email": "guest@example.test", "permission": "view" }),
            Some(&owner),
        )
        .await?;
    assert_eq!(added.status(), StatusCode::CREATED);
    let added: Collaborator = read_json(added).await?;
    assert_eq!(added.user_id, viewer_id);
    assert_eq!(added.permission, "view");

    let trip = app
        .get(&format!("/api/trips/{trip_id}"), Some(&viewer))
        .await?;
    assert_eq!(trip.status(), StatusCode::OK);
    let trip: Value = read_json(trip).await?;
    assert_eq!(trip["role"], "viewer");

    let listed = app.get("/api/trips", Some(&viewer)).await?;
    let listed: Vec<Value> = read_json(listed).await?;
    assert_eq!(listed.len(), 1);

    let hotel = json!({
        "name": "Ryokan",
        "check_in": "2025-09-01T15:00:00",
        "check_out": "2025-09-03T10:00:00",
    });
    let denied = app
        .post_json(&format!("/api/trips/{trip_id}/hotels"), &hotel, Some(&viewer))
        .await?;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let invite_others = app
        .post_json(
            &collaborators,
            &json!({ "username": "host", "permission": "view" }),
            Some(&viewer),
        )
        .await?;
    assert_eq!(invite_others.status(), StatusCode::FORBIDDEN);

    // Re-adding an existing collaborator changes the permission in place.
    let promoted = app
        .post_json(
            &collaborators,
            &json!({ "username": "guest", "permission": "edit" }),
            Some(&owner),
        )
        .await?;
    assert_eq!(promoted.status(), StatusCode::OK);

    let allowed = app
        .post_json(&format!("/api/trips/{trip_id}/hotels"), &hotel, Some(&viewer))
        .await?;
    assert_eq!(allowed.status(), StatusCode::CREATED);

    let delete_trip = app
        .delete(&format!("/api/trips/{trip_id}"), Some(&viewer))
        .await?;
    assert_eq!(delete_trip.status(), StatusCode::FORBIDDEN);

    let demoted = app
        .patch_json(
            &format!("{collaborators}/{viewer_id}"),
            &json!({ "permission": "view" }),
            Some(&owner),
        )
        .await?;
    assert_eq!(demoted.status(), StatusCode::OK);
    let demoted: Collaborator = read_json(demoted).await?;
    assert_eq!(demoted.permission, "view");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn collaborators_can_visit_and_leave() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    let (_, owner) = app.user_with_token("captain").await?;
    let (crew_id, crew) = app.user_with_token("crew").await?;
    let trip_id = app.create_trip(&owner, "Sailing").await?;
    let collaborators = format!("/api/trips/{trip_id}/collaborators");

    let added = app
        .post_json(
            &collaborators,
            &json!({ "username": "crew", "permission": "edit" }),
            Some(&owner),
        )
        .await?;
    assert_eq!(added.status(), StatusCode::CREATED);

    for _ in 0..2 {
        let visit = app
            .post_empty(&format!("/api/trips/{trip_id}/visit"), Some(&crew))
            .await?;
        assert_eq!(visit.status(), StatusCode::NO_CONTENT);
    }
    let owner_visit = app
        .post_empty(&format!("/api/trips/{trip_id}/visit"), Some(&owner))
        .await?;
    assert_eq!(owner_visit.status(), StatusCode::NO_CONTENT);

    let listed = app.get(&collaborators, Some(&owner)).await?;
    let listed: Vec<Collaborator> = read_json(listed).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].username, "crew");
    assert_eq!(listed[0].visit_count, 2);

    let left = app
        .delete(&format!("{collaborators}/{crew_id}"), Some(&crew))
        .await?;
    assert_eq!(left.status(), StatusCode::NO_CONTENT);

    let after = app
        .get(&format!("/api/trips/{trip_id}"), Some(&crew))
        .await?;
    assert_eq!(after.status(), StatusCode::NOT_FOUND);

    let again = app
        .delete(&format!("{collaborators}/{crew_id}"), Some(&owner))
        .await?;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
