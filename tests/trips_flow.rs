mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{acquire_db_lock, read_json, TestApp};

#[derive(Debug, Deserialize)]
struct TripView {
    id: Uuid,
    name: String,
    destination: String,
    description: Option<String>,
    share_token: Option<String>,
    role: String,
    day_count: u32,
}

#[derive(Deserialize)]
struct Share {
    share_token: String,
    share_path: String,
}

#[tokio::test]
async fn trip_lifecycle_for_the_owner() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    let (_, token) = app.user_with_token("olivia").await?;

    let created = app
        .post_json(
            "/api/trips",
            &json!({
                "name": "  Porto weekend ",
                "destination": "Porto",
                "start_date": "2025-06-10",
                "end_date": "2025-06-12",
                "description": "Port wine and tiles",
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let created: TripView = read_json(created).await?;
    assert_eq!(created.name, "Porto weekend");
    assert_eq!(created.role, "owner");
    assert_eq!(created.day_count, 3);

    let reversed = app
        .post_json(
            "/api/trips",
            &json!({
                "name": "Backwards",
                "destination": "Nowhere",
                "start_date": "2025-06-12",
                "end_date": "2025-06-10",
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(reversed.status(), StatusCode::BAD_REQUEST);

    let patched = app
        .patch_json(
            &format!("/api/trips/{}", created.id),
            &json!({ "destination": "Porto & Douro", "description": null, "end_date": "2025-06-14" }),
            Some(&token),
        )
        .await?;
    assert_eq!(patched.status(), StatusCode::OK);
    let patched: TripView = read_json(patched).await?;
    assert_eq!(patched.destination, "Porto & Douro");
    assert_eq!(patched.description, None);
    assert_eq!(patched.day_count, 5);

    // Moving the start past the stored end is rejected.
    let bad_range = app
        .patch_json(
            &format!("/api/trips/{}", created.id),
            &json!({ "start_date": "2025-07-01" }),
            Some(&token),
        )
        .await?;
    assert_eq!(bad_range.status(), StatusCode::BAD_REQUEST);

    let endless = app
        .patch_json(
            &format!("/api/trips/{}", created.id),
            &json!({ "end_date": "9999-12-31" }),
            Some(&token),
        )
        .await?;
    assert_eq!(endless.status(), StatusCode::BAD_REQUEST);

    let listed = app.get("/api/trips", Some(&token)).await?;
    assert_eq!(listed.status(), StatusCode::OK);
    let listed: Vec<TripView> = read_json(listed).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);

    let deleted = app
        .delete(&format!("/api/trips/{}", created.id), Some(&token))
        .await?;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = app
        .get(&format!("/api/trips/{}", created.id), Some(&token))
        .await?;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn strangers_cannot_tell_a_trip_exists() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    let (_, owner) = app.user_with_token("owner").await?;
    let (_, stranger) = app.user_with_token("stranger").await?;
    let trip_id = app.create_trip(&owner, "Private").await?;

    let existing = app
        .get(&format!("/api/trips/{trip_id}"), Some(&stranger))
        .await?;
    let missing = app
        .get(&format!("/api/trips/{}", Uuid::new_v4()), Some(&stranger))
        .await?;
    assert_eq!(existing.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let existing: Value = read_json(existing).await?;
    let missing: Value = read_json(missing).await?;
    assert_eq!(existing, missing);

    let hotels = app
        .get(&format!("/api/trips/{trip_id}/hotels"), Some(&stranger))
        .await?;
    assert_eq!(hotels.status(), StatusCode::NOT_FOUND);

    let listed = app.get("/api/trips", Some(&stranger)).await?;
    let listed: Vec<TripView> = read_json(listed).await?;
    assert!(listed.is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn sharing_exposes_a_read_only_view() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    let (_, token) = app.user_with_token("sharer").await?;
    let trip_id = app.create_trip(&token, "Lisbon").await?;

    let hotel = app
        .post_json(
            &format!("/api/trips/{trip_id}/hotels"),
            &json!({
                "name": "Alfama Rooms",
                "check_in": "2025-09-01T15:00:00",
                "check_out": "2025-09-04T11:00:00",
                "price_cents": 42000,
                "currency": "EUR",
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(hotel.status(), StatusCode::CREATED);
    let hotel: Value = read_json(hotel).await?;

    let payment = app
        .post_json(
            &format!("/api/trips/{trip_id}/payments"),
            &json!({
                "activity_type": "hotel",
                "activity_id": hotel["id"],
                "amount_cents": 10000,
                "currency": "EUR",
                "paid_on": "2025-05-01",
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(payment.status(), StatusCode::CREATED);

    let shared = app
        .post_empty(&format!("/api/trips/{trip_id}/share"), Some(&token))
        .await?;
    assert_eq!(shared.status(), StatusCode::OK);
    let shared: Share = read_json(shared).await?;
    assert_eq!(shared.share_path, format!("/shared/{}", shared.share_token));

    let trip = app
        .get(&format!("/api/trips/{trip_id}"), Some(&token))
        .await?;
    let trip: TripView = read_json(trip).await?;
    assert_eq!(trip.share_token.as_deref(), Some(shared.share_token.as_str()));

    let public = app
        .get(&format!("/api/shared/{}", shared.share_token), None)
        .await?;
    assert_eq!(public.status(), StatusCode::OK);
    let public: Value = read_json(public).await?;
    assert_eq!(public["trip"]["name"], "Lisbon");
    assert_eq!(public["hotels"][0]["name"], "Alfama Rooms");
    assert!(public["trip"].get("owner_id").is_none());
    assert!(public["trip"].get("share_token").is_none());
    assert!(public.get("payments").is_none());
    assert!(public.get("documents").is_none());
    assert!(public.get("travelers").is_none());
    assert!(public["timeline"].as_array().is_some_and(|events| !events.is_empty()));

    let unshared = app
        .delete(&format!("/api/trips/{trip_id}/share"), Some(&token))
        .await?;
    assert_eq!(unshared.status(), StatusCode::NO_CONTENT);

    let revoked = app
        .get(&format!("/api/shared/{}", shared.share_token), None)
        .await?;
    assert_eq!(revoked.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
