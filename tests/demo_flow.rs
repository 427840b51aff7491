mod common;

use anyhow::{Context, Result};
use axum::http::{header, StatusCode};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{acquire_db_lock, read_json, TestApp};
use trip_planner::models::Trip;
use trip_planner::schema::{activity_log, trips};

#[derive(Deserialize)]
struct DemoSession {
    access_token: String,
    trip_id: Uuid,
}

#[tokio::test]
async fn demo_accounts_get_a_private_copy_of_the_template() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let template_id = Uuid::new_v4();
    let Some(app) = TestApp::try_new_with(Some(template_id)).await? else {
        return Ok(());
    };

    let (curator_id, curator) = app.user_with_token("curator").await?;
    app.with_conn(move |conn| {
        let now = Utc::now().naive_utc();
        diesel::insert_into(trips::table)
            .values(&Trip {
                id: template_id,
                owner_id: curator_id,
                name: "Sample Tuscany".to_string(),
                destination: "Florence".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 10, 1).context("date")?,
                end_date: NaiveDate::from_ymd_opt(2025, 10, 4).context("date")?,
                description: None,
                cover_image_url: None,
                share_token: Some("template-share-token".to_string()),
                created_at: now,
                updated_at: now,
            })
            .execute(conn)?;
        Ok(())
    })
    .await?;

    let uploaded = app
        .upload_document(
            &format!("/api/trips/{template_id}/documents"),
            "villa.pdf",
            "application/pdf",
            b"%PDF villa",
            &[("category", "hotel")],
            &curator,
        )
        .await?;
    assert_eq!(uploaded.status(), StatusCode::CREATED);
    let uploaded: Value = read_json(uploaded).await?;

    let hotel = app
        .post_json(
            &format!("/api/trips/{template_id}/hotels"),
            &json!({
                "name": "Villa Medici",
                "check_in": "2025-10-01T15:00:00",
                "check_out": "2025-10-04T10:00:00",
                "price_cents": 90000,
                "currency": "EUR",
                "document_id": uploaded["id"],
            }),
            Some(&curator),
        )
        .await?;
    assert_eq!(hotel.status(), StatusCode::CREATED);
    let hotel: Value = read_json(hotel).await?;

    let payment = app
        .post_json(
            &format!("/api/trips/{template_id}/payments"),
            &json!({
                "activity_type": "hotel",
                "activity_id": hotel["id"],
                "amount_cents": 90000,
                "currency": "EUR",
                "paid_on": "2025-08-01",
            }),
            Some(&curator),
        )
        .await?;
    assert_eq!(payment.status(), StatusCode::CREATED);

    let provisioned = app.post_empty("/api/demo", None).await?;
    assert_eq!(provisioned.status(), StatusCode::OK);
    assert!(provisioned.headers().contains_key(header::SET_COOKIE));
    let session: DemoSession = read_json(provisioned).await?;
    assert_ne!(session.trip_id, template_id);

    let me = app.get("/api/auth/me", Some(&session.access_token)).await?;
    let me: Value = read_json(me).await?;
    assert_eq!(me["role"], "demo");
    assert!(me["username"]
        .as_str()
        .is_some_and(|name| name.starts_with("demo-")));

    let trip = app
        .get(
            &format!("/api/trips/{}", session.trip_id),
            Some(&session.access_token),
        )
        .await?;
    assert_eq!(trip.status(), StatusCode::OK);
    let trip: Value = read_json(trip).await?;
    assert_eq!(trip["name"], "Sample Tuscany");
    assert_eq!(trip["role"], "owner");
    assert_eq!(trip["share_token"], Value::Null);

    let demo_trip_id = session.trip_id;
    let provision_rows: i64 = app
        .with_conn(move |conn| {
            Ok(activity_log::table
                .filter(activity_log::trip_id.eq(demo_trip_id))
                .filter(activity_log::action.eq("provision"))
                .count()
                .get_result(conn)?)
        })
        .await?;
    assert_eq!(provision_rows, 1);

    let hotels = app
        .get(
            &format!("/api/trips/{}/hotels", session.trip_id),
            Some(&session.access_token),
        )
        .await?;
    let hotels: Vec<Value> = read_json(hotels).await?;
    assert_eq!(hotels.len(), 1);
    assert_ne!(hotels[0]["id"], hotel["id"]);
    assert_ne!(hotels[0]["document_id"], uploaded["id"]);
    assert!(hotels[0]["document_id"].is_string());

    let budget = app
        .get(
            &format!("/api/trips/{}/budget", session.trip_id),
            Some(&session.access_token),
        )
        .await?;
    let budget: Value = read_json(budget).await?;
    assert_eq!(budget["lines"][0]["status"], "paid");

    // The template stays private to its owner.
    let template = app
        .get(
            &format!("/api/trips/{template_id}"),
            Some(&session.access_token),
        )
        .await?;
    assert_eq!(template.status(), StatusCode::NOT_FOUND);

    // The copy shares the stored object; deleting it must leave the template's file.
    let copied_document = hotels[0]["document_id"]
        .as_str()
        .context("copied document id")?
        .to_string();
    let deleted = app
        .delete(
            &format!("/api/trips/{}/documents/{copied_document}", session.trip_id),
            Some(&session.access_token),
        )
        .await?;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.storage().object_count().await, 1);

    let template_docs = app
        .get(&format!("/api/trips/{template_id}/documents"), Some(&curator))
        .await?;
    let template_docs: Vec<Value> = read_json(template_docs).await?;
    let download_path = template_docs[0]["download_path"]
        .as_str()
        .context("download path")?
        .to_string();
    let download = app.get(&download_path, None).await?;
    assert_eq!(download.status(), StatusCode::OK);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn demo_is_unavailable_without_a_template() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    let response = app.post_empty("/api/demo", None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
