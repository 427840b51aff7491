mod common;

use anyhow::{Context, Result};
use axum::http::{header, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{acquire_db_lock, body_to_vec, read_json, TestApp};

#[derive(Debug, Deserialize)]
struct DocumentView {
    id: Uuid,
    name: String,
    category: String,
    file_name: String,
    content_type: Option<String>,
    size_bytes: i64,
    tags: Vec<String>,
    download_path: String,
}

const PDF_BYTES: &[u8] = b"%PDF-1.4\n% boarding pass\n";

#[tokio::test]
async fn upload_download_and_delete() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    let (_, token) = app.user_with_token("traveller").await?;
    let trip_id = app.create_trip(&token, "Rome").await?;
    let documents = format!("/api/trips/{trip_id}/documents");

    let bad_category = app
        .upload_document(
            &documents,
            "pass.pdf",
            "application/pdf",
            PDF_BYTES,
            &[("category", "receipt")],
            &token,
        )
        .await?;
    assert_eq!(bad_category.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.storage().object_count().await, 0);

    let uploaded = app
        .upload_document(
            &documents,
            "boarding pass.pdf",
            "application/pdf",
            PDF_BYTES,
            &[
                ("name", "Outbound boarding pass"),
                ("category", "flight"),
                ("tags", r#"["outbound", " FCO "]"#),
            ],
            &token,
        )
        .await?;
    assert_eq!(uploaded.status(), StatusCode::CREATED);
    let uploaded: DocumentView = read_json(uploaded).await?;
    assert_eq!(uploaded.name, "Outbound boarding pass");
    assert_eq!(uploaded.category, "flight");
    assert_eq!(uploaded.file_name, "boarding pass.pdf");
    assert_eq!(uploaded.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(uploaded.size_bytes, PDF_BYTES.len() as i64);
    assert_eq!(uploaded.tags, vec!["outbound", "FCO"]);

    let key = format!(
        "trips/{trip_id}/documents/{}/boarding_pass.pdf",
        uploaded.id
    );
    let stored = app.storage().get(&key).await.context("object stored")?;
    assert_eq!(stored.bytes, PDF_BYTES);
    assert!(stored
        .content_disposition
        .as_deref()
        .is_some_and(|value| value.starts_with("inline;")));

    let downloaded = app.get(&uploaded.download_path, None).await?;
    assert_eq!(downloaded.status(), StatusCode::OK);
    assert_eq!(
        downloaded.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
        Some(&b"application/pdf"[..])
    );
    assert_eq!(
        downloaded.headers().get(header::CACHE_CONTROL).map(|v| v.as_bytes()),
        Some(&b"private, no-store"[..])
    );
    let body = body_to_vec(downloaded.into_body()).await?;
    assert_eq!(body, PDF_BYTES);

    let forged = app.get("/download/not-a-token", None).await?;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let patched = app
        .patch_json(
            &format!("{documents}/{}", uploaded.id),
            &json!({ "tags": null, "category": "ticket" }),
            Some(&token),
        )
        .await?;
    assert_eq!(patched.status(), StatusCode::OK);
    let patched: DocumentView = read_json(patched).await?;
    assert!(patched.tags.is_empty());
    assert_eq!(patched.category, "ticket");

    let hotel = app
        .post_json(
            &format!("/api/trips/{trip_id}/hotels"),
            &json!({
                "name": "Trastevere B&B",
                "check_in": "2025-09-01T14:00:00",
                "check_out": "2025-09-03T10:00:00",
                "document_id": uploaded.id,
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(hotel.status(), StatusCode::CREATED);
    let hotel: Value = read_json(hotel).await?;
    assert_eq!(hotel["document_id"], uploaded.id.to_string());

    let deleted = app
        .delete(&format!("{documents}/{}", uploaded.id), Some(&token))
        .await?;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert!(app.storage().get(&key).await.is_none());

    let hotels = app
        .get(&format!("/api/trips/{trip_id}/hotels"), Some(&token))
        .await?;
    let hotels: Vec<Value> = read_json(hotels).await?;
    assert_eq!(hotels[0]["document_id"], Value::Null);

    let stale_link = app.get(&uploaded.download_path, None).await?;
    assert_eq!(stale_link.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn document_links_respect_trip_access() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };

    let (_, owner) = app.user_with_token("keeper").await?;
    let (_, viewer) = app.user_with_token("peeker").await?;
    let (_, stranger) = app.user_with_token("outsider").await?;
    let trip_id = app.create_trip(&owner, "Vault").await?;
    let other_trip = app.create_trip(&owner, "Elsewhere").await?;
    let documents = format!("/api/trips/{trip_id}/documents");

    let added = app
        .post_json(
            &format!("/api/trips/{trip_id}/collaborators"),
            &json!({ "username": "peeker", "permission": "view" }),
            Some(&owner),
        )
        .await?;
    assert_eq!(added.status(), StatusCode::CREATED);

    let uploaded = app
        .upload_document(
            &documents,
            "passport.png",
            "image/png",
            b"\x89PNG fake",
            &[("category", "passport")],
            &owner,
        )
        .await?;
    assert_eq!(uploaded.status(), StatusCode::CREATED);
    let uploaded: DocumentView = read_json(uploaded).await?;

    let viewer_upload = app
        .upload_document(&documents, "mine.txt", "text/plain", b"hi", &[], &viewer)
        .await?;
    assert_eq!(viewer_upload.status(), StatusCode::FORBIDDEN);

    let stranger_upload = app
        .upload_document(&documents, "mine.txt", "text/plain", b"hi", &[], &stranger)
        .await?;
    assert_eq!(stranger_upload.status(), StatusCode::NOT_FOUND);

    let viewer_list = app.get(&documents, Some(&viewer)).await?;
    assert_eq!(viewer_list.status(), StatusCode::OK);
    let viewer_list: Vec<DocumentView> = read_json(viewer_list).await?;
    assert_eq!(viewer_list.len(), 1);

    let viewer_link = app.get(&viewer_list[0].download_path, None).await?;
    assert_eq!(viewer_link.status(), StatusCode::OK);

    // A hotel in another trip cannot point at this trip's document.
    let cross_trip = app
        .post_json(
            &format!("/api/trips/{other_trip}/hotels"),
            &json!({
                "name": "Borrowed",
                "check_in": "2025-09-01T14:00:00",
                "check_out": "2025-09-02T10:00:00",
                "document_id": uploaded.id,
            }),
            Some(&owner),
        )
        .await?;
    assert_eq!(cross_trip.status(), StatusCode::BAD_REQUEST);

    // Links stop working once access is revoked.
    let viewer_id = app
        .with_conn(|conn| {
            use diesel::prelude::*;
            use trip_planner::schema::users;
            Ok(users::table
                .filter(users::username.eq("peeker"))
                .select(users::id)
                .first::<Uuid>(conn)?)
        })
        .await?;
    let removed = app
        .delete(
            &format!("/api/trips/{trip_id}/collaborators/{viewer_id}"),
            Some(&owner),
        )
        .await?;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);

    let revoked = app.get(&viewer_list[0].download_path, None).await?;
    assert_eq!(revoked.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
