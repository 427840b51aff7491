use axum::{
    body::Body,
    extract::{Json, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use chrono::{NaiveDateTime, Utc};
use diesel::{dsl::count_star, prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::validation::{choice, optional_text, patch_required_text, patch_text, require_text};
use crate::audit::{self, Action};
use crate::auth::{access::resolve_trip_role, TripAccess};
use crate::error::{AppError, AppResult};
use crate::kinds::DOCUMENT_CATEGORIES;
use crate::models::Document;
use crate::schema::{car_rentals, documents, hotels, restaurants, tourist_sites, transportation};
use crate::state::AppState;
use crate::storage::document_key;
use crate::utils::json::string_list;

fn inline_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_control() => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub name: String,
    pub category: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub download_path: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub category: Option<Option<String>>,
    /// `null` clears every tag.
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub tags: Option<Option<Value>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub notes: Option<Option<String>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = documents)]
struct DocumentChangeset {
    name: Option<String>,
    category: Option<String>,
    tags: Option<Value>,
    notes: Option<Option<String>>,
}

struct UploadForm {
    bytes: Vec<u8>,
    file_name: String,
    content_type: Option<String>,
    name: Option<String>,
    category: Option<String>,
    tags: Value,
    notes: Option<String>,
}

fn parse_tags(value: &Value) -> AppResult<Value> {
    let tags = string_list(value).map_err(|err| AppError::bad_request(format!("tags: {err}")))?;
    Ok(Value::from(tags))
}

pub async fn list_documents(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<Document> = documents::table
        .filter(documents::trip_id.eq(access.trip_id()))
        .order((documents::category.asc(), documents::created_at.desc()))
        .load(&mut conn)?;

    let response = rows
        .into_iter()
        .map(|doc| to_document_response(&state, access.user_id(), doc))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Json(response))
}

pub async fn get_document(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, document_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<DocumentResponse>> {
    let mut conn = state.db()?;
    let doc = find_document(&mut conn, access.trip_id(), document_id)?;
    Ok(Json(to_document_response(&state, access.user_id(), doc)?))
}

pub async fn upload_document(
    State(state): State<AppState>,
    access: TripAccess,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    access.require_edit()?;
    let form = read_upload_form(&mut multipart).await?;

    let name = match form.name.as_deref() {
        Some(name) => require_text(name, "name")?,
        None => form.file_name.clone(),
    };
    let category = choice(
        form.category.as_deref().unwrap_or("other"),
        DOCUMENT_CATEGORIES,
        "category",
    )?;
    let tags = parse_tags(&form.tags)?;

    let doc_id = Uuid::new_v4();
    let storage_key = document_key(access.trip_id(), doc_id, &form.file_name);
    let content_type = form.content_type.clone().or_else(|| {
        mime_guess::from_path(&form.file_name)
            .first_raw()
            .map(str::to_string)
    });
    let size_bytes = form.bytes.len() as i64;

    state
        .storage
        .put_object(
            &storage_key,
            form.bytes,
            content_type.clone(),
            inline_content_disposition(&form.file_name),
        )
        .await
        .map_err(|err| {
            error!(error = %err, key = %storage_key, "failed to store document");
            AppError::internal(format!("failed to store document: {err}"))
        })?;

    let now = Utc::now().naive_utc();
    let document = Document {
        id: doc_id,
        trip_id: access.trip_id(),
        name,
        category,
        file_name: form.file_name,
        content_type,
        size_bytes,
        storage_key,
        tags,
        notes: optional_text(form.notes),
        uploaded_by: Some(access.user_id()),
        created_at: now,
        updated_at: now,
    };

    let mut conn = state.db()?;
    let created: Document = diesel::insert_into(documents::table)
        .values(&document)
        .get_result(&mut conn)?;

    info!(
        trip_id = %created.trip_id,
        document_id = %created.id,
        size_bytes = created.size_bytes,
        "document uploaded"
    );
    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Create,
        "document",
        Some(created.id),
        json!({ "name": created.name, "category": created.category }),
    );

    Ok((
        StatusCode::CREATED,
        Json(to_document_response(&state, access.user_id(), created)?),
    ))
}

async fn read_upload_form(multipart: &mut Multipart) -> AppResult<UploadForm> {
    let mut bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut name = None;
    let mut category = None;
    let mut tags = Value::Null;
    let mut notes = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let field_name = field.name().map(|n| n.to_string());
        if field_name.as_deref() == Some("file") {
            file_name = field.file_name().map(|n| n.to_string());
            content_type = field.content_type().map(|mime| mime.to_string());
            let data = field.bytes().await.map_err(|err| {
                error!(error = %err, "failed to read file bytes");
                AppError::bad_request(format!("failed to read file bytes: {err}"))
            })?;
            bytes = Some(data.to_vec());
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|err| AppError::bad_request(format!("invalid multipart field: {err}")))?;
        match field_name.as_deref() {
            Some("name") => name = optional_text(Some(text)),
            Some("category") => category = optional_text(Some(text)),
            Some("notes") => notes = optional_text(Some(text)),
            Some("tags") if !text.trim().is_empty() => {
                tags = serde_json::from_str(&text)
                    .map_err(|err| AppError::bad_request(format!("tags must be valid JSON: {err}")))?;
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| AppError::bad_request("file field is required"))?;
    if bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    let file_name = file_name
        .and_then(|n| optional_text(Some(n)))
        .ok_or_else(|| AppError::bad_request("filename is required"))?;

    Ok(UploadForm {
        bytes,
        file_name,
        content_type,
        name,
        category,
        tags,
        notes,
    })
}

pub async fn update_document(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, document_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateDocumentRequest>,
) -> AppResult<Json<DocumentResponse>> {
    access.require_edit()?;
    let category = patch_required_text(payload.category, "category")?
        .map(|value| choice(&value, DOCUMENT_CATEGORIES, "category"))
        .transpose()?;
    let tags = payload
        .tags
        .map(|tags| parse_tags(&tags.unwrap_or(Value::Null)))
        .transpose()?;
    let changeset = DocumentChangeset {
        name: patch_required_text(payload.name, "name")?,
        category,
        tags,
        notes: patch_text(payload.notes),
    };

    let mut conn = state.db()?;
    let existing = find_document(&mut conn, access.trip_id(), document_id)?;
    let updated: Document = diesel::update(documents::table.find(existing.id))
        .set((&changeset, documents::updated_at.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "document",
        Some(updated.id),
        json!({ "name": updated.name }),
    );

    Ok(Json(to_document_response(&state, access.user_id(), updated)?))
}

pub async fn delete_document(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, document_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_document(&mut conn, access.trip_id(), document_id)?;

    conn.transaction::<_, AppError, _>(|conn| {
        unlink_document(conn, existing.id)?;
        diesel::delete(documents::table.find(existing.id)).execute(conn)?;
        Ok(())
    })?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "document",
        Some(existing.id),
        json!({ "name": existing.name }),
    );

    let orphaned = orphaned_keys(&mut conn, vec![existing.storage_key])?;
    drop(conn);
    remove_objects(&state, orphaned).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_with_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Response> {
    let claims = state
        .jwt
        .verify_download_token(&token)
        .map_err(|_| AppError::unauthorized())?;

    let doc: Document = {
        let mut conn = state.db()?;
        let doc: Document = documents::table
            .find(claims.doc_id)
            .first(&mut conn)
            .optional()?
            .ok_or_else(AppError::not_found)?;
        // Access may have been revoked since the link was issued.
        resolve_trip_role(&mut conn, doc.trip_id, claims.user_id)?;
        doc
    };

    let stored = state.storage.get_object(&doc.storage_key).await.map_err(|err| {
        error!(error = %err, key = %doc.storage_key, "failed to read document from storage");
        AppError::internal("failed to read document from storage")
    })?;

    let content_type = stored
        .content_type
        .or(doc.content_type)
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut response = Response::new(Body::from(stored.bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Some(disposition) = inline_content_disposition(&doc.file_name)
        .and_then(|value| HeaderValue::from_str(&value).ok())
    {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("private, no-store"));

    Ok(response)
}

/// Clears `document_id` on every activity pointing at the document.
pub fn unlink_document(conn: &mut PgConnection, document_id: Uuid) -> QueryResult<()> {
    let now = Utc::now().naive_utc();
    diesel::update(hotels::table.filter(hotels::document_id.eq(document_id)))
        .set((hotels::document_id.eq(None::<Uuid>), hotels::updated_at.eq(now)))
        .execute(conn)?;
    diesel::update(transportation::table.filter(transportation::document_id.eq(document_id)))
        .set((
            transportation::document_id.eq(None::<Uuid>),
            transportation::updated_at.eq(now),
        ))
        .execute(conn)?;
    diesel::update(car_rentals::table.filter(car_rentals::document_id.eq(document_id)))
        .set((
            car_rentals::document_id.eq(None::<Uuid>),
            car_rentals::updated_at.eq(now),
        ))
        .execute(conn)?;
    diesel::update(restaurants::table.filter(restaurants::document_id.eq(document_id)))
        .set((
            restaurants::document_id.eq(None::<Uuid>),
            restaurants::updated_at.eq(now),
        ))
        .execute(conn)?;
    diesel::update(tourist_sites::table.filter(tourist_sites::document_id.eq(document_id)))
        .set((
            tourist_sites::document_id.eq(None::<Uuid>),
            tourist_sites::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}

/// Keys from `candidates` that no remaining document row references. Demo
/// trips share their template's objects, so a key is only safe to delete
/// once its last row is gone.
pub fn orphaned_keys(conn: &mut PgConnection, candidates: Vec<String>) -> QueryResult<Vec<String>> {
    let mut orphaned = Vec::new();
    for key in candidates {
        let remaining: i64 = documents::table
            .filter(documents::storage_key.eq(&key))
            .select(count_star())
            .first(conn)?;
        if remaining == 0 && !orphaned.contains(&key) {
            orphaned.push(key);
        }
    }
    Ok(orphaned)
}

pub async fn remove_objects(state: &AppState, keys: Vec<String>) {
    for key in keys {
        if let Err(err) = state.storage.delete_object(&key).await {
            warn!(error = %err, key = %key, "failed to delete stored object");
        }
    }
}

fn find_document(conn: &mut PgConnection, trip_id: Uuid, document_id: Uuid) -> AppResult<Document> {
    documents::table
        .filter(documents::id.eq(document_id))
        .filter(documents::trip_id.eq(trip_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}

fn build_download_path(state: &AppState, document_id: Uuid, user_id: Uuid) -> AppResult<String> {
    state
        .jwt
        .generate_download_token(document_id, user_id)
        .map(|token| format!("/download/{token}"))
        .map_err(|err| AppError::internal(format!("failed to generate download token: {err}")))
}

fn to_document_response(
    state: &AppState,
    user_id: Uuid,
    doc: Document,
) -> AppResult<DocumentResponse> {
    let download_path = build_download_path(state, doc.id, user_id)?;
    let tags = string_list(&doc.tags).unwrap_or_default();
    Ok(DocumentResponse {
        id: doc.id,
        trip_id: doc.trip_id,
        name: doc.name,
        category: doc.category,
        file_name: doc.file_name,
        content_type: doc.content_type,
        size_bytes: doc.size_bytes,
        tags,
        notes: doc.notes,
        uploaded_by: doc.uploaded_by,
        download_path,
        created_at: doc.created_at,
        updated_at: doc.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_escapes_quotes_and_encodes_utf8() {
        let value = inline_content_disposition("boarding \"pass\".pdf").unwrap();
        assert!(value.starts_with("inline; filename=\"boarding _pass_.pdf\""));
        assert!(value.contains("filename*=UTF-8''boarding%20_pass_%2Epdf"));

        let hebrew = inline_content_disposition("כרטיס.pdf").unwrap();
        assert!(hebrew.contains("%D7%9B"));
        assert!(inline_content_disposition("").is_none());
    }

    #[test]
    fn tags_are_normalized_to_string_arrays() {
        assert_eq!(parse_tags(&json!([" visa ", ""])).unwrap(), json!(["visa"]));
        assert_eq!(parse_tags(&Value::Null).unwrap(), json!([]));
        assert!(parse_tags(&json!({ "a": 1 })).is_err());
    }
}
