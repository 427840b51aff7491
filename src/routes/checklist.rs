use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::validation::{choice, optional_text, patch_required_text, patch_text, require_text};
use crate::audit::{self, Action};
use crate::auth::TripAccess;
use crate::error::{AppError, AppResult};
use crate::kinds::CHECKLIST_CATEGORIES;
use crate::models::ChecklistItem;
use crate::schema::checklist_items;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateChecklistItemRequest {
    pub title: String,
    pub category: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub due_date: Option<NaiveDate>,
    pub owner: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateChecklistItemRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub category: Option<Option<String>>,
    pub completed: Option<bool>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub owner: Option<Option<String>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = checklist_items)]
struct ChecklistItemChangeset {
    title: Option<String>,
    category: Option<String>,
    completed: Option<bool>,
    due_date: Option<Option<NaiveDate>>,
    owner: Option<Option<String>>,
}

pub async fn list_checklist(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<Vec<ChecklistItem>>> {
    let mut conn = state.db()?;
    let rows = checklist_items::table
        .filter(checklist_items::trip_id.eq(access.trip_id()))
        .order((
            checklist_items::completed.asc(),
            checklist_items::category.asc(),
            checklist_items::created_at.asc(),
        ))
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn create_checklist_item(
    State(state): State<AppState>,
    access: TripAccess,
    Json(payload): Json<CreateChecklistItemRequest>,
) -> AppResult<(StatusCode, Json<ChecklistItem>)> {
    access.require_edit()?;
    let title = require_text(&payload.title, "title")?;
    let category = choice(
        payload.category.as_deref().unwrap_or("other"),
        CHECKLIST_CATEGORIES,
        "category",
    )?;

    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let item = ChecklistItem {
        id: Uuid::new_v4(),
        trip_id: access.trip_id(),
        title,
        category,
        completed: payload.completed,
        due_date: payload.due_date,
        owner: optional_text(payload.owner),
        created_at: now,
        updated_at: now,
    };

    let created: ChecklistItem = diesel::insert_into(checklist_items::table)
        .values(&item)
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Create,
        "checklist_item",
        Some(created.id),
        json!({ "title": created.title }),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_checklist_item(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateChecklistItemRequest>,
) -> AppResult<Json<ChecklistItem>> {
    access.require_edit()?;
    let category = patch_required_text(payload.category, "category")?
        .map(|value| choice(&value, CHECKLIST_CATEGORIES, "category"))
        .transpose()?;
    let changeset = ChecklistItemChangeset {
        title: patch_required_text(payload.title, "title")?,
        category,
        completed: payload.completed,
        due_date: payload.due_date,
        owner: patch_text(payload.owner),
    };

    let mut conn = state.db()?;
    let existing = find_item(&mut conn, access.trip_id(), item_id)?;
    let updated: ChecklistItem = diesel::update(checklist_items::table.find(existing.id))
        .set((&changeset, checklist_items::updated_at.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "checklist_item",
        Some(updated.id),
        json!({ "title": updated.title, "completed": updated.completed }),
    );

    Ok(Json(updated))
}

pub async fn toggle_checklist_item(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ChecklistItem>> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_item(&mut conn, access.trip_id(), item_id)?;

    let updated: ChecklistItem = diesel::update(checklist_items::table.find(existing.id))
        .set((
            checklist_items::completed.eq(!existing.completed),
            checklist_items::updated_at.eq(Utc::now().naive_utc()),
        ))
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "checklist_item",
        Some(updated.id),
        json!({ "completed": updated.completed }),
    );

    Ok(Json(updated))
}

pub async fn delete_checklist_item(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, item_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_item(&mut conn, access.trip_id(), item_id)?;

    diesel::delete(checklist_items::table.find(existing.id)).execute(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "checklist_item",
        Some(existing.id),
        json!({ "title": existing.title }),
    );

    Ok(StatusCode::NO_CONTENT)
}

fn find_item(conn: &mut PgConnection, trip_id: Uuid, item_id: Uuid) -> AppResult<ChecklistItem> {
    checklist_items::table
        .filter(checklist_items::id.eq(item_id))
        .filter(checklist_items::trip_id.eq(trip_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}
