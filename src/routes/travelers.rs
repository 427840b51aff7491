use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::validation::{optional_text, patch_required_text, patch_text, require_text};
use crate::audit::{self, Action};
use crate::auth::TripAccess;
use crate::error::{AppError, AppResult};
use crate::models::Traveler;
use crate::schema::travelers;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateTravelerRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTravelerRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub notes: Option<Option<String>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = travelers)]
struct TravelerChangeset {
    name: Option<String>,
    email: Option<Option<String>>,
    phone: Option<Option<String>>,
    notes: Option<Option<String>>,
}

pub async fn list_travelers(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<Vec<Traveler>>> {
    let mut conn = state.db()?;
    let rows = travelers::table
        .filter(travelers::trip_id.eq(access.trip_id()))
        .order(travelers::name.asc())
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn create_traveler(
    State(state): State<AppState>,
    access: TripAccess,
    Json(payload): Json<CreateTravelerRequest>,
) -> AppResult<(StatusCode, Json<Traveler>)> {
    access.require_edit()?;
    let name = require_text(&payload.name, "name")?;

    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let traveler = Traveler {
        id: Uuid::new_v4(),
        trip_id: access.trip_id(),
        name,
        email: optional_text(payload.email),
        phone: optional_text(payload.phone),
        notes: optional_text(payload.notes),
        created_at: now,
        updated_at: now,
    };

    let created: Traveler = diesel::insert_into(travelers::table)
        .values(&traveler)
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Create,
        "traveler",
        Some(created.id),
        json!({ "name": created.name }),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_traveler(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, traveler_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateTravelerRequest>,
) -> AppResult<Json<Traveler>> {
    access.require_edit()?;
    let changeset = TravelerChangeset {
        name: patch_required_text(payload.name, "name")?,
        email: patch_text(payload.email),
        phone: patch_text(payload.phone),
        notes: patch_text(payload.notes),
    };

    let mut conn = state.db()?;
    let existing = find_traveler(&mut conn, access.trip_id(), traveler_id)?;
    let updated: Traveler = diesel::update(travelers::table.find(existing.id))
        .set((&changeset, travelers::updated_at.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "traveler",
        Some(updated.id),
        json!({ "name": updated.name }),
    );

    Ok(Json(updated))
}

pub async fn delete_traveler(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, traveler_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_traveler(&mut conn, access.trip_id(), traveler_id)?;

    diesel::delete(travelers::table.find(existing.id)).execute(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "traveler",
        Some(existing.id),
        json!({ "name": existing.name }),
    );

    Ok(StatusCode::NO_CONTENT)
}

fn find_traveler(conn: &mut PgConnection, trip_id: Uuid, traveler_id: Uuid) -> AppResult<Traveler> {
    travelers::table
        .filter(travelers::id.eq(traveler_id))
        .filter(travelers::trip_id.eq(trip_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}
