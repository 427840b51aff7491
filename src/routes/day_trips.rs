use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::validation::{
    ensure_not_before, optional_text, patch_required, patch_required_text, patch_text,
    require_text,
};
use crate::audit::{self, Action};
use crate::auth::TripAccess;
use crate::error::{AppError, AppResult};
use crate::models::DayTrip;
use crate::schema::day_trips;
use crate::state::AppState;
use crate::utils::json::string_list;

#[derive(Deserialize)]
pub struct CreateDayTripRequest {
    pub name: String,
    pub start_location: String,
    pub end_location: Option<String>,
    pub start_at: NaiveDateTime,
    pub end_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub stops: Value,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateDayTripRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub start_location: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub end_location: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub start_at: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub end_at: Option<Option<NaiveDateTime>>,
    /// `null` empties the list.
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub stops: Option<Option<Value>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub notes: Option<Option<String>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = day_trips)]
struct DayTripChangeset {
    name: Option<String>,
    start_location: Option<String>,
    end_location: Option<Option<String>>,
    start_at: Option<NaiveDateTime>,
    end_at: Option<Option<NaiveDateTime>>,
    stops: Option<Value>,
    notes: Option<Option<String>>,
}

fn parse_stops(value: &Value) -> AppResult<Value> {
    let stops = string_list(value).map_err(|err| AppError::bad_request(format!("stops: {err}")))?;
    Ok(Value::from(stops))
}

pub async fn list_day_trips(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<Vec<DayTrip>>> {
    let mut conn = state.db()?;
    let rows = day_trips::table
        .filter(day_trips::trip_id.eq(access.trip_id()))
        .order(day_trips::start_at.asc())
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn create_day_trip(
    State(state): State<AppState>,
    access: TripAccess,
    Json(payload): Json<CreateDayTripRequest>,
) -> AppResult<(StatusCode, Json<DayTrip>)> {
    access.require_edit()?;
    let name = require_text(&payload.name, "name")?;
    let start_location = require_text(&payload.start_location, "start_location")?;
    ensure_not_before(
        payload.start_at,
        payload.end_at,
        "end_at must not be before start_at",
    )?;
    let stops = parse_stops(&payload.stops)?;

    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let day_trip = DayTrip {
        id: Uuid::new_v4(),
        trip_id: access.trip_id(),
        name,
        start_location,
        end_location: optional_text(payload.end_location),
        start_at: payload.start_at,
        end_at: payload.end_at,
        stops,
        notes: optional_text(payload.notes),
        created_at: now,
        updated_at: now,
    };

    let created: DayTrip = diesel::insert_into(day_trips::table)
        .values(&day_trip)
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Create,
        "day_trip",
        Some(created.id),
        json!({ "name": created.name }),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_day_trip(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, day_trip_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateDayTripRequest>,
) -> AppResult<Json<DayTrip>> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_day_trip(&mut conn, access.trip_id(), day_trip_id)?;

    let start_at = patch_required(payload.start_at, "start_at")?;
    ensure_not_before(
        start_at.unwrap_or(existing.start_at),
        payload.end_at.unwrap_or(existing.end_at),
        "end_at must not be before start_at",
    )?;

    let changeset = DayTripChangeset {
        name: patch_required_text(payload.name, "name")?,
        start_location: patch_required_text(payload.start_location, "start_location")?,
        end_location: patch_text(payload.end_location),
        start_at,
        end_at: payload.end_at,
        stops: payload
            .stops
            .map(|stops| parse_stops(&stops.unwrap_or(Value::Null)))
            .transpose()?,
        notes: patch_text(payload.notes),
    };

    let updated: DayTrip = diesel::update(day_trips::table.find(existing.id))
        .set((&changeset, day_trips::updated_at.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "day_trip",
        Some(updated.id),
        json!({ "name": updated.name }),
    );

    Ok(Json(updated))
}

pub async fn delete_day_trip(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, day_trip_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_day_trip(&mut conn, access.trip_id(), day_trip_id)?;

    diesel::delete(day_trips::table.find(existing.id)).execute(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "day_trip",
        Some(existing.id),
        json!({ "name": existing.name }),
    );

    Ok(StatusCode::NO_CONTENT)
}

fn find_day_trip(conn: &mut PgConnection, trip_id: Uuid, day_trip_id: Uuid) -> AppResult<DayTrip> {
    day_trips::table
        .filter(day_trips::id.eq(day_trip_id))
        .filter(day_trips::trip_id.eq(trip_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}
