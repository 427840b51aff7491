//! Driving/walking routes of a trip and their points of interest.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use diesel::{dsl::max, prelude::*};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::validation::{
    choice, optional_text, patch_required, patch_required_text, patch_text, require_text,
};
use crate::audit::{self, Action};
use crate::auth::TripAccess;
use crate::error::{AppError, AppResult};
use crate::itinerary::RouteWithPois;
use crate::kinds::POI_TYPES;
use crate::models::{Route, RoutePointOfInterest};
use crate::schema::{route_points_of_interest, routes};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateRouteRequest {
    pub name: String,
    pub name_local: Option<String>,
    pub route_date: NaiveDate,
    pub start_time: Option<String>,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<i32>,
    pub map_config: Option<Value>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateRouteRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub name_local: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub route_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub start_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub distance_km: Option<Option<f64>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub duration_minutes: Option<Option<i32>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub map_config: Option<Option<Value>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub notes: Option<Option<String>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = routes)]
struct RouteChangeset {
    name: Option<String>,
    name_local: Option<Option<String>>,
    route_date: Option<NaiveDate>,
    start_time: Option<Option<NaiveTime>>,
    distance_km: Option<Option<f64>>,
    duration_minutes: Option<Option<i32>>,
    map_config: Option<Option<Value>>,
    notes: Option<Option<String>>,
}

#[derive(Deserialize)]
pub struct CreatePoiRequest {
    pub name: String,
    pub name_local: Option<String>,
    pub poi_type: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub position: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdatePoiRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub name_local: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub poi_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub latitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub longitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub position: Option<Option<i32>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub notes: Option<Option<String>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = route_points_of_interest)]
struct PoiChangeset {
    name: Option<String>,
    name_local: Option<Option<String>>,
    poi_type: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    position: Option<i32>,
    notes: Option<Option<String>>,
}

/// Accepts `HH:MM` as well as `HH:MM:SS`.
fn parse_start_time(value: &str) -> AppResult<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| AppError::bad_request("start_time must be formatted as HH:MM or HH:MM:SS"))
}

fn optional_start_time(value: Option<String>) -> AppResult<Option<NaiveTime>> {
    optional_text(value)
        .as_deref()
        .map(parse_start_time)
        .transpose()
}

fn check_route_metrics(distance_km: Option<f64>, duration_minutes: Option<i32>) -> AppResult<()> {
    if matches!(distance_km, Some(km) if !km.is_finite() || km < 0.0) {
        return Err(AppError::bad_request("distance_km must not be negative"));
    }
    if matches!(duration_minutes, Some(minutes) if minutes < 0) {
        return Err(AppError::bad_request("duration_minutes must not be negative"));
    }
    Ok(())
}

fn check_map_config(map_config: Option<&Value>) -> AppResult<()> {
    match map_config {
        None | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(AppError::bad_request("map_config must be a JSON object")),
    }
}

fn check_coordinates(latitude: f64, longitude: f64) -> AppResult<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(AppError::bad_request("latitude must be between -90 and 90"));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::bad_request("longitude must be between -180 and 180"));
    }
    Ok(())
}

pub async fn list_routes(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<Vec<RouteWithPois>>> {
    let mut conn = state.db()?;
    let route_rows: Vec<Route> = routes::table
        .filter(routes::trip_id.eq(access.trip_id()))
        .order((routes::route_date.asc(), routes::start_time.asc(), routes::name.asc()))
        .load(&mut conn)?;

    let pois: Vec<RoutePointOfInterest> = RoutePointOfInterest::belonging_to(&route_rows)
        .order((
            route_points_of_interest::position.asc(),
            route_points_of_interest::created_at.asc(),
        ))
        .load(&mut conn)?;

    let response = pois
        .grouped_by(&route_rows)
        .into_iter()
        .zip(route_rows)
        .map(|(points_of_interest, route)| RouteWithPois {
            route,
            points_of_interest,
        })
        .collect();

    Ok(Json(response))
}

pub async fn create_route(
    State(state): State<AppState>,
    access: TripAccess,
    Json(payload): Json<CreateRouteRequest>,
) -> AppResult<(StatusCode, Json<RouteWithPois>)> {
    access.require_edit()?;
    let name = require_text(&payload.name, "name")?;
    let start_time = optional_start_time(payload.start_time)?;
    check_route_metrics(payload.distance_km, payload.duration_minutes)?;
    check_map_config(payload.map_config.as_ref())?;

    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let route = Route {
        id: Uuid::new_v4(),
        trip_id: access.trip_id(),
        name,
        name_local: optional_text(payload.name_local),
        route_date: payload.route_date,
        start_time,
        distance_km: payload.distance_km,
        duration_minutes: payload.duration_minutes,
        map_config: payload.map_config,
        notes: optional_text(payload.notes),
        created_at: now,
        updated_at: now,
    };

    let created: Route = diesel::insert_into(routes::table)
        .values(&route)
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Create,
        "route",
        Some(created.id),
        json!({ "name": created.name }),
    );

    Ok((
        StatusCode::CREATED,
        Json(RouteWithPois {
            route: created,
            points_of_interest: Vec::new(),
        }),
    ))
}

pub async fn update_route(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, route_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateRouteRequest>,
) -> AppResult<Json<RouteWithPois>> {
    access.require_edit()?;
    let start_time = payload
        .start_time
        .map(optional_start_time)
        .transpose()?;
    check_route_metrics(payload.distance_km.flatten(), payload.duration_minutes.flatten())?;
    check_map_config(payload.map_config.as_ref().and_then(Option::as_ref))?;

    let changeset = RouteChangeset {
        name: patch_required_text(payload.name, "name")?,
        name_local: patch_text(payload.name_local),
        route_date: patch_required(payload.route_date, "route_date")?,
        start_time,
        distance_km: payload.distance_km,
        duration_minutes: payload.duration_minutes,
        map_config: payload.map_config,
        notes: patch_text(payload.notes),
    };

    let mut conn = state.db()?;
    let existing = find_route(&mut conn, access.trip_id(), route_id)?;
    let updated: Route = diesel::update(routes::table.find(existing.id))
        .set((&changeset, routes::updated_at.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)?;

    let points_of_interest = load_pois(&mut conn, updated.id)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "route",
        Some(updated.id),
        json!({ "name": updated.name }),
    );

    Ok(Json(RouteWithPois {
        route: updated,
        points_of_interest,
    }))
}

pub async fn delete_route(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, route_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_route(&mut conn, access.trip_id(), route_id)?;

    // Points of interest go with the route through the foreign key cascade.
    diesel::delete(routes::table.find(existing.id)).execute(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "route",
        Some(existing.id),
        json!({ "name": existing.name }),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_pois(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, route_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Vec<RoutePointOfInterest>>> {
    let mut conn = state.db()?;
    let route = find_route(&mut conn, access.trip_id(), route_id)?;
    Ok(Json(load_pois(&mut conn, route.id)?))
}

pub async fn create_poi(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, route_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreatePoiRequest>,
) -> AppResult<(StatusCode, Json<RoutePointOfInterest>)> {
    access.require_edit()?;
    let name = require_text(&payload.name, "name")?;
    let poi_type = choice(
        payload.poi_type.as_deref().unwrap_or("attraction"),
        POI_TYPES,
        "poi_type",
    )?;
    check_coordinates(payload.latitude, payload.longitude)?;

    let mut conn = state.db()?;
    let route = find_route(&mut conn, access.trip_id(), route_id)?;

    let position = match payload.position {
        Some(position) => position,
        None => {
            let last: Option<i32> = route_points_of_interest::table
                .filter(route_points_of_interest::route_id.eq(route.id))
                .select(max(route_points_of_interest::position))
                .first(&mut conn)?;
            last.map(|value| value + 1).unwrap_or(0)
        }
    };

    let poi = RoutePointOfInterest {
        id: Uuid::new_v4(),
        route_id: route.id,
        name,
        name_local: optional_text(payload.name_local),
        poi_type,
        latitude: payload.latitude,
        longitude: payload.longitude,
        position,
        notes: optional_text(payload.notes),
        created_at: Utc::now().naive_utc(),
    };

    let created: RoutePointOfInterest = diesel::insert_into(route_points_of_interest::table)
        .values(&poi)
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Create,
        "route_poi",
        Some(created.id),
        json!({ "route_id": route.id, "name": created.name }),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_poi(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, route_id, poi_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(payload): Json<UpdatePoiRequest>,
) -> AppResult<Json<RoutePointOfInterest>> {
    access.require_edit()?;
    let poi_type = patch_required_text(payload.poi_type, "poi_type")?
        .map(|value| choice(&value, POI_TYPES, "poi_type"))
        .transpose()?;
    let latitude = patch_required(payload.latitude, "latitude")?;
    let longitude = patch_required(payload.longitude, "longitude")?;

    let mut conn = state.db()?;
    let route = find_route(&mut conn, access.trip_id(), route_id)?;
    let existing = find_poi(&mut conn, route.id, poi_id)?;
    check_coordinates(
        latitude.unwrap_or(existing.latitude),
        longitude.unwrap_or(existing.longitude),
    )?;

    let changeset = PoiChangeset {
        name: patch_required_text(payload.name, "name")?,
        name_local: patch_text(payload.name_local),
        poi_type,
        latitude,
        longitude,
        position: patch_required(payload.position, "position")?,
        notes: patch_text(payload.notes),
    };

    // Diesel rejects an empty changeset; this table has no updated_at to pad it.
    let updated: RoutePointOfInterest = if changeset_is_empty(&changeset) {
        existing
    } else {
        diesel::update(route_points_of_interest::table.find(existing.id))
            .set(&changeset)
            .get_result(&mut conn)?
    };

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "route_poi",
        Some(updated.id),
        json!({ "route_id": route.id, "name": updated.name }),
    );

    Ok(Json(updated))
}

pub async fn delete_poi(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, route_id, poi_id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let route = find_route(&mut conn, access.trip_id(), route_id)?;
    let existing = find_poi(&mut conn, route.id, poi_id)?;

    diesel::delete(route_points_of_interest::table.find(existing.id)).execute(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "route_poi",
        Some(existing.id),
        json!({ "route_id": route.id, "name": existing.name }),
    );

    Ok(StatusCode::NO_CONTENT)
}

fn changeset_is_empty(changeset: &PoiChangeset) -> bool {
    changeset.name.is_none()
        && changeset.name_local.is_none()
        && changeset.poi_type.is_none()
        && changeset.latitude.is_none()
        && changeset.longitude.is_none()
        && changeset.position.is_none()
        && changeset.notes.is_none()
}

fn find_route(conn: &mut PgConnection, trip_id: Uuid, route_id: Uuid) -> AppResult<Route> {
    routes::table
        .filter(routes::id.eq(route_id))
        .filter(routes::trip_id.eq(trip_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}

fn find_poi(
    conn: &mut PgConnection,
    route_id: Uuid,
    poi_id: Uuid,
) -> AppResult<RoutePointOfInterest> {
    route_points_of_interest::table
        .filter(route_points_of_interest::id.eq(poi_id))
        .filter(route_points_of_interest::route_id.eq(route_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}

fn load_pois(conn: &mut PgConnection, route_id: Uuid) -> QueryResult<Vec<RoutePointOfInterest>> {
    route_points_of_interest::table
        .filter(route_points_of_interest::route_id.eq(route_id))
        .order((
            route_points_of_interest::position.asc(),
            route_points_of_interest::created_at.asc(),
        ))
        .load(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_time_accepts_minutes_and_seconds() {
        assert_eq!(
            parse_start_time("09:30").unwrap(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(
            parse_start_time("18:05:10").unwrap(),
            NaiveTime::from_hms_opt(18, 5, 10).unwrap()
        );
        assert!(parse_start_time("25:00").is_err());
        assert_eq!(optional_start_time(Some("  ".to_string())).unwrap(), None);
    }

    #[test]
    fn coordinates_are_range_checked() {
        assert!(check_coordinates(46.95, 7.44).is_ok());
        assert!(check_coordinates(-90.0, 180.0).is_ok());
        assert!(check_coordinates(90.5, 0.0).is_err());
        assert!(check_coordinates(0.0, -180.1).is_err());
    }

    #[test]
    fn map_config_must_be_an_object() {
        assert!(check_map_config(None).is_ok());
        assert!(check_map_config(Some(&json!({ "zoom": 11 }))).is_ok());
        assert!(check_map_config(Some(&json!([1, 2]))).is_err());
    }

    #[test]
    fn route_metrics_reject_negative_values() {
        assert!(check_route_metrics(Some(12.5), Some(90)).is_ok());
        assert!(check_route_metrics(Some(-1.0), None).is_err());
        assert!(check_route_metrics(None, Some(-5)).is_err());
    }
}
