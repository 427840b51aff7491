use axum::{extract::State, http::StatusCode, Json};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::documents::{orphaned_keys, remove_objects};
use super::validation::{
    optional_text, patch_required, patch_required_text, patch_text, require_text,
};
use crate::audit::{self, Action};
use crate::auth::access::Permission;
use crate::auth::{AuthenticatedUser, TripAccess, TripRole};
use crate::error::{AppError, AppResult};
use crate::models::Trip;
use crate::schema::{documents, trip_collaborators, trips};
use crate::state::AppState;
use crate::timeline::{trip_length, MAX_TRIP_DAYS};

const SHARE_TOKEN_BYTES: usize = 24;

#[derive(Serialize)]
pub struct TripResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    /// Only disclosed to the owner.
    pub share_token: Option<String>,
    pub role: TripRole,
    pub day_count: u32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TripResponse {
    pub fn new(trip: Trip, role: TripRole) -> Self {
        let share_token = if role == TripRole::Owner {
            trip.share_token
        } else {
            None
        };
        Self {
            day_count: trip_length(trip.start_date, trip.end_date),
            id: trip.id,
            owner_id: trip.owner_id,
            name: trip.name,
            destination: trip.destination,
            start_date: trip.start_date,
            end_date: trip.end_date,
            description: trip.description,
            cover_image_url: trip.cover_image_url,
            share_token,
            role,
            created_at: trip.created_at,
            updated_at: trip.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateTripRequest {
    pub name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTripRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub destination: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub cover_image_url: Option<Option<String>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = trips)]
struct TripChangeset {
    name: Option<String>,
    destination: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    description: Option<Option<String>>,
    cover_image_url: Option<Option<String>>,
}

#[derive(Serialize)]
pub struct ShareResponse {
    pub share_token: String,
    pub share_path: String,
}

fn ensure_date_range(start: NaiveDate, end: NaiveDate) -> AppResult<()> {
    if end < start {
        return Err(AppError::bad_request("end_date must not be before start_date"));
    }
    if trip_length(start, end) > MAX_TRIP_DAYS {
        return Err(AppError::bad_request(format!(
            "a trip cannot be longer than {MAX_TRIP_DAYS} days"
        )));
    }
    Ok(())
}

fn generate_share_token() -> String {
    let mut bytes = [0u8; SHARE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub async fn list_trips(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<TripResponse>>> {
    let mut conn = state.db()?;

    let owned: Vec<Trip> = trips::table
        .filter(trips::owner_id.eq(user.user_id))
        .load(&mut conn)?;
    let shared: Vec<(Trip, String)> = trip_collaborators::table
        .inner_join(trips::table)
        .filter(trip_collaborators::user_id.eq(user.user_id))
        .select((trips::all_columns, trip_collaborators::permission))
        .load(&mut conn)?;

    let mut response: Vec<TripResponse> = owned
        .into_iter()
        .map(|trip| TripResponse::new(trip, TripRole::Owner))
        .chain(shared.into_iter().filter_map(|(trip, permission)| {
            Permission::parse(&permission).map(|p| TripResponse::new(trip, p.into()))
        }))
        .collect();
    response.sort_by(|a, b| {
        a.start_date
            .cmp(&b.start_date)
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(Json(response))
}

pub async fn create_trip(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateTripRequest>,
) -> AppResult<(StatusCode, Json<TripResponse>)> {
    let name = require_text(&payload.name, "name")?;
    let destination = require_text(&payload.destination, "destination")?;
    ensure_date_range(payload.start_date, payload.end_date)?;

    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let trip = Trip {
        id: Uuid::new_v4(),
        owner_id: user.user_id,
        name,
        destination,
        start_date: payload.start_date,
        end_date: payload.end_date,
        description: optional_text(payload.description),
        cover_image_url: optional_text(payload.cover_image_url),
        share_token: None,
        created_at: now,
        updated_at: now,
    };

    let created: Trip = diesel::insert_into(trips::table)
        .values(&trip)
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(created.id),
        Some(user.user_id),
        Action::Create,
        "trip",
        Some(created.id),
        json!({ "name": created.name, "destination": created.destination }),
    );

    Ok((
        StatusCode::CREATED,
        Json(TripResponse::new(created, TripRole::Owner)),
    ))
}

pub async fn get_trip(access: TripAccess) -> AppResult<Json<TripResponse>> {
    Ok(Json(TripResponse::new(access.trip, access.role)))
}

pub async fn update_trip(
    State(state): State<AppState>,
    access: TripAccess,
    Json(payload): Json<UpdateTripRequest>,
) -> AppResult<Json<TripResponse>> {
    access.require_edit()?;
    let start_date = patch_required(payload.start_date, "start_date")?;
    let end_date = patch_required(payload.end_date, "end_date")?;
    ensure_date_range(
        start_date.unwrap_or(access.trip.start_date),
        end_date.unwrap_or(access.trip.end_date),
    )?;

    let changeset = TripChangeset {
        name: patch_required_text(payload.name, "name")?,
        destination: patch_required_text(payload.destination, "destination")?,
        start_date,
        end_date,
        description: patch_text(payload.description),
        cover_image_url: patch_text(payload.cover_image_url),
    };

    let mut conn = state.db()?;
    let updated: Trip = diesel::update(trips::table.find(access.trip_id()))
        .set((&changeset, trips::updated_at.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(updated.id),
        Some(access.user_id()),
        Action::Update,
        "trip",
        Some(updated.id),
        json!({ "name": updated.name }),
    );

    Ok(Json(TripResponse::new(updated, access.role)))
}

pub async fn delete_trip(State(state): State<AppState>, access: TripAccess) -> AppResult<StatusCode> {
    access.require_owner()?;
    let mut conn = state.db()?;

    let keys: Vec<String> = documents::table
        .filter(documents::trip_id.eq(access.trip_id()))
        .select(documents::storage_key)
        .load(&mut conn)?;

    diesel::delete(trips::table.find(access.trip_id())).execute(&mut conn)?;

    audit::record(
        &mut conn,
        None,
        Some(access.user_id()),
        Action::Delete,
        "trip",
        Some(access.trip_id()),
        json!({ "name": access.trip.name }),
    );

    let orphaned = orphaned_keys(&mut conn, keys)?;
    drop(conn);
    remove_objects(&state, orphaned).await;

    info!(trip_id = %access.trip_id(), "trip deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn share_trip(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<ShareResponse>> {
    access.require_owner()?;
    let token = generate_share_token();

    let mut conn = state.db()?;
    diesel::update(trips::table.find(access.trip_id()))
        .set((
            trips::share_token.eq(&token),
            trips::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    info!(
        trip_id = %access.trip_id(),
        rotated = access.trip.share_token.is_some(),
        "share link issued"
    );
    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Share,
        "trip",
        Some(access.trip_id()),
        json!({ "rotated": access.trip.share_token.is_some() }),
    );

    Ok(Json(ShareResponse {
        share_path: format!("/shared/{token}"),
        share_token: token,
    }))
}

pub async fn unshare_trip(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<StatusCode> {
    access.require_owner()?;
    let mut conn = state.db()?;
    diesel::update(trips::table.find(access.trip_id()))
        .set((
            trips::share_token.eq(None::<String>),
            trips::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)?;

    info!(trip_id = %access.trip_id(), "share link revoked");
    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Unshare,
        "trip",
        Some(access.trip_id()),
        json!({}),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(start: NaiveDate, end: NaiveDate) -> Trip {
        let now = Utc::now().naive_utc();
        Trip {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Alps".to_string(),
            destination: "Switzerland".to_string(),
            start_date: start,
            end_date: end,
            description: None,
            cover_image_url: None,
            share_token: Some("secret".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn response_counts_days_and_hides_token_from_collaborators() {
        let start = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 7, 10).unwrap();

        let owner_view = TripResponse::new(trip(start, end), TripRole::Owner);
        assert_eq!(owner_view.day_count, 10);
        assert_eq!(owner_view.share_token.as_deref(), Some("secret"));

        let editor_view = TripResponse::new(trip(start, end), TripRole::Editor);
        assert!(editor_view.share_token.is_none());
    }

    #[test]
    fn date_range_must_not_be_inverted() {
        let day = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert!(ensure_date_range(day, day).is_ok());
        assert!(ensure_date_range(day, day.pred_opt().unwrap()).is_err());

        let last_allowed = day + chrono::Duration::days(i64::from(MAX_TRIP_DAYS) - 1);
        assert!(ensure_date_range(day, last_allowed).is_ok());
        assert!(ensure_date_range(day, last_allowed.succ_opt().unwrap()).is_err());
    }

    #[test]
    fn share_tokens_are_random_hex() {
        let first = generate_share_token();
        assert_eq!(first.len(), SHARE_TOKEN_BYTES * 2);
        assert!(first.chars().all(|ch| ch.is_ascii_hexdigit()));
        assert_ne!(first, generate_share_token());
    }
}
