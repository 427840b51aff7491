use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::validation::optional_text;
use crate::audit::{self, Action};
use crate::auth::access::Permission;
use crate::auth::{TripAccess, TripRole};
use crate::error::{AppError, AppResult};
use crate::models::{NewTripCollaborator, TripCollaborator};
use crate::schema::{trip_collaborators, users};
use crate::state::AppState;
use crate::users as user_lookup;

#[derive(Serialize)]
pub struct CollaboratorResponse {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub permission: String,
    pub invited_by: Option<Uuid>,
    pub visit_count: i32,
    pub last_visited_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl CollaboratorResponse {
    fn new(row: TripCollaborator, username: String, display_name: Option<String>) -> Self {
        Self {
            user_id: row.user_id,
            username,
            display_name,
            permission: row.permission,
            invited_by: row.invited_by,
            visit_count: row.visit_count,
            last_visited_at: row.last_visited_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct AddCollaboratorRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub permission: String,
}

#[derive(Deserialize)]
pub struct UpdateCollaboratorRequest {
    pub permission: String,
}

fn parse_permission(value: &str) -> AppResult<Permission> {
    Permission::parse(value)
        .ok_or_else(|| AppError::bad_request("permission must be one of: view, edit"))
}

pub async fn list_collaborators(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<Vec<CollaboratorResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<(TripCollaborator, String, Option<String>)> = trip_collaborators::table
        .inner_join(users::table)
        .filter(trip_collaborators::trip_id.eq(access.trip_id()))
        .select((
            trip_collaborators::all_columns,
            users::username,
            users::display_name,
        ))
        .order(users::username.asc())
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|(row, username, display_name)| {
                CollaboratorResponse::new(row, username, display_name)
            })
            .collect(),
    ))
}

pub async fn add_collaborator(
    State(state): State<AppState>,
    access: TripAccess,
    Json(payload): Json<AddCollaboratorRequest>,
) -> AppResult<(StatusCode, Json<CollaboratorResponse>)> {
    access.require_owner()?;
    let permission = parse_permission(&payload.permission)?;

    let mut conn = state.db()?;
    let user = match (optional_text(payload.username), optional_text(payload.email)) {
        (Some(username), _) => user_lookup::find_by_username(&mut conn, &username)?,
        (None, Some(email)) => user_lookup::find_by_email(&mut conn, &email)?,
        (None, None) => return Err(AppError::bad_request("username or email is required")),
    }
    .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "user not found"))?;

    if user.id == access.trip.owner_id {
        return Err(AppError::bad_request("the trip owner cannot be added as a collaborator"));
    }

    let existing = find_collaborator(&mut conn, access.trip_id(), user.id)?;
    let row: TripCollaborator = diesel::insert_into(trip_collaborators::table)
        .values(&NewTripCollaborator {
            trip_id: access.trip_id(),
            user_id: user.id,
            permission: permission.as_str().to_string(),
            invited_by: Some(access.user_id()),
        })
        .on_conflict((trip_collaborators::trip_id, trip_collaborators::user_id))
        .do_update()
        .set(trip_collaborators::permission.eq(permission.as_str()))
        .get_result(&mut conn)?;

    info!(
        trip_id = %access.trip_id(),
        collaborator_id = %user.id,
        permission = permission.as_str(),
        "collaborator saved"
    );
    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        if existing.is_some() { Action::Update } else { Action::Create },
        "collaborator",
        Some(user.id),
        json!({ "username": user.username, "permission": permission.as_str() }),
    );

    let status = if existing.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(CollaboratorResponse::new(row, user.username, user.display_name)),
    ))
}

pub async fn update_collaborator(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateCollaboratorRequest>,
) -> AppResult<Json<CollaboratorResponse>> {
    access.require_owner()?;
    let permission = parse_permission(&payload.permission)?;

    let mut conn = state.db()?;
    find_collaborator(&mut conn, access.trip_id(), user_id)?.ok_or_else(AppError::not_found)?;

    let row: TripCollaborator = diesel::update(
        trip_collaborators::table
            .filter(trip_collaborators::trip_id.eq(access.trip_id()))
            .filter(trip_collaborators::user_id.eq(user_id)),
    )
    .set(trip_collaborators::permission.eq(permission.as_str()))
    .get_result(&mut conn)?;

    let (username, display_name): (String, Option<String>) = users::table
        .find(user_id)
        .select((users::username, users::display_name))
        .first(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "collaborator",
        Some(user_id),
        json!({ "permission": permission.as_str() }),
    );

    Ok(Json(CollaboratorResponse::new(row, username, display_name)))
}

/// Owners remove anyone; a collaborator may only remove themself.
pub async fn remove_collaborator(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    if access.role != TripRole::Owner && user_id != access.user_id() {
        return Err(AppError::forbidden("only the trip owner can remove collaborators"));
    }

    let mut conn = state.db()?;
    let removed = diesel::delete(
        trip_collaborators::table
            .filter(trip_collaborators::trip_id.eq(access.trip_id()))
            .filter(trip_collaborators::user_id.eq(user_id)),
    )
    .execute(&mut conn)?;
    if removed == 0 {
        return Err(AppError::not_found());
    }

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "collaborator",
        Some(user_id),
        json!({ "left": user_id == access.user_id() }),
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn record_visit(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<StatusCode> {
    if access.role == TripRole::Owner {
        return Ok(StatusCode::NO_CONTENT);
    }

    let mut conn = state.db()?;
    diesel::update(
        trip_collaborators::table
            .filter(trip_collaborators::trip_id.eq(access.trip_id()))
            .filter(trip_collaborators::user_id.eq(access.user_id())),
    )
    .set((
        trip_collaborators::visit_count.eq(trip_collaborators::visit_count + 1),
        trip_collaborators::last_visited_at.eq(Utc::now().naive_utc()),
    ))
    .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

fn find_collaborator(
    conn: &mut PgConnection,
    trip_id: Uuid,
    user_id: Uuid,
) -> QueryResult<Option<TripCollaborator>> {
    trip_collaborators::table
        .filter(trip_collaborators::trip_id.eq(trip_id))
        .filter(trip_collaborators::user_id.eq(user_id))
        .first(conn)
        .optional()
}
