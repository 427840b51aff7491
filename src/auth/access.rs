//! Trip-level authorization.
//!
//! Every trip-scoped route takes a [`TripAccess`] instead of repeating the
//! owner/collaborator lookup. The extractor resolves the caller's role once;
//! handlers then ask for the level they need.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use diesel::{prelude::*, PgConnection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthenticatedUser;
use crate::{
    error::{AppError, AppResult},
    models::{Trip, TripCollaborator},
    schema::{trip_collaborators, trips},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    View,
    Edit,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Edit => "edit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "view" => Some(Permission::View),
            "edit" => Some(Permission::Edit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TripRole {
    Owner,
    Editor,
    Viewer,
}

impl TripRole {
    pub fn can_edit(self) -> bool {
        matches!(self, TripRole::Owner | TripRole::Editor)
    }
}

impl From<Permission> for TripRole {
    fn from(value: Permission) -> Self {
        match value {
            Permission::View => TripRole::Viewer,
            Permission::Edit => TripRole::Editor,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TripAccess {
    pub trip: Trip,
    pub role: TripRole,
    pub user: AuthenticatedUser,
}

impl TripAccess {
    pub fn trip_id(&self) -> Uuid {
        self.trip.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user.user_id
    }

    pub fn require_edit(&self) -> AppResult<()> {
        if self.role.can_edit() {
            Ok(())
        } else {
            Err(AppError::forbidden("edit permission required for this trip"))
        }
    }

    pub fn require_owner(&self) -> AppResult<()> {
        if self.role == TripRole::Owner {
            Ok(())
        } else {
            Err(AppError::forbidden("only the trip owner can do this"))
        }
    }
}

/// Resolves the caller's role on a trip. Missing trips and trips the user has
/// no relationship with produce the same error.
pub fn resolve_trip_role(
    conn: &mut PgConnection,
    trip_id: Uuid,
    user_id: Uuid,
) -> AppResult<(Trip, TripRole)> {
    let trip = trips::table
        .find(trip_id)
        .first::<Trip>(conn)
        .optional()?
        .ok_or_else(AppError::trip_not_found)?;

    if trip.owner_id == user_id {
        return Ok((trip, TripRole::Owner));
    }

    let collaborator = trip_collaborators::table
        .filter(trip_collaborators::trip_id.eq(trip_id))
        .filter(trip_collaborators::user_id.eq(user_id))
        .first::<TripCollaborator>(conn)
        .optional()?;

    match collaborator.and_then(|c| Permission::parse(&c.permission)) {
        Some(permission) => Ok((trip, permission.into())),
        None => Err(AppError::trip_not_found()),
    }
}

#[derive(Deserialize)]
struct TripPath {
    trip_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for TripAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        let Path(TripPath { trip_id }) = Path::<TripPath>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::bad_request("trip id must be a valid UUID"))?;

        let mut conn = state.db()?;
        let (trip, role) = resolve_trip_role(&mut conn, trip_id, user.user_id)?;

        Ok(TripAccess { trip, role, user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_parsing_is_case_insensitive() {
        assert_eq!(Permission::parse("Edit"), Some(Permission::Edit));
        assert_eq!(Permission::parse(" view "), Some(Permission::View));
        assert_eq!(Permission::parse("admin"), None);
    }

    #[test]
    fn only_owner_and_editor_can_edit() {
        assert!(TripRole::Owner.can_edit());
        assert!(TripRole::Editor.can_edit());
        assert!(!TripRole::Viewer.can_edit());
        assert_eq!(TripRole::from(Permission::View), TripRole::Viewer);
    }
}
