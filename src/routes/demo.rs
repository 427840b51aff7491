use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use diesel::prelude::*;
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::auth::{issue_session, LoginResponse};
use crate::audit::{self, Action};
use crate::demo::copy_trip;
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, User};
use crate::schema::users;
use crate::state::AppState;

const DEMO_ROLE: &str = "demo";

#[derive(Serialize)]
pub struct DemoResponse {
    #[serde(flatten)]
    pub session: LoginResponse,
    pub trip_id: Uuid,
}

fn demo_username() -> String {
    let mut suffix = [0u8; 4];
    OsRng.fill_bytes(&mut suffix);
    format!("demo-{}", hex::encode(suffix))
}

pub async fn provision_demo(
    State(state): State<AppState>,
) -> AppResult<(HeaderMap, Json<DemoResponse>)> {
    let template_id = state
        .config
        .demo_template_trip_id
        .ok_or_else(|| AppError::new(StatusCode::NOT_FOUND, "demo is not available"))?;

    let mut conn = state.db()?;
    let (user, trip) = conn.transaction::<_, AppError, _>(|conn| {
        let user: User = diesel::insert_into(users::table)
            .values(&NewUser {
                id: Uuid::new_v4(),
                username: demo_username(),
                email: None,
                display_name: Some("Demo traveler".to_string()),
                password_hash: None,
                open_id: None,
                role: DEMO_ROLE.to_string(),
            })
            .get_result(conn)?;

        let trip = copy_trip(conn, template_id, user.id)?.ok_or_else(|| {
            AppError::new(StatusCode::NOT_FOUND, "demo template trip not found")
        })?;
        Ok((user, trip))
    })?;

    audit::record(
        &mut conn,
        Some(trip.id),
        Some(user.id),
        Action::Provision,
        "trip",
        Some(trip.id),
        json!({ "template_id": template_id }),
    );

    info!(
        user_id = %user.id,
        trip_id = %trip.id,
        template_id = %template_id,
        "demo account provisioned"
    );

    let (headers, session) = issue_session(&state, &mut conn, &user)?;
    Ok((
        headers,
        Json(DemoResponse {
            session,
            trip_id: trip.id,
        }),
    ))
}
