use axum::{extract::State, Json};

use crate::auth::TripAccess;
use crate::error::AppResult;
use crate::itinerary::Itinerary;
use crate::state::AppState;
use crate::timeline::{group_by_day, DayPlan, TimelineEvent};

pub async fn get_timeline(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<Vec<TimelineEvent>>> {
    let mut conn = state.db()?;
    let itinerary = Itinerary::load(&mut conn, access.trip_id())?;
    Ok(Json(itinerary.timeline()))
}

pub async fn get_days(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<DayPlan>> {
    let mut conn = state.db()?;
    let itinerary = Itinerary::load(&mut conn, access.trip_id())?;
    Ok(Json(group_by_day(
        access.trip.start_date,
        access.trip.end_date,
        itinerary.timeline(),
    )))
}
