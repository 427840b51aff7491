//! Public read-only view behind a trip's share token.
//!
//! Documents, payments, travelers and collaborators stay private; the view
//! only carries what a guest needs to follow the itinerary.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::itinerary::{Itinerary, RouteWithPois};
use crate::models::{
    CarRental, ChecklistItem, DayTrip, Hotel, Restaurant, TouristSite, Transportation, Trip,
};
use crate::schema::trips;
use crate::state::AppState;
use crate::timeline::{trip_length, TimelineEvent};

#[derive(Serialize)]
pub struct SharedTrip {
    pub id: Uuid,
    pub name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub day_count: u32,
}

#[derive(Serialize)]
pub struct SharedTripView {
    pub trip: SharedTrip,
    pub hotels: Vec<Hotel>,
    pub transportation: Vec<Transportation>,
    pub car_rentals: Vec<CarRental>,
    pub restaurants: Vec<Restaurant>,
    pub tourist_sites: Vec<TouristSite>,
    pub day_trips: Vec<DayTrip>,
    pub routes: Vec<RouteWithPois>,
    pub checklist: Vec<ChecklistItem>,
    pub timeline: Vec<TimelineEvent>,
}

impl SharedTripView {
    fn new(trip: Trip, itinerary: Itinerary) -> Self {
        let timeline = itinerary.timeline();
        let routes = itinerary.routes_with_pois();
        Self {
            trip: SharedTrip {
                day_count: trip_length(trip.start_date, trip.end_date),
                id: trip.id,
                name: trip.name,
                destination: trip.destination,
                start_date: trip.start_date,
                end_date: trip.end_date,
                description: trip.description,
                cover_image_url: trip.cover_image_url,
            },
            hotels: itinerary.hotels,
            transportation: itinerary.transportation,
            car_rentals: itinerary.car_rentals,
            restaurants: itinerary.restaurants,
            tourist_sites: itinerary.tourist_sites,
            day_trips: itinerary.day_trips,
            routes,
            checklist: itinerary.checklist,
            timeline,
        }
    }
}

pub async fn get_shared_trip(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<SharedTripView>> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::trip_not_found());
    }

    let mut conn = state.db()?;
    let trip: Trip = trips::table
        .filter(trips::share_token.eq(token))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::trip_not_found)?;
    let itinerary = Itinerary::load(&mut conn, trip.id)?;

    Ok(Json(SharedTripView::new(trip, itinerary)))
}
