use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::validation::{
    delete_activity_payments, optional_text, patch_required_text, patch_text, require_text,
    Pricing, PricingInput, PricingPatch,
};
use crate::audit::{self, Action};
use crate::auth::TripAccess;
use crate::error::{AppError, AppResult};
use crate::kinds::ActivityType;
use crate::models::Restaurant;
use crate::schema::restaurants;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateRestaurantRequest {
    pub name: String,
    pub address: Option<String>,
    pub cuisine: Option<String>,
    pub reservation_at: Option<NaiveDateTime>,
    pub party_size: Option<i32>,
    pub confirmation_number: Option<String>,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub pricing: PricingInput,
}

#[derive(Deserialize)]
pub struct UpdateRestaurantRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub cuisine: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub reservation_at: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub party_size: Option<Option<i32>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub confirmation_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub notes: Option<Option<String>>,
    #[serde(flatten)]
    pub pricing: PricingPatch,
}

#[derive(AsChangeset)]
#[diesel(table_name = restaurants)]
struct RestaurantChangeset {
    name: Option<String>,
    address: Option<Option<String>>,
    cuisine: Option<Option<String>>,
    reservation_at: Option<Option<NaiveDateTime>>,
    party_size: Option<Option<i32>>,
    confirmation_number: Option<Option<String>>,
    price_cents: Option<Option<i64>>,
    currency: Option<Option<String>>,
    payment_status: Option<Option<String>>,
    document_id: Option<Option<Uuid>>,
    notes: Option<Option<String>>,
}

fn check_party_size(party_size: Option<i32>) -> AppResult<()> {
    match party_size {
        Some(size) if size < 1 => Err(AppError::bad_request("party_size must be at least 1")),
        _ => Ok(()),
    }
}

pub async fn list_restaurants(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<Vec<Restaurant>>> {
    let mut conn = state.db()?;
    let rows = restaurants::table
        .filter(restaurants::trip_id.eq(access.trip_id()))
        .order((restaurants::reservation_at.asc(), restaurants::name.asc()))
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn create_restaurant(
    State(state): State<AppState>,
    access: TripAccess,
    Json(payload): Json<CreateRestaurantRequest>,
) -> AppResult<(StatusCode, Json<Restaurant>)> {
    access.require_edit()?;
    let name = require_text(&payload.name, "name")?;
    check_party_size(payload.party_size)?;

    let mut conn = state.db()?;
    let pricing = Pricing::from_input(&mut conn, access.trip_id(), payload.pricing)?;
    let now = Utc::now().naive_utc();
    let restaurant = Restaurant {
        id: Uuid::new_v4(),
        trip_id: access.trip_id(),
        name,
        address: optional_text(payload.address),
        cuisine: optional_text(payload.cuisine),
        reservation_at: payload.reservation_at,
        party_size: payload.party_size,
        confirmation_number: optional_text(payload.confirmation_number),
        price_cents: pricing.price_cents,
        currency: pricing.currency,
        payment_status: pricing.payment_status,
        document_id: pricing.document_id,
        notes: optional_text(payload.notes),
        created_at: now,
        updated_at: now,
    };

    let created: Restaurant = diesel::insert_into(restaurants::table)
        .values(&restaurant)
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Create,
        "restaurant",
        Some(created.id),
        json!({ "name": created.name }),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_restaurant(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, restaurant_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateRestaurantRequest>,
) -> AppResult<Json<Restaurant>> {
    access.require_edit()?;
    check_party_size(payload.party_size.flatten())?;
    let mut conn = state.db()?;
    let existing = find_restaurant(&mut conn, access.trip_id(), restaurant_id)?;

    let current = Pricing {
        price_cents: existing.price_cents,
        currency: existing.currency.clone(),
        payment_status: existing.payment_status.clone(),
        document_id: existing.document_id,
    };
    let pricing = current.merge(&mut conn, access.trip_id(), payload.pricing)?;

    let changeset = RestaurantChangeset {
        name: patch_required_text(payload.name, "name")?,
        address: patch_text(payload.address),
        cuisine: patch_text(payload.cuisine),
        reservation_at: payload.reservation_at,
        party_size: payload.party_size,
        confirmation_number: patch_text(payload.confirmation_number),
        price_cents: Some(pricing.price_cents),
        currency: Some(pricing.currency),
        payment_status: Some(pricing.payment_status),
        document_id: Some(pricing.document_id),
        notes: patch_text(payload.notes),
    };

    let updated: Restaurant = diesel::update(restaurants::table.find(existing.id))
        .set((&changeset, restaurants::updated_at.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "restaurant",
        Some(updated.id),
        json!({ "name": updated.name }),
    );

    Ok(Json(updated))
}

pub async fn delete_restaurant(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, restaurant_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_restaurant(&mut conn, access.trip_id(), restaurant_id)?;

    conn.transaction::<_, AppError, _>(|conn| {
        delete_activity_payments(conn, ActivityType::Restaurant, existing.id)?;
        diesel::delete(restaurants::table.find(existing.id)).execute(conn)?;
        Ok(())
    })?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "restaurant",
        Some(existing.id),
        json!({ "name": existing.name }),
    );

    Ok(StatusCode::NO_CONTENT)
}

fn find_restaurant(
    conn: &mut PgConnection,
    trip_id: Uuid,
    restaurant_id: Uuid,
) -> AppResult<Restaurant> {
    restaurants::table
        .filter(restaurants::id.eq(restaurant_id))
        .filter(restaurants::trip_id.eq(trip_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}
