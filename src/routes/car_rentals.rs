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
    delete_activity_payments, ensure_not_before, optional_text, patch_required,
    patch_required_text, patch_text, require_text, Pricing, PricingInput, PricingPatch,
};
use crate::audit::{self, Action};
use crate::auth::TripAccess;
use crate::error::{AppError, AppResult};
use crate::kinds::ActivityType;
use crate::models::CarRental;
use crate::schema::car_rentals;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateCarRentalRequest {
    pub company: String,
    pub pickup_location: String,
    pub pickup_at: NaiveDateTime,
    pub return_location: Option<String>,
    pub return_at: NaiveDateTime,
    pub car_model: Option<String>,
    pub confirmation_number: Option<String>,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub pricing: PricingInput,
}

#[derive(Deserialize)]
pub struct UpdateCarRentalRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub company: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub pickup_location: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub pickup_at: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub return_location: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub return_at: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub car_model: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub confirmation_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub notes: Option<Option<String>>,
    #[serde(flatten)]
    pub pricing: PricingPatch,
}

#[derive(AsChangeset)]
#[diesel(table_name = car_rentals)]
struct CarRentalChangeset {
    company: Option<String>,
    pickup_location: Option<String>,
    pickup_at: Option<NaiveDateTime>,
    return_location: Option<Option<String>>,
    return_at: Option<NaiveDateTime>,
    car_model: Option<Option<String>>,
    confirmation_number: Option<Option<String>>,
    price_cents: Option<Option<i64>>,
    currency: Option<Option<String>>,
    payment_status: Option<Option<String>>,
    document_id: Option<Option<Uuid>>,
    notes: Option<Option<String>>,
}

pub async fn list_car_rentals(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<Vec<CarRental>>> {
    let mut conn = state.db()?;
    let rows = car_rentals::table
        .filter(car_rentals::trip_id.eq(access.trip_id()))
        .order(car_rentals::pickup_at.asc())
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn create_car_rental(
    State(state): State<AppState>,
    access: TripAccess,
    Json(payload): Json<CreateCarRentalRequest>,
) -> AppResult<(StatusCode, Json<CarRental>)> {
    access.require_edit()?;
    let company = require_text(&payload.company, "company")?;
    let pickup_location = require_text(&payload.pickup_location, "pickup_location")?;
    ensure_not_before(
        payload.pickup_at,
        Some(payload.return_at),
        "return_at must not be before pickup_at",
    )?;

    let mut conn = state.db()?;
    let pricing = Pricing::from_input(&mut conn, access.trip_id(), payload.pricing)?;
    let now = Utc::now().naive_utc();
    let rental = CarRental {
        id: Uuid::new_v4(),
        trip_id: access.trip_id(),
        company,
        pickup_location,
        pickup_at: payload.pickup_at,
        return_location: optional_text(payload.return_location),
        return_at: payload.return_at,
        car_model: optional_text(payload.car_model),
        confirmation_number: optional_text(payload.confirmation_number),
        price_cents: pricing.price_cents,
        currency: pricing.currency,
        payment_status: pricing.payment_status,
        document_id: pricing.document_id,
        notes: optional_text(payload.notes),
        created_at: now,
        updated_at: now,
    };

    let created: CarRental = diesel::insert_into(car_rentals::table)
        .values(&rental)
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Create,
        "car_rental",
        Some(created.id),
        json!({ "company": created.company }),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_car_rental(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, rental_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateCarRentalRequest>,
) -> AppResult<Json<CarRental>> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_car_rental(&mut conn, access.trip_id(), rental_id)?;

    let pickup_at = patch_required(payload.pickup_at, "pickup_at")?;
    let return_at = patch_required(payload.return_at, "return_at")?;
    ensure_not_before(
        pickup_at.unwrap_or(existing.pickup_at),
        Some(return_at.unwrap_or(existing.return_at)),
        "return_at must not be before pickup_at",
    )?;

    let current = Pricing {
        price_cents: existing.price_cents,
        currency: existing.currency.clone(),
        payment_status: existing.payment_status.clone(),
        document_id: existing.document_id,
    };
    let pricing = current.merge(&mut conn, access.trip_id(), payload.pricing)?;

    let changeset = CarRentalChangeset {
        company: patch_required_text(payload.company, "company")?,
        pickup_location: patch_required_text(payload.pickup_location, "pickup_location")?,
        pickup_at,
        return_location: patch_text(payload.return_location),
        return_at,
        car_model: patch_text(payload.car_model),
        confirmation_number: patch_text(payload.confirmation_number),
        price_cents: Some(pricing.price_cents),
        currency: Some(pricing.currency),
        payment_status: Some(pricing.payment_status),
        document_id: Some(pricing.document_id),
        notes: patch_text(payload.notes),
    };

    let updated: CarRental = diesel::update(car_rentals::table.find(existing.id))
        .set((&changeset, car_rentals::updated_at.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "car_rental",
        Some(updated.id),
        json!({ "company": updated.company }),
    );

    Ok(Json(updated))
}

pub async fn delete_car_rental(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, rental_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_car_rental(&mut conn, access.trip_id(), rental_id)?;

    conn.transaction::<_, AppError, _>(|conn| {
        delete_activity_payments(conn, ActivityType::CarRental, existing.id)?;
        diesel::delete(car_rentals::table.find(existing.id)).execute(conn)?;
        Ok(())
    })?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "car_rental",
        Some(existing.id),
        json!({ "company": existing.company }),
    );

    Ok(StatusCode::NO_CONTENT)
}

fn find_car_rental(
    conn: &mut PgConnection,
    trip_id: Uuid,
    rental_id: Uuid,
) -> AppResult<CarRental> {
    car_rentals::table
        .filter(car_rentals::id.eq(rental_id))
        .filter(car_rentals::trip_id.eq(trip_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}
