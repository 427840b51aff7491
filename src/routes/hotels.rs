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
use crate::models::Hotel;
use crate::schema::hotels;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateHotelRequest {
    pub name: String,
    pub address: Option<String>,
    pub check_in: NaiveDateTime,
    pub check_out: NaiveDateTime,
    pub confirmation_number: Option<String>,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub pricing: PricingInput,
}

#[derive(Deserialize)]
pub struct UpdateHotelRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub check_in: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub check_out: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub confirmation_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub notes: Option<Option<String>>,
    #[serde(flatten)]
    pub pricing: PricingPatch,
}

#[derive(AsChangeset)]
#[diesel(table_name = hotels)]
struct HotelChangeset {
    name: Option<String>,
    address: Option<Option<String>>,
    check_in: Option<NaiveDateTime>,
    check_out: Option<NaiveDateTime>,
    confirmation_number: Option<Option<String>>,
    price_cents: Option<Option<i64>>,
    currency: Option<Option<String>>,
    payment_status: Option<Option<String>>,
    document_id: Option<Option<Uuid>>,
    notes: Option<Option<String>>,
}

pub async fn list_hotels(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<Vec<Hotel>>> {
    let mut conn = state.db()?;
    let rows = hotels::table
        .filter(hotels::trip_id.eq(access.trip_id()))
        .order((hotels::check_in.asc(), hotels::name.asc()))
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn create_hotel(
    State(state): State<AppState>,
    access: TripAccess,
    Json(payload): Json<CreateHotelRequest>,
) -> AppResult<(StatusCode, Json<Hotel>)> {
    access.require_edit()?;
    let name = require_text(&payload.name, "name")?;
    ensure_not_before(
        payload.check_in,
        Some(payload.check_out),
        "check_out must not be before check_in",
    )?;

    let mut conn = state.db()?;
    let pricing = Pricing::from_input(&mut conn, access.trip_id(), payload.pricing)?;
    let now = Utc::now().naive_utc();
    let hotel = Hotel {
        id: Uuid::new_v4(),
        trip_id: access.trip_id(),
        name,
        address: optional_text(payload.address),
        check_in: payload.check_in,
        check_out: payload.check_out,
        confirmation_number: optional_text(payload.confirmation_number),
        price_cents: pricing.price_cents,
        currency: pricing.currency,
        payment_status: pricing.payment_status,
        document_id: pricing.document_id,
        notes: optional_text(payload.notes),
        created_at: now,
        updated_at: now,
    };

    let created: Hotel = diesel::insert_into(hotels::table)
        .values(&hotel)
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Create,
        "hotel",
        Some(created.id),
        json!({ "name": created.name }),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_hotel(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, hotel_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateHotelRequest>,
) -> AppResult<Json<Hotel>> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_hotel(&mut conn, access.trip_id(), hotel_id)?;

    let check_in = patch_required(payload.check_in, "check_in")?;
    let check_out = patch_required(payload.check_out, "check_out")?;
    ensure_not_before(
        check_in.unwrap_or(existing.check_in),
        Some(check_out.unwrap_or(existing.check_out)),
        "check_out must not be before check_in",
    )?;

    let current = Pricing {
        price_cents: existing.price_cents,
        currency: existing.currency.clone(),
        payment_status: existing.payment_status.clone(),
        document_id: existing.document_id,
    };
    let pricing = current.merge(&mut conn, access.trip_id(), payload.pricing)?;

    let changeset = HotelChangeset {
        name: patch_required_text(payload.name, "name")?,
        address: patch_text(payload.address),
        check_in,
        check_out,
        confirmation_number: patch_text(payload.confirmation_number),
        price_cents: Some(pricing.price_cents),
        currency: Some(pricing.currency),
        payment_status: Some(pricing.payment_status),
        document_id: Some(pricing.document_id),
        notes: patch_text(payload.notes),
    };

    let updated: Hotel = diesel::update(hotels::table.find(existing.id))
        .set((&changeset, hotels::updated_at.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "hotel",
        Some(updated.id),
        json!({ "name": updated.name }),
    );

    Ok(Json(updated))
}

pub async fn delete_hotel(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, hotel_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_hotel(&mut conn, access.trip_id(), hotel_id)?;

    conn.transaction::<_, AppError, _>(|conn| {
        delete_activity_payments(conn, ActivityType::Hotel, existing.id)?;
        diesel::delete(hotels::table.find(existing.id)).execute(conn)?;
        Ok(())
    })?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "hotel",
        Some(existing.id),
        json!({ "name": existing.name }),
    );

    Ok(StatusCode::NO_CONTENT)
}

fn find_hotel(conn: &mut PgConnection, trip_id: Uuid, hotel_id: Uuid) -> AppResult<Hotel> {
    hotels::table
        .filter(hotels::id.eq(hotel_id))
        .filter(hotels::trip_id.eq(trip_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}
