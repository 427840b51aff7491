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
    choice, delete_activity_payments, ensure_not_before, optional_text, patch_required,
    patch_required_text, patch_text, require_text, Pricing, PricingInput, PricingPatch,
};
use crate::audit::{self, Action};
use crate::auth::TripAccess;
use crate::error::{AppError, AppResult};
use crate::kinds::{ActivityType, TRANSPORT_KINDS};
use crate::models::Transportation;
use crate::schema::transportation;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateTransportationRequest {
    pub kind: String,
    pub origin: String,
    pub destination: String,
    pub departure_at: NaiveDateTime,
    pub arrival_at: Option<NaiveDateTime>,
    pub carrier: Option<String>,
    pub service_number: Option<String>,
    pub confirmation_number: Option<String>,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub pricing: PricingInput,
}

#[derive(Deserialize)]
pub struct UpdateTransportationRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub kind: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub origin: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub destination: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub departure_at: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub arrival_at: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub carrier: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub service_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub confirmation_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub notes: Option<Option<String>>,
    #[serde(flatten)]
    pub pricing: PricingPatch,
}

#[derive(AsChangeset)]
#[diesel(table_name = transportation)]
struct TransportationChangeset {
    kind: Option<String>,
    origin: Option<String>,
    destination: Option<String>,
    departure_at: Option<NaiveDateTime>,
    arrival_at: Option<Option<NaiveDateTime>>,
    carrier: Option<Option<String>>,
    service_number: Option<Option<String>>,
    confirmation_number: Option<Option<String>>,
    price_cents: Option<Option<i64>>,
    currency: Option<Option<String>>,
    payment_status: Option<Option<String>>,
    document_id: Option<Option<Uuid>>,
    notes: Option<Option<String>>,
}

pub async fn list_transportation(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<Vec<Transportation>>> {
    let mut conn = state.db()?;
    let rows = transportation::table
        .filter(transportation::trip_id.eq(access.trip_id()))
        .order(transportation::departure_at.asc())
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn create_transportation(
    State(state): State<AppState>,
    access: TripAccess,
    Json(payload): Json<CreateTransportationRequest>,
) -> AppResult<(StatusCode, Json<Transportation>)> {
    access.require_edit()?;
    let kind = choice(&payload.kind, TRANSPORT_KINDS, "kind")?;
    let origin = require_text(&payload.origin, "origin")?;
    let destination = require_text(&payload.destination, "destination")?;
    ensure_not_before(
        payload.departure_at,
        payload.arrival_at,
        "arrival_at must not be before departure_at",
    )?;

    let mut conn = state.db()?;
    let pricing = Pricing::from_input(&mut conn, access.trip_id(), payload.pricing)?;
    let now = Utc::now().naive_utc();
    let row = Transportation {
        id: Uuid::new_v4(),
        trip_id: access.trip_id(),
        kind,
        origin,
        destination,
        departure_at: payload.departure_at,
        arrival_at: payload.arrival_at,
        carrier: optional_text(payload.carrier),
        service_number: optional_text(payload.service_number),
        confirmation_number: optional_text(payload.confirmation_number),
        price_cents: pricing.price_cents,
        currency: pricing.currency,
        payment_status: pricing.payment_status,
        document_id: pricing.document_id,
        notes: optional_text(payload.notes),
        created_at: now,
        updated_at: now,
    };

    let created: Transportation = diesel::insert_into(transportation::table)
        .values(&row)
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Create,
        "transportation",
        Some(created.id),
        json!({ "kind": created.kind, "origin": created.origin, "destination": created.destination }),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_transportation(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, transportation_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateTransportationRequest>,
) -> AppResult<Json<Transportation>> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_transportation(&mut conn, access.trip_id(), transportation_id)?;

    let kind = patch_required_text(payload.kind, "kind")?
        .map(|value| choice(&value, TRANSPORT_KINDS, "kind"))
        .transpose()?;
    let departure_at = patch_required(payload.departure_at, "departure_at")?;
    let arrival_at = payload.arrival_at;
    ensure_not_before(
        departure_at.unwrap_or(existing.departure_at),
        arrival_at.unwrap_or(existing.arrival_at),
        "arrival_at must not be before departure_at",
    )?;

    let current = Pricing {
        price_cents: existing.price_cents,
        currency: existing.currency.clone(),
        payment_status: existing.payment_status.clone(),
        document_id: existing.document_id,
    };
    let pricing = current.merge(&mut conn, access.trip_id(), payload.pricing)?;

    let changeset = TransportationChangeset {
        kind,
        origin: patch_required_text(payload.origin, "origin")?,
        destination: patch_required_text(payload.destination, "destination")?,
        departure_at,
        arrival_at,
        carrier: patch_text(payload.carrier),
        service_number: patch_text(payload.service_number),
        confirmation_number: patch_text(payload.confirmation_number),
        price_cents: Some(pricing.price_cents),
        currency: Some(pricing.currency),
        payment_status: Some(pricing.payment_status),
        document_id: Some(pricing.document_id),
        notes: patch_text(payload.notes),
    };

    let updated: Transportation = diesel::update(transportation::table.find(existing.id))
        .set((&changeset, transportation::updated_at.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "transportation",
        Some(updated.id),
        json!({ "kind": updated.kind }),
    );

    Ok(Json(updated))
}

pub async fn delete_transportation(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, transportation_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_transportation(&mut conn, access.trip_id(), transportation_id)?;

    conn.transaction::<_, AppError, _>(|conn| {
        delete_activity_payments(conn, ActivityType::Transportation, existing.id)?;
        diesel::delete(transportation::table.find(existing.id)).execute(conn)?;
        Ok(())
    })?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "transportation",
        Some(existing.id),
        json!({ "kind": existing.kind }),
    );

    Ok(StatusCode::NO_CONTENT)
}

fn find_transportation(
    conn: &mut PgConnection,
    trip_id: Uuid,
    transportation_id: Uuid,
) -> AppResult<Transportation> {
    transportation::table
        .filter(transportation::id.eq(transportation_id))
        .filter(transportation::trip_id.eq(trip_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}
