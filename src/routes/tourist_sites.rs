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
use crate::models::TouristSite;
use crate::schema::tourist_sites;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateTouristSiteRequest {
    pub name: String,
    pub location: Option<String>,
    pub visit_at: Option<NaiveDateTime>,
    pub opening_hours: Option<String>,
    pub confirmation_number: Option<String>,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub pricing: PricingInput,
}

#[derive(Deserialize)]
pub struct UpdateTouristSiteRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub visit_at: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub opening_hours: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub confirmation_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub notes: Option<Option<String>>,
    #[serde(flatten)]
    pub pricing: PricingPatch,
}

#[derive(AsChangeset)]
#[diesel(table_name = tourist_sites)]
struct TouristSiteChangeset {
    name: Option<String>,
    location: Option<Option<String>>,
    visit_at: Option<Option<NaiveDateTime>>,
    opening_hours: Option<Option<String>>,
    confirmation_number: Option<Option<String>>,
    price_cents: Option<Option<i64>>,
    currency: Option<Option<String>>,
    payment_status: Option<Option<String>>,
    document_id: Option<Option<Uuid>>,
    notes: Option<Option<String>>,
}

pub async fn list_tourist_sites(
    State(state): State<AppState>,
    access: TripAccess,
) -> AppResult<Json<Vec<TouristSite>>> {
    let mut conn = state.db()?;
    let rows = tourist_sites::table
        .filter(tourist_sites::trip_id.eq(access.trip_id()))
        .order((tourist_sites::visit_at.asc(), tourist_sites::name.asc()))
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn create_tourist_site(
    State(state): State<AppState>,
    access: TripAccess,
    Json(payload): Json<CreateTouristSiteRequest>,
) -> AppResult<(StatusCode, Json<TouristSite>)> {
    access.require_edit()?;
    let name = require_text(&payload.name, "name")?;

    let mut conn = state.db()?;
    let pricing = Pricing::from_input(&mut conn, access.trip_id(), payload.pricing)?;
    let now = Utc::now().naive_utc();
    let site = TouristSite {
        id: Uuid::new_v4(),
        trip_id: access.trip_id(),
        name,
        location: optional_text(payload.location),
        visit_at: payload.visit_at,
        opening_hours: optional_text(payload.opening_hours),
        confirmation_number: optional_text(payload.confirmation_number),
        price_cents: pricing.price_cents,
        currency: pricing.currency,
        payment_status: pricing.payment_status,
        document_id: pricing.document_id,
        notes: optional_text(payload.notes),
        created_at: now,
        updated_at: now,
    };

    let created: TouristSite = diesel::insert_into(tourist_sites::table)
        .values(&site)
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Create,
        "tourist_site",
        Some(created.id),
        json!({ "name": created.name }),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_tourist_site(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, site_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateTouristSiteRequest>,
) -> AppResult<Json<TouristSite>> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_tourist_site(&mut conn, access.trip_id(), site_id)?;

    let current = Pricing {
        price_cents: existing.price_cents,
        currency: existing.currency.clone(),
        payment_status: existing.payment_status.clone(),
        document_id: existing.document_id,
    };
    let pricing = current.merge(&mut conn, access.trip_id(), payload.pricing)?;

    let changeset = TouristSiteChangeset {
        name: patch_required_text(payload.name, "name")?,
        location: patch_text(payload.location),
        visit_at: payload.visit_at,
        opening_hours: patch_text(payload.opening_hours),
        confirmation_number: patch_text(payload.confirmation_number),
        price_cents: Some(pricing.price_cents),
        currency: Some(pricing.currency),
        payment_status: Some(pricing.payment_status),
        document_id: Some(pricing.document_id),
        notes: patch_text(payload.notes),
    };

    let updated: TouristSite = diesel::update(tourist_sites::table.find(existing.id))
        .set((&changeset, tourist_sites::updated_at.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "tourist_site",
        Some(updated.id),
        json!({ "name": updated.name }),
    );

    Ok(Json(updated))
}

pub async fn delete_tourist_site(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, site_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_tourist_site(&mut conn, access.trip_id(), site_id)?;

    conn.transaction::<_, AppError, _>(|conn| {
        delete_activity_payments(conn, ActivityType::TouristSite, existing.id)?;
        diesel::delete(tourist_sites::table.find(existing.id)).execute(conn)?;
        Ok(())
    })?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "tourist_site",
        Some(existing.id),
        json!({ "name": existing.name }),
    );

    Ok(StatusCode::NO_CONTENT)
}

fn find_tourist_site(
    conn: &mut PgConnection,
    trip_id: Uuid,
    site_id: Uuid,
) -> AppResult<TouristSite> {
    tourist_sites::table
        .filter(tourist_sites::id.eq(site_id))
        .filter(tourist_sites::trip_id.eq(trip_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}
