use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use diesel::{dsl::exists, prelude::*, select};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::validation::{
    currency_code, optional_text, patch_required, patch_required_text, patch_text,
};
use crate::audit::{self, Action};
use crate::auth::TripAccess;
use crate::currency::MAX_MINOR_UNITS;
use crate::error::{AppError, AppResult};
use crate::kinds::ActivityType;
use crate::models::Payment;
use crate::schema::{car_rentals, hotels, payments, restaurants, tourist_sites, transportation};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PaymentFilter {
    pub activity_type: Option<String>,
    pub activity_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    pub activity_type: String,
    pub activity_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub paid_on: NaiveDate,
    pub method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdatePaymentRequest {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub amount_cents: Option<Option<i64>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub currency: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub paid_on: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub method: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub notes: Option<Option<String>>,
}

#[derive(AsChangeset)]
#[diesel(table_name = payments)]
struct PaymentChangeset {
    amount_cents: Option<i64>,
    currency: Option<String>,
    paid_on: Option<NaiveDate>,
    method: Option<Option<String>>,
    notes: Option<Option<String>>,
}

fn parse_activity_type(value: &str) -> AppResult<ActivityType> {
    ActivityType::parse(value).ok_or_else(|| {
        AppError::bad_request(
            "activity_type must be one of: hotel, transportation, car_rental, restaurant, tourist_site",
        )
    })
}

fn positive_amount(amount_cents: i64) -> AppResult<i64> {
    if amount_cents <= 0 {
        return Err(AppError::bad_request("amount_cents must be greater than zero"));
    }
    if amount_cents > MAX_MINOR_UNITS {
        return Err(AppError::bad_request(format!(
            "amount_cents must not exceed {MAX_MINOR_UNITS}"
        )));
    }
    Ok(amount_cents)
}

/// Whether the priced activity exists inside the given trip.
pub fn activity_exists(
    conn: &mut PgConnection,
    trip_id: Uuid,
    activity_type: ActivityType,
    activity_id: Uuid,
) -> QueryResult<bool> {
    match activity_type {
        ActivityType::Hotel => select(exists(
            hotels::table
                .filter(hotels::id.eq(activity_id))
                .filter(hotels::trip_id.eq(trip_id)),
        ))
        .get_result(conn),
        ActivityType::Transportation => select(exists(
            transportation::table
                .filter(transportation::id.eq(activity_id))
                .filter(transportation::trip_id.eq(trip_id)),
        ))
        .get_result(conn),
        ActivityType::CarRental => select(exists(
            car_rentals::table
                .filter(car_rentals::id.eq(activity_id))
                .filter(car_rentals::trip_id.eq(trip_id)),
        ))
        .get_result(conn),
        ActivityType::Restaurant => select(exists(
            restaurants::table
                .filter(restaurants::id.eq(activity_id))
                .filter(restaurants::trip_id.eq(trip_id)),
        ))
        .get_result(conn),
        ActivityType::TouristSite => select(exists(
            tourist_sites::table
                .filter(tourist_sites::id.eq(activity_id))
                .filter(tourist_sites::trip_id.eq(trip_id)),
        ))
        .get_result(conn),
    }
}

pub async fn list_payments(
    State(state): State<AppState>,
    access: TripAccess,
    Query(filter): Query<PaymentFilter>,
) -> AppResult<Json<Vec<Payment>>> {
    let mut query = payments::table
        .filter(payments::trip_id.eq(access.trip_id()))
        .into_boxed();

    match (filter.activity_type.as_deref(), filter.activity_id) {
        (Some(activity_type), Some(activity_id)) => {
            let activity_type = parse_activity_type(activity_type)?;
            query = query
                .filter(payments::activity_type.eq(activity_type.as_str()))
                .filter(payments::activity_id.eq(activity_id));
        }
        (None, None) => {}
        _ => {
            return Err(AppError::bad_request(
                "activity_type and activity_id must be given together",
            ))
        }
    }

    let mut conn = state.db()?;
    let rows = query
        .order((payments::paid_on.asc(), payments::created_at.asc()))
        .load(&mut conn)?;
    Ok(Json(rows))
}

pub async fn create_payment(
    State(state): State<AppState>,
    access: TripAccess,
    Json(payload): Json<CreatePaymentRequest>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    access.require_edit()?;
    let activity_type = parse_activity_type(&payload.activity_type)?;
    let amount_cents = positive_amount(payload.amount_cents)?;
    let currency = currency_code(&payload.currency)?;

    let mut conn = state.db()?;
    if !activity_exists(&mut conn, access.trip_id(), activity_type, payload.activity_id)? {
        return Err(AppError::bad_request("activity_id must reference an activity of this trip"));
    }

    let now = Utc::now().naive_utc();
    let payment = Payment {
        id: Uuid::new_v4(),
        trip_id: access.trip_id(),
        activity_type: activity_type.as_str().to_string(),
        activity_id: payload.activity_id,
        amount_cents,
        currency,
        paid_on: payload.paid_on,
        method: optional_text(payload.method),
        notes: optional_text(payload.notes),
        created_by: Some(access.user_id()),
        created_at: now,
        updated_at: now,
    };

    let created: Payment = diesel::insert_into(payments::table)
        .values(&payment)
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Create,
        "payment",
        Some(created.id),
        json!({
            "activity_type": created.activity_type,
            "activity_id": created.activity_id,
            "amount_cents": created.amount_cents,
            "currency": created.currency,
        }),
    );

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_payment(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, payment_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdatePaymentRequest>,
) -> AppResult<Json<Payment>> {
    access.require_edit()?;
    let changeset = PaymentChangeset {
        amount_cents: patch_required(payload.amount_cents, "amount_cents")?
            .map(positive_amount)
            .transpose()?,
        currency: patch_required_text(payload.currency, "currency")?
            .map(|value| currency_code(&value))
            .transpose()?,
        paid_on: patch_required(payload.paid_on, "paid_on")?,
        method: patch_text(payload.method),
        notes: patch_text(payload.notes),
    };

    let mut conn = state.db()?;
    let existing = find_payment(&mut conn, access.trip_id(), payment_id)?;
    let updated: Payment = diesel::update(payments::table.find(existing.id))
        .set((&changeset, payments::updated_at.eq(Utc::now().naive_utc())))
        .get_result(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Update,
        "payment",
        Some(updated.id),
        json!({ "amount_cents": updated.amount_cents, "currency": updated.currency }),
    );

    Ok(Json(updated))
}

pub async fn delete_payment(
    State(state): State<AppState>,
    access: TripAccess,
    Path((_, payment_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    access.require_edit()?;
    let mut conn = state.db()?;
    let existing = find_payment(&mut conn, access.trip_id(), payment_id)?;

    diesel::delete(payments::table.find(existing.id)).execute(&mut conn)?;

    audit::record(
        &mut conn,
        Some(access.trip_id()),
        Some(access.user_id()),
        Action::Delete,
        "payment",
        Some(existing.id),
        json!({ "amount_cents": existing.amount_cents, "currency": existing.currency }),
    );

    Ok(StatusCode::NO_CONTENT)
}

fn find_payment(conn: &mut PgConnection, trip_id: Uuid, payment_id: Uuid) -> AppResult<Payment> {
    payments::table
        .filter(payments::id.eq(payment_id))
        .filter(payments::trip_id.eq(trip_id))
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_must_be_positive() {
        assert_eq!(positive_amount(1).unwrap(), 1);
        assert!(positive_amount(0).is_err());
        assert!(positive_amount(-500).is_err());
        assert_eq!(positive_amount(MAX_MINOR_UNITS).unwrap(), MAX_MINOR_UNITS);
        assert!(positive_amount(MAX_MINOR_UNITS + 1).is_err());
        assert!(positive_amount(i64::MAX).is_err());
    }

    #[test]
    fn activity_types_use_snake_case_names() {
        assert_eq!(parse_activity_type("car_rental").unwrap(), ActivityType::CarRental);
        assert!(parse_activity_type("day_trip").is_err());
    }
}
