//! Input checks shared by the itinerary handlers.

use chrono::NaiveDateTime;
use diesel::{dsl::exists, prelude::*, select, PgConnection};
use serde::Deserialize;
use uuid::Uuid;

use crate::currency::{normalize_currency, MAX_MINOR_UNITS};
use crate::error::{AppError, AppResult};
use crate::kinds::{normalize_choice, ActivityType, PaymentStatus};
use crate::schema::{documents, payments};

pub fn require_text(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::bad_request(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Trims the value; blank strings count as absent.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// PATCH form of [`optional_text`]: a blank string clears the column.
pub fn patch_text(value: Option<Option<String>>) -> Option<Option<String>> {
    value.map(optional_text)
}

/// PATCH form of [`require_text`]: the field may be omitted but not cleared.
pub fn patch_required_text(
    value: Option<Option<String>>,
    field: &str,
) -> AppResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(None) => Err(AppError::bad_request(format!("{field} cannot be null"))),
        Some(Some(text)) => require_text(&text, field).map(Some),
    }
}

pub fn patch_required<T>(value: Option<Option<T>>, field: &str) -> AppResult<Option<T>> {
    match value {
        None => Ok(None),
        Some(None) => Err(AppError::bad_request(format!("{field} cannot be null"))),
        Some(Some(inner)) => Ok(Some(inner)),
    }
}

pub fn choice(value: &str, allowed: &[&str], field: &str) -> AppResult<String> {
    normalize_choice(value, allowed).ok_or_else(|| {
        AppError::bad_request(format!(
            "{field} must be one of: {}",
            allowed.join(", ")
        ))
    })
}

pub fn currency_code(value: &str) -> AppResult<String> {
    normalize_currency(value)
        .ok_or_else(|| AppError::bad_request("currency must be a three-letter ISO code"))
}

pub fn ensure_not_before(
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
    message: &str,
) -> AppResult<()> {
    match end {
        Some(end) if end < start => Err(AppError::bad_request(message)),
        _ => Ok(()),
    }
}

pub fn ensure_document_in_trip(
    conn: &mut PgConnection,
    trip_id: Uuid,
    document_id: Option<Uuid>,
) -> AppResult<()> {
    let Some(document_id) = document_id else {
        return Ok(());
    };
    let found: bool = select(exists(
        documents::table
            .filter(documents::id.eq(document_id))
            .filter(documents::trip_id.eq(trip_id)),
    ))
    .get_result(conn)?;
    if found {
        Ok(())
    } else {
        Err(AppError::bad_request("document_id must reference a document of this trip"))
    }
}

/// Price, currency, payment status and linked document of a priced activity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pricing {
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<String>,
    pub document_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PricingInput {
    pub price_cents: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<String>,
    pub document_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PricingPatch {
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub price_cents: Option<Option<i64>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub currency: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub payment_status: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::utils::json::nullable")]
    pub document_id: Option<Option<Uuid>>,
}

impl Pricing {
    pub fn from_input(
        conn: &mut PgConnection,
        trip_id: Uuid,
        input: PricingInput,
    ) -> AppResult<Self> {
        let pricing = Self {
            price_cents: input.price_cents,
            currency: optional_text(input.currency),
            payment_status: optional_text(input.payment_status),
            document_id: input.document_id,
        }
        .validated()?;
        ensure_document_in_trip(conn, trip_id, pricing.document_id)?;
        Ok(pricing)
    }

    /// Applies a patch on top of the stored values and validates the result
    /// as a whole, so a price can never be left without a currency.
    pub fn merge(
        self,
        conn: &mut PgConnection,
        trip_id: Uuid,
        patch: PricingPatch,
    ) -> AppResult<Self> {
        let document_changed = patch.document_id.is_some();
        let merged = Self {
            price_cents: patch.price_cents.unwrap_or(self.price_cents),
            currency: patch_text(patch.currency).unwrap_or(self.currency),
            payment_status: patch_text(patch.payment_status).unwrap_or(self.payment_status),
            document_id: patch.document_id.unwrap_or(self.document_id),
        }
        .validated()?;
        if document_changed {
            ensure_document_in_trip(conn, trip_id, merged.document_id)?;
        }
        Ok(merged)
    }

    fn validated(self) -> AppResult<Self> {
        match self.price_cents {
            Some(price) if price < 0 => {
                return Err(AppError::bad_request("price_cents must not be negative"));
            }
            Some(price) if price > MAX_MINOR_UNITS => {
                return Err(AppError::bad_request(format!(
                    "price_cents must not exceed {MAX_MINOR_UNITS}"
                )));
            }
            _ => {}
        }
        let currency = self.currency.as_deref().map(currency_code).transpose()?;
        if self.price_cents.is_some() && currency.is_none() {
            return Err(AppError::bad_request("currency is required when a price is set"));
        }
        let payment_status = self
            .payment_status
            .as_deref()
            .map(|value| {
                PaymentStatus::parse(value)
                    .map(|status| status.as_str().to_string())
                    .ok_or_else(|| {
                        AppError::bad_request("payment_status must be one of: unpaid, partial, paid")
                    })
            })
            .transpose()?;

        Ok(Self {
            currency,
            payment_status,
            ..self
        })
    }
}

/// Removes the payments recorded against an activity that is being deleted.
pub fn delete_activity_payments(
    conn: &mut PgConnection,
    activity_type: ActivityType,
    activity_id: Uuid,
) -> QueryResult<usize> {
    diesel::delete(
        payments::table
            .filter(payments::activity_type.eq(activity_type.as_str()))
            .filter(payments::activity_id.eq(activity_id)),
    )
    .execute(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing(price: Option<i64>, currency: Option<&str>, status: Option<&str>) -> Pricing {
        Pricing {
            price_cents: price,
            currency: currency.map(str::to_string),
            payment_status: status.map(str::to_string),
            document_id: None,
        }
    }

    #[test]
    fn text_helpers_trim_and_reject_blanks() {
        assert_eq!(require_text("  Rome ", "name").unwrap(), "Rome");
        assert!(require_text("   ", "name").is_err());
        assert_eq!(optional_text(Some("  ".to_string())), None);
        assert_eq!(patch_text(Some(Some(" ".to_string()))), Some(None));
        assert_eq!(patch_text(None), None);
        assert!(patch_required_text(Some(None), "name").is_err());
        assert_eq!(patch_required_text(None, "name").unwrap(), None);
    }

    #[test]
    fn pricing_normalizes_currency_and_status() {
        let valid = pricing(Some(12_000), Some("eur"), Some("Pending"))
            .validated()
            .unwrap();
        assert_eq!(valid.currency.as_deref(), Some("EUR"));
        assert_eq!(valid.payment_status.as_deref(), Some("unpaid"));
    }

    #[test]
    fn pricing_requires_currency_with_price() {
        let err = pricing(Some(100), None, None).validated().unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(pricing(None, Some("USD"), None).validated().is_ok());
        assert!(pricing(Some(-1), Some("USD"), None).validated().is_err());
        assert!(pricing(Some(MAX_MINOR_UNITS), Some("USD"), None).validated().is_ok());
        assert!(pricing(Some(i64::MAX / 2 + 1), Some("USD"), None).validated().is_err());
        assert!(pricing(Some(1), Some("EURO"), None).validated().is_err());
        assert!(pricing(None, None, Some("refunded")).validated().is_err());
    }

    #[test]
    fn choice_lists_allowed_values() {
        let err = choice("boat", &["train", "bus"], "kind").unwrap_err();
        assert_eq!(err.message(), "kind must be one of: train, bus");
    }

    #[test]
    fn end_must_not_precede_start() {
        let start = chrono::NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let earlier = start - chrono::Duration::hours(1);
        assert!(ensure_not_before(start, Some(earlier), "bad").is_err());
        assert!(ensure_not_before(start, Some(start), "bad").is_ok());
        assert!(ensure_not_before(start, None, "bad").is_ok());
    }
}
