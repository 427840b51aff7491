use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use super::validation::currency_code;
use crate::auth::TripAccess;
use crate::budget::{build_report, default_currency, BudgetReport};
use crate::currency::resolve_rates;
use crate::error::AppResult;
use crate::itinerary::Itinerary;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct BudgetQuery {
    pub currency: Option<String>,
}

pub async fn get_budget(
    State(state): State<AppState>,
    access: TripAccess,
    Query(query): Query<BudgetQuery>,
) -> AppResult<Json<BudgetReport>> {
    let requested = query
        .currency
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(currency_code)
        .transpose()?;

    let itinerary = {
        let mut conn = state.db()?;
        Itinerary::load(&mut conn, access.trip_id())?
    };
    let items = itinerary.budget_items();
    let payments = itinerary.payment_entries();
    let target = requested.unwrap_or_else(|| default_currency(&items));

    let rates = resolve_rates(&state.http, state.config.exchange_rates_url.as_deref()).await;
    Ok(Json(build_report(items, &payments, &rates, &target)))
}
