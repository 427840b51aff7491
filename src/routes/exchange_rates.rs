use axum::{extract::State, Json};

use crate::currency::{resolve_rates, ExchangeRates};
use crate::state::AppState;

pub async fn get_exchange_rates(State(state): State<AppState>) -> Json<ExchangeRates> {
    Json(resolve_rates(&state.http, state.config.exchange_rates_url.as_deref()).await)
}
