use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod budget;
pub mod car_rentals;
pub mod checklist;
pub mod collaborators;
pub mod day_trips;
pub mod demo;
pub mod documents;
pub mod exchange_rates;
pub mod health;
pub mod hotels;
pub mod payments;
pub mod restaurants;
pub mod route_plans;
pub mod shared;
pub mod timeline;
pub mod tourist_sites;
pub mod transportation;
pub mod travelers;
pub mod trips;
pub mod validation;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

fn cors_layer(state: &AppState) -> CorsLayer {
    let allow_origin = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        warn!(origin = %value, "ignoring invalid CORS allowed origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Everything below `/api/trips/:trip_id`. Handlers authorize through
/// `TripAccess`, which reads the `trip_id` capture.
fn trip_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(trips::get_trip)
                .patch(trips::update_trip)
                .delete(trips::delete_trip),
        )
        .route(
            "/share",
            post(trips::share_trip).delete(trips::unshare_trip),
        )
        .route("/visit", post(collaborators::record_visit))
        .route(
            "/collaborators",
            get(collaborators::list_collaborators).post(collaborators::add_collaborator),
        )
        .route(
            "/collaborators/:user_id",
            patch(collaborators::update_collaborator).delete(collaborators::remove_collaborator),
        )
        .route(
            "/hotels",
            get(hotels::list_hotels).post(hotels::create_hotel),
        )
        .route(
            "/hotels/:hotel_id",
            patch(hotels::update_hotel).delete(hotels::delete_hotel),
        )
        .route(
            "/transportation",
            get(transportation::list_transportation).post(transportation::create_transportation),
        )
        .route(
            "/transportation/:transportation_id",
            patch(transportation::update_transportation)
                .delete(transportation::delete_transportation),
        )
        .route(
            "/car-rentals",
            get(car_rentals::list_car_rentals).post(car_rentals::create_car_rental),
        )
        .route(
            "/car-rentals/:car_rental_id",
            patch(car_rentals::update_car_rental).delete(car_rentals::delete_car_rental),
        )
        .route(
            "/restaurants",
            get(restaurants::list_restaurants).post(restaurants::create_restaurant),
        )
        .route(
            "/restaurants/:restaurant_id",
            patch(restaurants::update_restaurant).delete(restaurants::delete_restaurant),
        )
        .route(
            "/tourist-sites",
            get(tourist_sites::list_tourist_sites).post(tourist_sites::create_tourist_site),
        )
        .route(
            "/tourist-sites/:site_id",
            patch(tourist_sites::update_tourist_site).delete(tourist_sites::delete_tourist_site),
        )
        .route(
            "/checklist",
            get(checklist::list_checklist).post(checklist::create_checklist_item),
        )
        .route(
            "/checklist/:item_id",
            patch(checklist::update_checklist_item).delete(checklist::delete_checklist_item),
        )
        .route(
            "/checklist/:item_id/toggle",
            post(checklist::toggle_checklist_item),
        )
        .route(
            "/travelers",
            get(travelers::list_travelers).post(travelers::create_traveler),
        )
        .route(
            "/travelers/:traveler_id",
            patch(travelers::update_traveler).delete(travelers::delete_traveler),
        )
        .route(
            "/day-trips",
            get(day_trips::list_day_trips).post(day_trips::create_day_trip),
        )
        .route(
            "/day-trips/:day_trip_id",
            patch(day_trips::update_day_trip).delete(day_trips::delete_day_trip),
        )
        .route(
            "/routes",
            get(route_plans::list_routes).post(route_plans::create_route),
        )
        .route(
            "/routes/:route_id",
            patch(route_plans::update_route).delete(route_plans::delete_route),
        )
        .route(
            "/routes/:route_id/pois",
            get(route_plans::list_pois).post(route_plans::create_poi),
        )
        .route(
            "/routes/:route_id/pois/:poi_id",
            patch(route_plans::update_poi).delete(route_plans::delete_poi),
        )
        .route(
            "/payments",
            get(payments::list_payments).post(payments::create_payment),
        )
        .route(
            "/payments/:payment_id",
            patch(payments::update_payment).delete(payments::delete_payment),
        )
        .route(
            "/documents",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route(
            "/documents/:document_id",
            get(documents::get_document)
                .patch(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/budget", get(budget::get_budget))
        .route("/timeline", get(timeline::get_timeline))
        .route("/days", get(timeline::get_days))
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(&state);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/oauth/authorize", get(auth::oauth_authorize))
        .route("/oauth/callback", get(auth::oauth_callback));

    let public_routes = Router::new()
        .route("/download/:token", get(documents::download_with_token))
        .route("/api/health", get(health::health_check))
        .route("/api/shared/:token", get(shared::get_shared_trip))
        .route("/api/exchange-rates", get(exchange_rates::get_exchange_rates))
        .route("/api/demo", post(demo::provision_demo));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .route(
            "/api/trips",
            get(trips::list_trips).post(trips::create_trip),
        )
        .nest("/api/trips/:trip_id", trip_routes())
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
}
