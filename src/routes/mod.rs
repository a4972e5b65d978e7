use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod bookings;
pub mod dishes;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod payments;
pub mod reviews;
pub mod tables;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/categories", dishes::category_router())
        .nest("/dishes", dishes::router())
        .nest("/tables", tables::router())
        .nest("/bookings", bookings::router())
        .nest("/orders", orders::router())
        .nest("/payments", payments::router())
        .nest("/reviews", reviews::router())
}
