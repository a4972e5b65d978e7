use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post},
};

use crate::{
    dto::bookings::{AssignDetailsRequest, BookingList, BookingWithDetails, CreateBookingRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Booking,
    response::ApiResponse,
    routes::params::BookingListQuery,
    services::booking_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bookings).post(create_booking))
        .route("/{id}", get(get_booking))
        .route("/{id}/assign-details", post(assign_details))
        .route("/{id}/cancel", patch(cancel_booking))
        .route("/{id}/complete", patch(complete_booking))
}

#[utoipa::path(
    post,
    path = "/api/bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 200, description = "Create a pending booking", body = ApiResponse<Booking>)
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<Json<ApiResponse<Booking>>> {
    let resp = booking_service::create_booking(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/bookings", security(("bearer_auth" = [])), tag = "Bookings")]
pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<BookingListQuery>,
) -> AppResult<Json<ApiResponse<BookingList>>> {
    let resp = booking_service::list_bookings(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/bookings/{id}", security(("bearer_auth" = [])), tag = "Bookings")]
pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<BookingWithDetails>>> {
    let resp = booking_service::get_booking(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/bookings/{id}/assign-details",
    request_body = AssignDetailsRequest,
    responses(
        (status = 200, description = "Assign tables and confirm", body = ApiResponse<BookingWithDetails>),
        (status = 400, description = "Not pending, or a requested slot conflicts"),
        (status = 403, description = "Not a manager"),
        (status = 404, description = "Booking or table not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Bookings"
)]
pub async fn assign_details(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<AssignDetailsRequest>,
) -> AppResult<Json<ApiResponse<BookingWithDetails>>> {
    let resp = booking_service::assign_details(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(patch, path = "/api/bookings/{id}/cancel", security(("bearer_auth" = [])), tag = "Bookings")]
pub async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Booking>>> {
    let resp = booking_service::cancel_booking(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(patch, path = "/api/bookings/{id}/complete", security(("bearer_auth" = [])), tag = "Bookings")]
pub async fn complete_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Booking>>> {
    let resp = booking_service::complete_booking(&state, &user, id).await?;
    Ok(Json(resp))
}
