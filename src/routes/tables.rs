use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};

use crate::{
    dto::tables::{TableList, UpdateTableStatusRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::DiningTable,
    response::ApiResponse,
    routes::params::AvailabilityQuery,
    services::table_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tables))
        .route("/available", get(available_tables))
        .route("/{id}/status", patch(update_table_status))
}

#[utoipa::path(get, path = "/api/tables", tag = "Tables")]
pub async fn list_tables(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<TableList>>> {
    let resp = table_service::list_tables(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/tables/available",
    params(
        ("start_time" = String, Query, description = "Window start, RFC 3339"),
        ("end_time" = String, Query, description = "Window end, RFC 3339 (exclusive)"),
        ("guests" = i32, Query, description = "Party size")
    ),
    responses(
        (status = 200, description = "Tables free for the window", body = ApiResponse<TableList>),
        (status = 400, description = "Malformed window or party size"),
    ),
    tag = "Tables"
)]
pub async fn available_tables(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<ApiResponse<TableList>>> {
    let resp = table_service::available_tables(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/tables/{id}/status",
    request_body = UpdateTableStatusRequest,
    security(("bearer_auth" = [])),
    tag = "Tables"
)]
pub async fn update_table_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTableStatusRequest>,
) -> AppResult<Json<ApiResponse<DiningTable>>> {
    let resp = table_service::update_table_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
