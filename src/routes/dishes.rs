use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};

use crate::{
    dto::{
        dishes::{CategoryList, DishList},
        reviews::{CreateReviewRequest, ReviewList},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Review,
    response::ApiResponse,
    routes::params::DishQuery,
    services::{dish_service, review_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_dishes))
        .route("/{id}/reviews", get(list_reviews).post(create_review))
}

pub fn category_router() -> Router<AppState> {
    Router::new().route("/", get(list_categories))
}

#[utoipa::path(
    get,
    path = "/api/dishes",
    params(
        ("q" = Option<String>, Query, description = "Name search"),
        ("category_id" = Option<i64>, Query, description = "Filter by category"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "List active dishes", body = ApiResponse<DishList>)
    ),
    tag = "Menu"
)]
pub async fn list_dishes(
    State(state): State<AppState>,
    Query(query): Query<DishQuery>,
) -> AppResult<Json<ApiResponse<DishList>>> {
    let resp = dish_service::list_dishes(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/categories", tag = "Menu")]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    let resp = dish_service::list_categories(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(get, path = "/api/dishes/{id}/reviews", tag = "Reviews")]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<ReviewList>>> {
    let resp = review_service::list_for_dish(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/dishes/{id}/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 200, description = "Create review", body = ApiResponse<Review>),
        (status = 400, description = "Already reviewed or invalid rating"),
        (status = 404, description = "Dish not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let resp = review_service::create_review(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
