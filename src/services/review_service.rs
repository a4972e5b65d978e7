use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::{
    audit::log_audit,
    dto::reviews::{CreateReviewRequest, ReviewList, UpdateReviewRequest},
    entity::{
        dishes::{Column as DishCol, Entity as Dishes},
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews, Model as ReviewModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{Access, AuthUser},
    models::Review,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_for_dish(state: &AppState, dish_id: i64) -> AppResult<ApiResponse<ReviewList>> {
    ensure_dish_exists(state, dish_id).await?;

    let items = Reviews::find()
        .filter(ReviewCol::DishId.eq(dish_id))
        .filter(ReviewCol::IsActive.eq(true))
        .order_by_desc(ReviewCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(review_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        ReviewList { items },
        Some(Meta::empty()),
    ))
}

/// One review per diner per dish; a second submission is a client error.
pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    dish_id: i64,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    validate_rating(payload.rating)?;
    ensure_dish_exists(state, dish_id).await?;

    let existing = Reviews::find()
        .filter(ReviewCol::DishId.eq(dish_id))
        .filter(ReviewCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest(
            "You have already reviewed this dish".to_string(),
        ));
    }

    let review = ReviewActive {
        id: NotSet,
        user_id: Set(user.user_id),
        dish_id: Set(dish_id),
        rating: Set(payload.rating),
        content: Set(payload.content),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "review_create",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review.id, "dish_id": dish_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review created",
        review_from_entity(review),
        Some(Meta::empty()),
    ))
}

pub async fn update_review(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UpdateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    let review = find_active_review(state, id).await?;
    Access::OwnerOr(review.user_id, &[]).check(user)?;

    if let Some(rating) = payload.rating {
        validate_rating(rating)?;
    }

    let mut active: ReviewActive = review.into();
    if let Some(rating) = payload.rating {
        active.rating = Set(rating);
    }
    if let Some(content) = payload.content {
        active.content = Set(content);
    }
    active.updated_at = Set(Utc::now().into());
    let review = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Review updated",
        review_from_entity(review),
        Some(Meta::empty()),
    ))
}

/// Soft delete so moderation history survives.
pub async fn delete_review(state: &AppState, user: &AuthUser, id: i64) -> AppResult<ApiResponse<serde_json::Value>> {
    let review = find_active_review(state, id).await?;
    Access::OwnerOr(review.user_id, &[]).check(user)?;

    let mut active: ReviewActive = review.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Review removed",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn ensure_dish_exists(state: &AppState, dish_id: i64) -> AppResult<()> {
    Dishes::find_by_id(dish_id)
        .filter(DishCol::IsActive.eq(true))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(())
}

async fn find_active_review(state: &AppState, id: i64) -> AppResult<ReviewModel> {
    Reviews::find_by_id(id)
        .filter(ReviewCol::IsActive.eq(true))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

fn validate_rating(rating: i16) -> AppResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::BadRequest(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        user_id: model.user_id,
        dish_id: model.dish_id,
        rating: model.rating,
        content: model.content,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
