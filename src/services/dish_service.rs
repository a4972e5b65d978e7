use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::{
    dto::dishes::{CategoryList, DishList},
    entity::{
        categories::{Column as CategoryCol, Entity as Categories, Model as CategoryModel},
        dishes::{Column as DishCol, Entity as Dishes, Model as DishModel},
    },
    error::AppResult,
    models::{Category, Dish},
    response::{ApiResponse, Meta},
    routes::params::DishQuery,
    state::AppState,
};

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = Categories::find()
        .filter(CategoryCol::IsActive.eq(true))
        .order_by_asc(CategoryCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(category_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        CategoryList { items },
        Some(Meta::empty()),
    ))
}

pub async fn list_dishes(state: &AppState, query: DishQuery) -> AppResult<ApiResponse<DishList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut finder = Dishes::find().filter(DishCol::IsActive.eq(true));
    if let Some(q) = query.q.as_ref().filter(|q| !q.is_empty()) {
        finder = finder.filter(DishCol::Name.contains(q));
    }
    if let Some(category_id) = query.category_id {
        finder = finder.filter(DishCol::CategoryId.eq(category_id));
    }
    let finder = finder.order_by_desc(DishCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(dish_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        DishList { items },
        Some(Meta::paged(page, limit, total)),
    ))
}

fn category_from_entity(model: CategoryModel) -> Category {
    Category {
        id: model.id,
        name: model.name,
        description: model.description,
    }
}

fn dish_from_entity(model: DishModel) -> Dish {
    Dish {
        id: model.id,
        name: model.name,
        price: model.price,
        description: model.description,
        category_id: model.category_id,
    }
}
