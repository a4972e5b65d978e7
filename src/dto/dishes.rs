use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Category, Dish};

#[derive(Debug, Serialize, ToSchema)]
pub struct DishList {
    pub items: Vec<Dish>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryList {
    pub items: Vec<Category>,
}
