use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderDetail, OrderStatus, PaymentMethod};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CartLine {
    pub dish_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub cart: Vec<CartLine>,
    pub payment_method: Option<PaymentMethod>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceTableOrderRequest {
    pub table_id: i64,
    pub cart: Vec<CartLine>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithDetails {
    pub order: Order,
    pub details: Vec<OrderDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
