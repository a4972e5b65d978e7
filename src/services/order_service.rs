use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CartLine, CreateOrderRequest, OrderList, OrderWithDetails, PlaceTableOrderRequest,
        UpdateOrderRequest,
    },
    entity::{
        dishes::{Column as DishCol, Entity as Dishes, Model as DishModel},
        order_details::{
            ActiveModel as OrderDetailActive, Column as OrderDetailCol, Entity as OrderDetails,
            Model as OrderDetailModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        tables::Entity as Tables,
    },
    error::{AppError, AppResult},
    middleware::auth::{Access, AuthUser, STAFF},
    models::{Order, OrderDetail, OrderStatus, PaymentMethod},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// Online checkout: always a fresh order owned by the caller. Unit prices
/// are snapshotted from the dish at creation time.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithDetails>> {
    let cart = merge_cart(&payload.cart)?;

    let txn = state.orm.begin().await?;

    let mut resolved: Vec<(DishModel, i32)> = Vec::with_capacity(cart.len());
    let mut total = Decimal::ZERO;
    for (dish_id, quantity) in cart {
        let dish = find_active_dish(&txn, dish_id).await?;
        total += dish.price * Decimal::from(quantity);
        resolved.push((dish, quantity));
    }

    let payment_method = payload.payment_method.unwrap_or(PaymentMethod::Cash);
    let order = OrderActive {
        id: NotSet,
        user_id: Set(Some(user.user_id)),
        table_id: Set(None),
        total_amount: Set(total),
        payment_method: Set(payment_method.as_str().to_string()),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        note: Set(payload.note),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut details: Vec<OrderDetailModel> = Vec::with_capacity(resolved.len());
    for (dish, quantity) in resolved {
        let detail = OrderDetailActive {
            id: NotSet,
            order_id: Set(order.id),
            dish_id: Set(dish.id),
            quantity: Set(quantity),
            unit_price: Set(dish.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        details.push(detail);
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        OrderWithDetails {
            order: order_from_entity(order)?,
            details: details.into_iter().map(detail_from_entity).collect(),
        },
        Some(Meta::empty()),
    ))
}

/// Dine-in tab: one PENDING order per table, merged under a row lock so
/// two waiters adding to the same tab serialize. Re-adding a dish bumps
/// its quantity and keeps the original price snapshot.
pub async fn place_order_at_table(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceTableOrderRequest,
) -> AppResult<ApiResponse<OrderWithDetails>> {
    Access::AnyRole(STAFF).check(user)?;

    let cart = merge_cart(&payload.cart)?;

    let txn = state.orm.begin().await?;

    Tables::find_by_id(payload.table_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let existing = Orders::find()
        .filter(OrderCol::TableId.eq(payload.table_id))
        .filter(OrderCol::Status.eq(OrderStatus::Pending.as_str()))
        .lock(LockType::Update)
        .one(&txn)
        .await?;

    let order = match existing {
        Some(order) => order,
        None => {
            OrderActive {
                id: NotSet,
                user_id: Set(None),
                table_id: Set(Some(payload.table_id)),
                total_amount: Set(Decimal::ZERO),
                payment_method: Set(PaymentMethod::Cash.as_str().to_string()),
                status: Set(OrderStatus::Pending.as_str().to_string()),
                note: Set(payload.note.clone()),
                created_at: NotSet,
                updated_at: NotSet,
            }
            .insert(&txn)
            .await?
        }
    };

    for (dish_id, quantity) in cart {
        let existing_detail = OrderDetails::find()
            .filter(OrderDetailCol::OrderId.eq(order.id))
            .filter(OrderDetailCol::DishId.eq(dish_id))
            .one(&txn)
            .await?;

        match existing_detail {
            Some(detail) => {
                let merged = detail.quantity + quantity;
                let mut active: OrderDetailActive = detail.into();
                active.quantity = Set(merged);
                active.update(&txn).await?;
            }
            None => {
                let dish = find_active_dish(&txn, dish_id).await?;
                OrderDetailActive {
                    id: NotSet,
                    order_id: Set(order.id),
                    dish_id: Set(dish.id),
                    quantity: Set(quantity),
                    unit_price: Set(dish.price),
                    created_at: NotSet,
                }
                .insert(&txn)
                .await?;
            }
        }
    }

    let details = OrderDetails::find()
        .filter(OrderDetailCol::OrderId.eq(order.id))
        .order_by_asc(OrderDetailCol::Id)
        .all(&txn)
        .await?;
    let total: Decimal = details
        .iter()
        .map(|detail| detail.unit_price * Decimal::from(detail.quantity))
        .sum();

    let mut active: OrderActive = order.into();
    active.total_amount = Set(total);
    if payload.note.is_some() {
        active.note = Set(payload.note.clone());
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "table_order_place",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "table_id": payload.table_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithDetails {
            order: order_from_entity(order)?,
            details: details.into_iter().map(detail_from_entity).collect(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut finder = Orders::find();
    if !user.role.is_staff() {
        finder = finder.filter(OrderCol::UserId.eq(user.user_id));
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        finder = finder.filter(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(Meta::paged(page, limit, total)),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<OrderWithDetails>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    Access::OwnerOr(order.user_id.unwrap_or(Uuid::nil()), STAFF).check(user)?;

    let details = OrderDetails::find()
        .filter(OrderDetailCol::OrderId.eq(order.id))
        .order_by_asc(OrderDetailCol::Id)
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Ok",
        OrderWithDetails {
            order: order_from_entity(order)?,
            details: details.into_iter().map(detail_from_entity).collect(),
        },
        Some(Meta::empty()),
    ))
}

/// Partial update. A supplied status must be a legal transition of the
/// order machine; everything else is patched as-is.
pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    Access::AnyRole(STAFF).check(user)?;

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let current = parse_status(&order.status)?;

    let mut active: OrderActive = order.into();
    if let Some(next) = payload.status {
        if next != current && !current.can_transition(next) {
            return Err(AppError::InvalidState(format!(
                "order cannot move from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }
        active.status = Set(next.as_str().to_string());
    }
    if let Some(method) = payload.payment_method {
        active.payment_method = Set(method.as_str().to_string());
    }
    if let Some(note) = payload.note {
        active.note = Set(Some(note));
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order)?,
        Some(Meta::empty()),
    ))
}

/// Collapse duplicate dish lines so the (order, dish) uniqueness invariant
/// holds however the cart arrives.
fn merge_cart(cart: &[CartLine]) -> AppResult<BTreeMap<i64, i32>> {
    if cart.is_empty() {
        return Err(AppError::BadRequest("cart must not be empty".to_string()));
    }
    let mut merged: BTreeMap<i64, i32> = BTreeMap::new();
    for line in cart {
        if line.quantity < 1 {
            return Err(AppError::BadRequest(
                "quantity must be at least 1".to_string(),
            ));
        }
        *merged.entry(line.dish_id).or_insert(0) += line.quantity;
    }
    Ok(merged)
}

async fn find_active_dish<C: ConnectionTrait>(conn: &C, dish_id: i64) -> AppResult<DishModel> {
    Dishes::find_by_id(dish_id)
        .filter(DishCol::IsActive.eq(true))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

fn parse_status(raw: &str) -> AppResult<OrderStatus> {
    OrderStatus::from_str(raw)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown order status: {raw}")))
}

fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let status = parse_status(&model.status)?;
    let payment_method = PaymentMethod::from_str(&model.payment_method).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "unknown payment method: {}",
            model.payment_method
        ))
    })?;
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        table_id: model.table_id,
        total_amount: model.total_amount,
        payment_method,
        status,
        note: model.note,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn detail_from_entity(model: OrderDetailModel) -> OrderDetail {
    OrderDetail {
        id: model.id,
        order_id: model.order_id,
        dish_id: model.dish_id,
        quantity: model.quantity,
        unit_price: model.unit_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_cart_collapses_duplicate_dishes() {
        let cart = vec![
            CartLine { dish_id: 1, quantity: 2 },
            CartLine { dish_id: 2, quantity: 1 },
            CartLine { dish_id: 1, quantity: 3 },
        ];
        let merged = merge_cart(&cart).unwrap();
        assert_eq!(merged.get(&1), Some(&5));
        assert_eq!(merged.get(&2), Some(&1));
    }

    #[test]
    fn empty_cart_is_rejected() {
        assert!(merge_cart(&[]).is_err());
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let cart = vec![CartLine { dish_id: 1, quantity: 0 }];
        assert!(merge_cart(&cart).is_err());
    }
}
