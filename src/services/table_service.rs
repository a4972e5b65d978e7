use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set,
};

use crate::{
    audit::log_audit,
    dto::tables::{TableList, UpdateTableStatusRequest},
    entity::{
        booking_details::{self, Column as BookingDetailCol, Entity as BookingDetails},
        bookings::Column as BookingCol,
        tables::{ActiveModel as TableActive, Column as TableCol, Entity as Tables, Model as TableModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{Access, AuthUser, STAFF},
    models::{BookingStatus, DiningTable, TableStatus},
    response::{ApiResponse, Meta},
    routes::params::AvailabilityQuery,
    state::AppState,
};

pub async fn list_tables(state: &AppState) -> AppResult<ApiResponse<TableList>> {
    let items = Tables::find()
        .filter(TableCol::IsActive.eq(true))
        .order_by_asc(TableCol::TableNumber)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(table_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success("Ok", TableList { items }, Some(Meta::empty())))
}

/// Tables big enough for the party with no PENDING/CONFIRMED booking
/// holding an overlapping slot. Pure read, no locks.
pub async fn available_tables(
    state: &AppState,
    query: AvailabilityQuery,
) -> AppResult<ApiResponse<TableList>> {
    if query.start_time >= query.end_time {
        return Err(AppError::BadRequest(
            "start_time must be before end_time".to_string(),
        ));
    }
    if query.guests < 1 {
        return Err(AppError::BadRequest("guests must be at least 1".to_string()));
    }

    // Half-open windows: [s1, e1) and [s2, e2) overlap iff s1 < e2 and e1 > s2,
    // so back-to-back slots never conflict.
    let booked: Vec<i64> = BookingDetails::find()
        .select_only()
        .column(BookingDetailCol::TableId)
        .distinct()
        .join(JoinType::InnerJoin, booking_details::Relation::Bookings.def())
        .filter(BookingDetailCol::StartTime.lt(query.end_time))
        .filter(BookingDetailCol::EndTime.gt(query.start_time))
        .filter(BookingCol::Status.is_in([
            BookingStatus::Pending.as_str(),
            BookingStatus::Confirmed.as_str(),
        ]))
        .into_tuple::<i64>()
        .all(&state.orm)
        .await?;

    let mut finder = Tables::find()
        .filter(TableCol::IsActive.eq(true))
        .filter(TableCol::Capacity.gte(query.guests));
    if !booked.is_empty() {
        finder = finder.filter(TableCol::Id.is_not_in(booked));
    }

    let items = finder
        .order_by_asc(TableCol::TableNumber)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(table_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success("Ok", TableList { items }, Some(Meta::empty())))
}

pub async fn update_table_status(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UpdateTableStatusRequest,
) -> AppResult<ApiResponse<DiningTable>> {
    Access::AnyRole(STAFF).check(user)?;

    let table = Tables::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: TableActive = table.into();
    active.status = Set(payload.status.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let table = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "table_status_update",
        Some("tables"),
        Some(serde_json::json!({ "table_id": id, "status": payload.status.as_str() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Table updated",
        table_from_entity(table)?,
        Some(Meta::empty()),
    ))
}

pub(crate) fn table_from_entity(model: TableModel) -> AppResult<DiningTable> {
    let status = TableStatus::from_str(&model.status).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("unknown table status: {}", model.status))
    })?;
    Ok(DiningTable {
        id: model.id,
        table_number: model.table_number,
        capacity: model.capacity,
        status,
    })
}
