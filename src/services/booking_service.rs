use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};

use crate::{
    audit::log_audit,
    dto::bookings::{
        AssignDetailItem, AssignDetailsRequest, BookingList, BookingWithDetails,
        CreateBookingRequest,
    },
    entity::{
        booking_details::{
            self, ActiveModel as BookingDetailActive, Column as BookingDetailCol,
            Entity as BookingDetails, Model as BookingDetailModel,
        },
        bookings::{
            ActiveModel as BookingActive, Column as BookingCol, Entity as Bookings,
            Model as BookingModel,
        },
        tables::{Entity as Tables, Model as TableModel},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{Access, AuthUser, MANAGERS, STAFF},
    models::{Booking, BookingDetail, BookingStatus},
    notify::send_booking_confirmation,
    response::{ApiResponse, Meta},
    routes::params::BookingListQuery,
    state::AppState,
};

pub async fn create_booking(
    state: &AppState,
    user: &AuthUser,
    payload: CreateBookingRequest,
) -> AppResult<ApiResponse<Booking>> {
    if payload.number_of_guests < 1 {
        return Err(AppError::BadRequest(
            "number_of_guests must be at least 1".to_string(),
        ));
    }

    let booking = BookingActive {
        id: NotSet,
        user_id: Set(user.user_id),
        booking_time: Set(payload.booking_time.into()),
        number_of_guests: Set(payload.number_of_guests),
        note: Set(payload.note),
        status: Set(BookingStatus::Pending.as_str().to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "booking_create",
        Some("bookings"),
        Some(serde_json::json!({ "booking_id": booking.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Booking created",
        booking_from_entity(booking)?,
        Some(Meta::empty()),
    ))
}

pub async fn list_bookings(
    state: &AppState,
    user: &AuthUser,
    query: BookingListQuery,
) -> AppResult<ApiResponse<BookingList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut finder = Bookings::find();
    if !user.role.is_staff() {
        finder = finder.filter(BookingCol::UserId.eq(user.user_id));
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        finder = finder.filter(BookingCol::Status.eq(status.clone()));
    }
    let finder = finder.order_by_desc(BookingCol::BookingTime);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(booking_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Ok",
        BookingList { items },
        Some(Meta::paged(page, limit, total)),
    ))
}

pub async fn get_booking(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<BookingWithDetails>> {
    let booking = Bookings::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    Access::OwnerOr(booking.user_id, STAFF).check(user)?;

    let details = BookingDetails::find()
        .filter(BookingDetailCol::BookingId.eq(booking.id))
        .find_also_related(Tables)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(detail, table)| {
            let table = table.ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("booking detail without table"))
            })?;
            detail_from_entity(detail, table)
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Ok",
        BookingWithDetails {
            booking: booking_from_entity(booking)?,
            details,
        },
        Some(Meta::empty()),
    ))
}

/// Replace a PENDING booking's table assignment and confirm it, in one
/// transaction. Every requested slot is re-checked against live bookings
/// under a table row lock, so two staff members confirming overlapping
/// requests cannot both commit.
pub async fn assign_details(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: AssignDetailsRequest,
) -> AppResult<ApiResponse<BookingWithDetails>> {
    Access::AnyRole(MANAGERS).check(user)?;

    if payload.details.is_empty() {
        return Err(AppError::BadRequest(
            "details must be a non-empty array".to_string(),
        ));
    }
    for item in &payload.details {
        if item.start_time >= item.end_time {
            return Err(AppError::BadRequest(
                "start_time must be before end_time".to_string(),
            ));
        }
    }
    reject_internal_overlaps(&payload.details)?;

    let txn = state.orm.begin().await?;

    let booking = Bookings::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    // Re-assignment of a confirmed booking swaps its detail set wholesale;
    // terminal bookings are immutable.
    let status = parse_status(&booking.status)?;
    if !matches!(status, BookingStatus::Pending | BookingStatus::Confirmed) {
        return Err(AppError::InvalidState(format!(
            "bookings cannot be assigned from {}",
            status.as_str()
        )));
    }

    // Lock each requested table before the overlap check so a concurrent
    // assignment for the same table serializes behind this transaction.
    let mut tables: HashMap<i64, TableModel> = HashMap::new();
    for item in &payload.details {
        let table = Tables::find_by_id(item.table_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        if has_conflict(&txn, booking.id, item).await? {
            return Err(AppError::InvalidState(format!(
                "table {} is already booked in the requested window",
                table.table_number
            )));
        }
        tables.insert(table.id, table);
    }

    BookingDetails::delete_many()
        .filter(BookingDetailCol::BookingId.eq(booking.id))
        .exec(&txn)
        .await?;

    let mut inserted: Vec<BookingDetailModel> = Vec::with_capacity(payload.details.len());
    for item in &payload.details {
        let detail = BookingDetailActive {
            id: NotSet,
            booking_id: Set(booking.id),
            table_id: Set(item.table_id),
            start_time: Set(item.start_time.into()),
            end_time: Set(item.end_time.into()),
            note: Set(item.note.clone()),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        inserted.push(detail);
    }

    let mut active: BookingActive = booking.into();
    active.status = Set(BookingStatus::Confirmed.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&txn).await?;

    let owner = Users::find_by_id(booking.user_id).one(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "booking_assign",
        Some("bookings"),
        Some(serde_json::json!({ "booking_id": booking.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    // Confirmation email happens off the request path; a failed send is a
    // warning, the booking stays confirmed.
    if let Some(owner) = owner {
        let table_numbers = inserted
            .iter()
            .filter_map(|detail| tables.get(&detail.table_id))
            .map(|table| table.table_number.clone())
            .collect();
        send_booking_confirmation(state.mailer.clone(), owner.email, booking.id, table_numbers);
    }

    let details = inserted
        .into_iter()
        .map(|detail| {
            let table = tables.get(&detail.table_id).cloned().ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("assigned table missing from lookup"))
            })?;
            detail_from_entity(detail, table)
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "Booking confirmed",
        BookingWithDetails {
            booking: booking_from_entity(booking)?,
            details,
        },
        Some(Meta::empty()),
    ))
}

pub async fn cancel_booking(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<Booking>> {
    let txn = state.orm.begin().await?;

    let booking = Bookings::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    Access::OwnerOr(booking.user_id, STAFF).check(user)?;

    let status = parse_status(&booking.status)?;
    if !status.can_transition(BookingStatus::Cancelled) {
        return Err(AppError::InvalidState(format!(
            "booking cannot be cancelled from {}",
            status.as_str()
        )));
    }

    let mut active: BookingActive = booking.into();
    active.status = Set(BookingStatus::Cancelled.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "booking_cancel",
        Some("bookings"),
        Some(serde_json::json!({ "booking_id": booking.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Booking cancelled",
        booking_from_entity(booking)?,
        Some(Meta::empty()),
    ))
}

pub async fn complete_booking(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<Booking>> {
    Access::AnyRole(STAFF).check(user)?;

    let txn = state.orm.begin().await?;

    let booking = Bookings::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let status = parse_status(&booking.status)?;
    if !status.can_transition(BookingStatus::Completed) {
        return Err(AppError::InvalidState(format!(
            "booking cannot be completed from {}",
            status.as_str()
        )));
    }

    let mut active: BookingActive = booking.into();
    active.status = Set(BookingStatus::Completed.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "booking_complete",
        Some("bookings"),
        Some(serde_json::json!({ "booking_id": booking.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Booking completed",
        booking_from_entity(booking)?,
        Some(Meta::empty()),
    ))
}

/// True when any PENDING/CONFIRMED booking other than `booking_id` holds a
/// detail for the same table overlapping the requested half-open window.
async fn has_conflict(
    txn: &DatabaseTransaction,
    booking_id: i64,
    item: &AssignDetailItem,
) -> AppResult<bool> {
    let conflicts = BookingDetails::find()
        .join(JoinType::InnerJoin, booking_details::Relation::Bookings.def())
        .filter(BookingDetailCol::TableId.eq(item.table_id))
        .filter(BookingDetailCol::BookingId.ne(booking_id))
        .filter(BookingDetailCol::StartTime.lt(item.end_time))
        .filter(BookingDetailCol::EndTime.gt(item.start_time))
        .filter(BookingCol::Status.is_in([
            BookingStatus::Pending.as_str(),
            BookingStatus::Confirmed.as_str(),
        ]))
        .count(txn)
        .await?;
    Ok(conflicts > 0)
}

/// Two slots for the same table inside one request must not overlap either.
fn reject_internal_overlaps(details: &[AssignDetailItem]) -> AppResult<()> {
    for (i, a) in details.iter().enumerate() {
        for b in details.iter().skip(i + 1) {
            if a.table_id == b.table_id && a.start_time < b.end_time && a.end_time > b.start_time {
                return Err(AppError::BadRequest(format!(
                    "requested slots for table {} overlap each other",
                    a.table_id
                )));
            }
        }
    }
    Ok(())
}

fn parse_status(raw: &str) -> AppResult<BookingStatus> {
    BookingStatus::from_str(raw)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown booking status: {raw}")))
}

fn booking_from_entity(model: BookingModel) -> AppResult<Booking> {
    let status = parse_status(&model.status)?;
    Ok(Booking {
        id: model.id,
        user_id: model.user_id,
        booking_time: model.booking_time.with_timezone(&Utc),
        number_of_guests: model.number_of_guests,
        note: model.note,
        status,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn detail_from_entity(detail: BookingDetailModel, table: TableModel) -> AppResult<BookingDetail> {
    Ok(BookingDetail {
        id: detail.id,
        table: crate::services::table_service::table_from_entity(table)?,
        start_time: detail.start_time.with_timezone(&Utc),
        end_time: detail.end_time.with_timezone(&Utc),
        note: detail.note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn item(table_id: i64, start_hour: i64, end_hour: i64) -> AssignDetailItem {
        let base = Utc.with_ymd_and_hms(2025, 12, 24, 0, 0, 0).unwrap();
        AssignDetailItem {
            table_id,
            start_time: base + Duration::hours(start_hour),
            end_time: base + Duration::hours(end_hour),
            note: None,
        }
    }

    #[test]
    fn overlapping_slots_for_same_table_are_rejected() {
        let details = vec![item(1, 18, 20), item(1, 19, 21)];
        assert!(reject_internal_overlaps(&details).is_err());
    }

    #[test]
    fn touching_slots_do_not_overlap() {
        let details = vec![item(1, 18, 20), item(1, 20, 22)];
        assert!(reject_internal_overlaps(&details).is_ok());
    }

    #[test]
    fn same_window_on_different_tables_is_fine() {
        let details = vec![item(1, 18, 20), item(2, 18, 20)];
        assert!(reject_internal_overlaps(&details).is_ok());
    }
}
