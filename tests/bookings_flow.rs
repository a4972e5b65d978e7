use axum_restaurant_api::{
    config::{AppConfig, FrontendUrls, MomoConfig, VnpayConfig},
    db::{create_orm_conn, create_pool},
    dto::bookings::{AssignDetailItem, AssignDetailsRequest, CreateBookingRequest},
    entity::{tables::ActiveModel as TableActive, users::ActiveModel as UserActive},
    error::AppError,
    middleware::auth::AuthUser,
    models::{BookingStatus, Role},
    notify::Mailer,
    routes::params::AvailabilityQuery,
    services::{booking_service, table_service},
    state::AppState,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;

// Integration flow: customer books, manager assigns tables with overlap
// protection, owner cancels, staff completes.
#[tokio::test]
async fn booking_assign_cancel_complete_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let customer = seed_principal(&state, Role::Customer, "diner@example.com").await?;
    let other_customer = seed_principal(&state, Role::Customer, "diner2@example.com").await?;
    let manager = seed_principal(&state, Role::Manager, "manager@example.com").await?;

    let big_table = seed_table(&state, "T10", 6).await?;
    let small_table = seed_table(&state, "T11", 2).await?;

    let start = Utc.with_ymd_and_hms(2026, 1, 10, 19, 0, 0).unwrap();
    let end = start + Duration::hours(2);

    let booking = booking_service::create_booking(
        &state,
        &customer,
        CreateBookingRequest {
            booking_time: start,
            number_of_guests: 4,
            note: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);

    // Only the six-seat table fits four guests, and nothing blocks the window yet.
    let available = available_ids(&state, start, end, 4).await?;
    assert!(available.contains(&big_table));
    assert!(!available.contains(&small_table));

    // Customers cannot assign tables.
    let err = booking_service::assign_details(
        &state,
        &customer,
        booking.id,
        assign_request(big_table, start, end),
    )
    .await;
    assert!(matches!(err, Err(AppError::Forbidden)));

    let confirmed = booking_service::assign_details(
        &state,
        &manager,
        booking.id,
        assign_request(big_table, start, end),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(confirmed.booking.status, BookingStatus::Confirmed);
    assert_eq!(confirmed.details.len(), 1);
    assert_eq!(confirmed.details[0].table.id, big_table);

    // The confirmed slot now blocks the window, but a back-to-back slot is free.
    let available = available_ids(&state, start, end, 4).await?;
    assert!(!available.contains(&big_table));
    let next_slot = available_ids(&state, end, end + Duration::hours(2), 4).await?;
    assert!(next_slot.contains(&big_table));

    // A second booking cannot grab an overlapping slot on the same table.
    let rival = booking_service::create_booking(
        &state,
        &other_customer,
        CreateBookingRequest {
            booking_time: start,
            number_of_guests: 2,
            note: None,
        },
    )
    .await?
    .data
    .unwrap();
    let err = booking_service::assign_details(
        &state,
        &manager,
        rival.id,
        assign_request(big_table, start + Duration::hours(1), end + Duration::hours(1)),
    )
    .await;
    assert!(matches!(err, Err(AppError::InvalidState(_))));

    // Re-assignment fully replaces the detail set.
    let reassigned = booking_service::assign_details(
        &state,
        &manager,
        booking.id,
        assign_request(small_table, start, end),
    )
    .await?
    .data
    .unwrap();
    assert_eq!(reassigned.details.len(), 1);
    assert_eq!(reassigned.details[0].table.id, small_table);
    let available = available_ids(&state, start, end, 4).await?;
    assert!(available.contains(&big_table));

    // Owner cancels; a second cancel is an illegal transition.
    let cancelled = booking_service::cancel_booking(&state, &customer, booking.id)
        .await?
        .data
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    let err = booking_service::cancel_booking(&state, &customer, booking.id).await;
    assert!(matches!(err, Err(AppError::InvalidState(_))));

    // Cancelled bookings release their slots.
    let available = available_ids(&state, start, end, 2).await?;
    assert!(available.contains(&small_table));

    // Confirm and complete the rival booking.
    booking_service::assign_details(
        &state,
        &manager,
        rival.id,
        assign_request(big_table, start, end),
    )
    .await?;
    let completed = booking_service::complete_booking(&state, &manager, rival.id)
        .await?
        .data
        .unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);
    let err = booking_service::complete_booking(&state, &manager, rival.id).await;
    assert!(matches!(err, Err(AppError::InvalidState(_))));

    Ok(())
}

async fn available_ids(
    state: &AppState,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    guests: i32,
) -> anyhow::Result<Vec<i64>> {
    let response = table_service::available_tables(
        state,
        AvailabilityQuery {
            start_time: start,
            end_time: end,
            guests,
        },
    )
    .await?;
    Ok(response
        .data
        .unwrap()
        .items
        .into_iter()
        .map(|table| table.id)
        .collect())
}

fn assign_request(table_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> AssignDetailsRequest {
    AssignDetailsRequest {
        details: vec![AssignDetailItem {
            table_id,
            start_time: start,
            end_time: end,
            note: None,
        }],
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_details, orders, booking_details, bookings, reviews, dishes, categories, tables, audit_logs, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        config: test_config(database_url),
        mailer: Mailer::from_env(),
    })
}

async fn seed_principal(state: &AppState, role: Role, email: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.as_str().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role,
        email: user.email,
    })
}

async fn seed_table(state: &AppState, number: &str, capacity: i32) -> anyhow::Result<i64> {
    let table = TableActive {
        id: NotSet,
        table_number: Set(number.to_string()),
        capacity: Set(capacity),
        status: Set("AVAILABLE".into()),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(table.id)
}

fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 3000,
        vnpay: VnpayConfig {
            tmn_code: "TESTCODE".into(),
            hash_secret: "VNPAYTESTSECRET".into(),
            endpoint: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            return_url: "http://127.0.0.1:3000/api/payments/vnpay/return".into(),
        },
        momo: MomoConfig {
            partner_code: "MOMOTEST".into(),
            access_key: "AK123".into(),
            secret_key: "SK456".into(),
            endpoint: "https://test-payment.momo.vn/v2/gateway/api/create".into(),
            redirect_url: "http://127.0.0.1:3000/api/payments/momo/return".into(),
            ipn_url: "http://127.0.0.1:3000/api/payments/momo/ipn".into(),
        },
        frontend: FrontendUrls {
            payment_success: "http://localhost:3001/payment/success".into(),
            payment_failure: "http://localhost:3001/payment/failure".into(),
        },
    }
}
