use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Booking, BookingDetail};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    pub booking_time: DateTime<Utc>,
    pub number_of_guests: i32,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignDetailItem {
    pub table_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignDetailsRequest {
    pub details: Vec<AssignDetailItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingWithDetails {
    pub booking: Booking,
    pub details: Vec<BookingDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingList {
    pub items: Vec<Booking>,
}
