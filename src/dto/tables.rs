use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{DiningTable, TableStatus};

#[derive(Debug, Serialize, ToSchema)]
pub struct TableList {
    pub items: Vec<DiningTable>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTableStatusRequest {
    pub status: TableStatus,
}
