pub mod auth_service;
pub mod booking_service;
pub mod dish_service;
pub mod order_service;
pub mod payment_service;
pub mod review_service;
pub mod table_service;
