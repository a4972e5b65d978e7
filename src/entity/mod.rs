pub mod booking_details;
pub mod bookings;
pub mod categories;
pub mod dishes;
pub mod order_details;
pub mod orders;
pub mod reviews;
pub mod tables;
pub mod users;

pub use booking_details::Entity as BookingDetails;
pub use bookings::Entity as Bookings;
pub use categories::Entity as Categories;
pub use dishes::Entity as Dishes;
pub use order_details::Entity as OrderDetails;
pub use orders::Entity as Orders;
pub use reviews::Entity as Reviews;
pub use tables::Entity as Tables;
pub use users::Entity as Users;
