use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        bookings::{AssignDetailItem, AssignDetailsRequest, BookingList, BookingWithDetails, CreateBookingRequest},
        dishes::{CategoryList, DishList},
        orders::{CartLine, CreateOrderRequest, OrderList, OrderWithDetails, PlaceTableOrderRequest, UpdateOrderRequest},
        payments::{InitiatePaymentRequest, MomoIpnResponse, MomoPayUrl, VnpayIpnResponse, VnpayPayUrl},
        reviews::{CreateReviewRequest, ReviewList, UpdateReviewRequest},
        tables::{TableList, UpdateTableStatusRequest},
    },
    models::{Booking, BookingDetail, Category, DiningTable, Dish, Order, OrderDetail, Review, User},
    payments::momo::MomoIpnRequest,
    response::{ApiResponse, Meta},
    routes::{auth, bookings, dishes, health, orders, params, payments, reviews, tables},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        dishes::list_dishes,
        dishes::list_categories,
        dishes::list_reviews,
        dishes::create_review,
        reviews::update_review,
        reviews::delete_review,
        tables::list_tables,
        tables::available_tables,
        tables::update_table_status,
        bookings::create_booking,
        bookings::list_bookings,
        bookings::get_booking,
        bookings::assign_details,
        bookings::cancel_booking,
        bookings::complete_booking,
        orders::list_orders,
        orders::create_order,
        orders::place_order_at_table,
        orders::get_order,
        orders::update_order,
        payments::initiate_vnpay,
        payments::initiate_momo,
        payments::vnpay_ipn,
        payments::momo_ipn,
        payments::vnpay_return,
        payments::momo_return
    ),
    components(
        schemas(
            User,
            Category,
            Dish,
            DiningTable,
            Booking,
            BookingDetail,
            Order,
            OrderDetail,
            Review,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CreateBookingRequest,
            AssignDetailItem,
            AssignDetailsRequest,
            BookingList,
            BookingWithDetails,
            CartLine,
            CreateOrderRequest,
            PlaceTableOrderRequest,
            UpdateOrderRequest,
            OrderList,
            OrderWithDetails,
            InitiatePaymentRequest,
            VnpayPayUrl,
            MomoPayUrl,
            VnpayIpnResponse,
            MomoIpnResponse,
            MomoIpnRequest,
            CreateReviewRequest,
            UpdateReviewRequest,
            ReviewList,
            CategoryList,
            DishList,
            TableList,
            UpdateTableStatusRequest,
            params::Pagination,
            params::DishQuery,
            params::BookingListQuery,
            params::OrderListQuery,
            params::AvailabilityQuery,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithDetails>,
            ApiResponse<BookingWithDetails>,
            ApiResponse<TableList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Menu", description = "Category and dish browsing"),
        (name = "Reviews", description = "Dish review endpoints"),
        (name = "Tables", description = "Table listing and availability"),
        (name = "Bookings", description = "Table booking lifecycle"),
        (name = "Orders", description = "Online and dine-in orders"),
        (name = "Payments", description = "Gateway initiation and callbacks"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
