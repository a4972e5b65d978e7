use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
    routing::{get, post},
};

use crate::{
    dto::payments::{
        InitiatePaymentRequest, MomoIpnResponse, MomoPayUrl, VnpayIpnResponse, VnpayPayUrl,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    payments::momo::MomoIpnRequest,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/vnpay", post(initiate_vnpay))
        .route("/vnpay/ipn", get(vnpay_ipn))
        .route("/vnpay/return", get(vnpay_return))
        .route("/momo", post(initiate_momo))
        .route("/momo/ipn", post(momo_ipn))
        .route("/momo/return", get(momo_return))
}

#[utoipa::path(
    post,
    path = "/api/payments/vnpay",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "Signed VNPay redirect URL", body = ApiResponse<VnpayPayUrl>),
        (status = 400, description = "Order is not pending"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initiate_vnpay(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<InitiatePaymentRequest>,
) -> AppResult<Json<ApiResponse<VnpayPayUrl>>> {
    let client_ip = client_ip(&headers);
    let resp = payment_service::initiate_vnpay(&state, &user, payload, client_ip).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/payments/momo",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "MoMo wallet URL", body = ApiResponse<MomoPayUrl>),
        (status = 502, description = "Gateway unreachable or declined"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initiate_momo(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<InitiatePaymentRequest>,
) -> AppResult<Json<ApiResponse<MomoPayUrl>>> {
    let resp = payment_service::initiate_momo(&state, &user, payload).await?;
    Ok(Json(resp))
}

/// Gateways retry on anything but 200, so the IPN endpoints always answer
/// 200 with the in-band status body.
#[utoipa::path(get, path = "/api/payments/vnpay/ipn", tag = "Payments")]
pub async fn vnpay_ipn(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<VnpayIpnResponse> {
    Json(payment_service::vnpay_ipn(&state, params).await)
}

#[utoipa::path(post, path = "/api/payments/momo/ipn", request_body = MomoIpnRequest, tag = "Payments")]
pub async fn momo_ipn(
    State(state): State<AppState>,
    Json(payload): Json<MomoIpnRequest>,
) -> Json<MomoIpnResponse> {
    Json(payment_service::momo_ipn(&state, payload).await)
}

#[utoipa::path(get, path = "/api/payments/vnpay/return", tag = "Payments")]
pub async fn vnpay_return(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Redirect {
    Redirect::temporary(&payment_service::vnpay_return(&state, &params))
}

#[utoipa::path(get, path = "/api/payments/momo/return", tag = "Payments")]
pub async fn momo_return(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Redirect {
    Redirect::temporary(&payment_service::momo_return(&state, &params))
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}
