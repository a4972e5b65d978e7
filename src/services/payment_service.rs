use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{ActiveModelTrait, EntityTrait, QuerySelect, Set, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::payments::{
        InitiatePaymentRequest, MomoIpnResponse, MomoPayUrl, VnpayIpnResponse, VnpayPayUrl,
    },
    entity::orders::{ActiveModel as OrderActive, Entity as Orders, Model as OrderModel},
    error::{AppError, AppResult},
    middleware::auth::{Access, AuthUser, STAFF},
    models::{OrderStatus, PaymentMethod},
    payments::{
        build_txn_ref, from_minor_units,
        momo::{self, MomoClient, MomoIpnRequest},
        parse_txn_ref, to_minor_units,
        vnpay::{self, VnpayClient},
    },
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Outcome of applying one gateway notification to an order.
#[derive(Debug, PartialEq, Eq)]
enum Settlement {
    Applied,
    AlreadyFinal,
    AmountMismatch,
    NotFound,
}

/// Build the signed VNPay redirect URL for a pending order. No network
/// traffic; the gateway is only contacted by the user's browser.
pub async fn initiate_vnpay(
    state: &AppState,
    user: &AuthUser,
    payload: InitiatePaymentRequest,
    client_ip: String,
) -> AppResult<ApiResponse<VnpayPayUrl>> {
    let order = eligible_order(state, user, payload.order_id).await?;

    let amount_minor = to_minor_units(order.total_amount)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order total out of range")))?;
    let txn_ref = build_txn_ref(order.id);
    let create_date = Utc::now().format("%Y%m%d%H%M%S").to_string();
    let order_info = format!("Payment for order #{}", order.id);

    let client = VnpayClient::new(state.config.vnpay.clone());
    let payment_url = client
        .payment_url(&txn_ref, amount_minor, &order_info, &client_ip, &create_date)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("VNPay signing failed")))?;

    audit_initiation(state, user, order.id, "vnpay").await;

    Ok(ApiResponse::success(
        "Payment URL created",
        VnpayPayUrl { payment_url },
        Some(Meta::empty()),
    ))
}

/// Ask MoMo for a wallet payment URL. The HTTP call runs outside any
/// database transaction.
pub async fn initiate_momo(
    state: &AppState,
    user: &AuthUser,
    payload: InitiatePaymentRequest,
) -> AppResult<ApiResponse<MomoPayUrl>> {
    let order = eligible_order(state, user, payload.order_id).await?;

    let amount_minor = to_minor_units(order.total_amount)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order total out of range")))?;
    let txn_ref = build_txn_ref(order.id);
    let order_info = format!("Payment for order #{}", order.id);

    let client = MomoClient::new(state.config.momo.clone());
    let pay_url = client
        .create_payment(&txn_ref, amount_minor, &order_info)
        .await?;

    audit_initiation(state, user, order.id, "momo").await;

    Ok(ApiResponse::success(
        "Payment URL created",
        MomoPayUrl { pay_url },
        Some(Meta::empty()),
    ))
}

/// VNPay server-to-server notification. Always answers with the gateway's
/// in-band status body; replays and unknown references are no-ops.
pub async fn vnpay_ipn(state: &AppState, params: HashMap<String, String>) -> VnpayIpnResponse {
    let client = VnpayClient::new(state.config.vnpay.clone());
    if !client.verify(&params) {
        return VnpayIpnResponse::invalid_checksum();
    }

    let order_id = match params
        .get(vnpay::TXN_REF_PARAM)
        .and_then(|txn_ref| parse_txn_ref(txn_ref))
    {
        Some(id) => id,
        None => return VnpayIpnResponse::order_not_found(),
    };

    let amount_minor = match params
        .get(vnpay::AMOUNT_PARAM)
        .and_then(|raw| raw.parse::<i64>().ok())
    {
        Some(amount) => amount,
        None => return VnpayIpnResponse::invalid_amount(),
    };

    let success = params
        .get(vnpay::RESPONSE_CODE_PARAM)
        .is_some_and(|code| code == vnpay::RESPONSE_SUCCESS);

    match settle(state, order_id, amount_minor, success, PaymentMethod::Vnpay).await {
        Ok(Settlement::Applied) => VnpayIpnResponse::confirm_success(),
        Ok(Settlement::AlreadyFinal) => VnpayIpnResponse::already_confirmed(),
        Ok(Settlement::AmountMismatch) => VnpayIpnResponse::invalid_amount(),
        Ok(Settlement::NotFound) => VnpayIpnResponse::order_not_found(),
        Err(err) => {
            tracing::error!(error = %err, order_id, "VNPay settlement failed");
            VnpayIpnResponse::unknown_error()
        }
    }
}

/// MoMo server-to-server notification, same pipeline with the numeric
/// result-code sentinel.
pub async fn momo_ipn(state: &AppState, payload: MomoIpnRequest) -> MomoIpnResponse {
    let client = MomoClient::new(state.config.momo.clone());
    if !client.verify_ipn(&payload) {
        return MomoIpnResponse::invalid_signature();
    }

    let order_id = match parse_txn_ref(&payload.order_id) {
        Some(id) => id,
        None => return MomoIpnResponse::order_not_found(),
    };

    let success = payload.result_code == momo::RESULT_SUCCESS;

    match settle(state, order_id, payload.amount, success, PaymentMethod::Momo).await {
        Ok(Settlement::Applied) => MomoIpnResponse::confirm_success(),
        Ok(Settlement::AlreadyFinal) => MomoIpnResponse::already_confirmed(),
        Ok(Settlement::AmountMismatch) => MomoIpnResponse::invalid_amount(),
        Ok(Settlement::NotFound) => MomoIpnResponse::order_not_found(),
        Err(err) => {
            tracing::error!(error = %err, order_id, "MoMo settlement failed");
            MomoIpnResponse::unknown_error()
        }
    }
}

/// Browser return from VNPay. Informational only: pick the landing page,
/// never touch order state.
pub fn vnpay_return(state: &AppState, params: &HashMap<String, String>) -> String {
    let client = VnpayClient::new(state.config.vnpay.clone());
    let paid = client.verify(params)
        && params
            .get(vnpay::RESPONSE_CODE_PARAM)
            .is_some_and(|code| code == vnpay::RESPONSE_SUCCESS);
    if paid {
        state.config.frontend.payment_success.clone()
    } else {
        state.config.frontend.payment_failure.clone()
    }
}

/// Browser return from MoMo. The query mirrors the IPN payload but with
/// string-typed values; only the result code matters for routing since the
/// IPN is the sole finalizer.
pub fn momo_return(state: &AppState, params: &HashMap<String, String>) -> String {
    let paid = params
        .get("resultCode")
        .is_some_and(|code| code == "0");
    if paid {
        state.config.frontend.payment_success.clone()
    } else {
        state.config.frontend.payment_failure.clone()
    }
}

async fn eligible_order(state: &AppState, user: &AuthUser, order_id: i64) -> AppResult<OrderModel> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    Access::OwnerOr(order.user_id.unwrap_or(Uuid::nil()), STAFF).check(user)?;

    let status = OrderStatus::from_str(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown order status: {}", order.status)))?;
    if status != OrderStatus::Pending {
        return Err(AppError::InvalidState(format!(
            "only pending orders can be paid, current status is {}",
            status.as_str()
        )));
    }

    Ok(order)
}

/// The single at-most-once transition point. The PENDING check and the
/// status write happen under one row lock, so duplicate or racing
/// notifications observe a final state and leave it alone.
async fn settle(
    state: &AppState,
    order_id: i64,
    amount_minor: i64,
    success: bool,
    method: PaymentMethod,
) -> AppResult<Settlement> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(order) => order,
        None => return Ok(Settlement::NotFound),
    };

    if from_minor_units(amount_minor) != order.total_amount {
        return Ok(Settlement::AmountMismatch);
    }

    let status = OrderStatus::from_str(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown order status: {}", order.status)))?;
    if status != OrderStatus::Pending {
        return Ok(Settlement::AlreadyFinal);
    }

    let next = if success {
        OrderStatus::Completed
    } else {
        OrderStatus::Cancelled
    };

    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    if success {
        active.payment_method = Set(method.as_str().to_string());
    }
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        None,
        "payment_settled",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order_id,
            "gateway": method.as_str(),
            "outcome": next.as_str(),
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(Settlement::Applied)
}

async fn audit_initiation(state: &AppState, user: &AuthUser, order_id: i64, gateway: &str) {
    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_initiated",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order_id, "gateway": gateway })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }
}
