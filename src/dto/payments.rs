use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    pub order_id: i64,
}

/// VNPay hands the browser a redirect URL.
#[derive(Debug, Serialize, ToSchema)]
pub struct VnpayPayUrl {
    #[serde(rename = "paymentUrl")]
    pub payment_url: String,
}

/// MoMo returns the wallet URL from its create call.
#[derive(Debug, Serialize, ToSchema)]
pub struct MomoPayUrl {
    #[serde(rename = "payUrl")]
    pub pay_url: String,
}

/// In-band status body VNPay expects from the IPN endpoint. The code and
/// message strings are part of the gateway contract.
#[derive(Debug, Serialize, ToSchema)]
pub struct VnpayIpnResponse {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl VnpayIpnResponse {
    pub fn confirm_success() -> Self {
        Self::with("00", "Confirm Success")
    }

    pub fn order_not_found() -> Self {
        Self::with("01", "Order Not Found")
    }

    pub fn already_confirmed() -> Self {
        Self::with("02", "Order Already Confirmed")
    }

    pub fn invalid_amount() -> Self {
        Self::with("04", "Invalid Amount")
    }

    pub fn invalid_checksum() -> Self {
        Self::with("97", "Invalid Checksum")
    }

    pub fn unknown_error() -> Self {
        Self::with("99", "Unknown Error")
    }

    fn with(code: &str, message: &str) -> Self {
        Self {
            rsp_code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// In-band status body returned to MoMo from the IPN endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct MomoIpnResponse {
    #[serde(rename = "resultCode")]
    pub result_code: i64,
    pub message: String,
}

impl MomoIpnResponse {
    pub fn confirm_success() -> Self {
        Self::with(0, "Confirm Success")
    }

    pub fn order_not_found() -> Self {
        Self::with(1, "Order Not Found")
    }

    pub fn already_confirmed() -> Self {
        Self::with(2, "Order Already Confirmed")
    }

    pub fn invalid_amount() -> Self {
        Self::with(4, "Invalid Amount")
    }

    pub fn invalid_signature() -> Self {
        Self::with(97, "Invalid Signature")
    }

    pub fn unknown_error() -> Self {
        Self::with(99, "Unknown Error")
    }

    fn with(code: i64, message: &str) -> Self {
        Self {
            result_code: code,
            message: message.to_string(),
        }
    }
}
