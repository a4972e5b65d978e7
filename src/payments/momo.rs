use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::MomoConfig,
    error::{AppError, AppResult},
};

type HmacSha256 = Hmac<Sha256>;

/// The gateway's success sentinel for `resultCode`.
pub const RESULT_SUCCESS: i64 = 0;

const REQUEST_TYPE: &str = "captureWallet";
const CREATE_RETRIES: usize = 2;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Server-to-server notification payload the gateway posts to the IPN
/// endpoint after a wallet transaction settles.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MomoIpnRequest {
    pub partner_code: String,
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    pub order_info: String,
    pub order_type: String,
    pub trans_id: i64,
    pub result_code: i64,
    pub message: String,
    pub pay_type: String,
    pub response_time: i64,
    pub extra_data: String,
    pub signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    partner_code: String,
    access_key: String,
    request_id: String,
    amount: i64,
    order_id: String,
    order_info: String,
    redirect_url: String,
    ipn_url: String,
    extra_data: String,
    request_type: String,
    signature: String,
    lang: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    result_code: i64,
    message: Option<String>,
    pay_url: Option<String>,
}

/// Creates wallet payments and verifies inbound notification signatures
/// for the MoMo gateway.
#[derive(Debug, Clone)]
pub struct MomoClient {
    config: MomoConfig,
    http: reqwest::Client,
}

impl MomoClient {
    pub fn new(config: MomoConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Ask the gateway for a wallet payment URL. Retries transient network
    /// failures a bounded number of times; called before any database
    /// transaction is opened.
    pub async fn create_payment(
        &self,
        txn_ref: &str,
        amount_minor: i64,
        order_info: &str,
    ) -> AppResult<String> {
        let request_id = Uuid::new_v4().to_string();
        let raw = create_raw_input(&self.config, &request_id, txn_ref, amount_minor, order_info);
        let signature = hmac_sha256_hex(self.config.secret_key.as_bytes(), &raw)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("HMAC key rejected")))?;

        let body = CreateRequest {
            partner_code: self.config.partner_code.clone(),
            access_key: self.config.access_key.clone(),
            request_id,
            amount: amount_minor,
            order_id: txn_ref.to_string(),
            order_info: order_info.to_string(),
            redirect_url: self.config.redirect_url.clone(),
            ipn_url: self.config.ipn_url.clone(),
            extra_data: String::new(),
            request_type: REQUEST_TYPE.to_string(),
            signature,
            lang: "vi".to_string(),
        };

        let mut attempt = 0;
        let response = loop {
            let result = self
                .http
                .post(&self.config.endpoint)
                .timeout(REQUEST_TIMEOUT)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) => break response,
                Err(err) if attempt < CREATE_RETRIES && (err.is_timeout() || err.is_connect()) => {
                    attempt += 1;
                    tracing::warn!(error = %err, attempt, "transient MoMo create failure, retrying");
                    tokio::time::sleep(Duration::from_millis(300 * attempt as u64)).await;
                }
                Err(err) => {
                    return Err(AppError::UpstreamGateway(format!(
                        "MoMo unreachable: {err}"
                    )));
                }
            }
        };

        let parsed: CreateResponse = response
            .json()
            .await
            .map_err(|err| AppError::UpstreamGateway(format!("unexpected MoMo response: {err}")))?;

        if parsed.result_code != RESULT_SUCCESS {
            return Err(AppError::UpstreamGateway(format!(
                "MoMo declined create request: code {} ({})",
                parsed.result_code,
                parsed.message.unwrap_or_default()
            )));
        }

        parsed
            .pay_url
            .ok_or_else(|| AppError::UpstreamGateway("MoMo response missing payUrl".into()))
    }

    /// Recompute the notification signature over the raw sorted fields and
    /// compare with the supplied one.
    pub fn verify_ipn(&self, ipn: &MomoIpnRequest) -> bool {
        if ipn.signature.is_empty() {
            return false;
        }
        let raw = ipn_raw_input(&self.config.access_key, ipn);
        match hmac_sha256_hex(self.config.secret_key.as_bytes(), &raw) {
            Some(expected) => expected == ipn.signature,
            None => false,
        }
    }
}

/// Raw signature input for the create call: sorted `key=value` pairs with
/// verbatim values. The redirect URL is deliberately not part of the hash.
fn create_raw_input(
    config: &MomoConfig,
    request_id: &str,
    txn_ref: &str,
    amount_minor: i64,
    order_info: &str,
) -> String {
    let pairs = [
        ("accessKey", config.access_key.clone()),
        ("amount", amount_minor.to_string()),
        ("extraData", String::new()),
        ("ipnUrl", config.ipn_url.clone()),
        ("orderId", txn_ref.to_string()),
        ("orderInfo", order_info.to_string()),
        ("partnerCode", config.partner_code.clone()),
        ("requestId", request_id.to_string()),
        ("requestType", REQUEST_TYPE.to_string()),
    ];
    join_sorted(pairs)
}

/// Raw signature input for an inbound notification: every payload field
/// except the signature itself, plus the merchant access key.
fn ipn_raw_input(access_key: &str, ipn: &MomoIpnRequest) -> String {
    let pairs = [
        ("accessKey", access_key.to_string()),
        ("amount", ipn.amount.to_string()),
        ("extraData", ipn.extra_data.clone()),
        ("message", ipn.message.clone()),
        ("orderId", ipn.order_id.clone()),
        ("orderInfo", ipn.order_info.clone()),
        ("orderType", ipn.order_type.clone()),
        ("partnerCode", ipn.partner_code.clone()),
        ("payType", ipn.pay_type.clone()),
        ("requestId", ipn.request_id.clone()),
        ("responseTime", ipn.response_time.to_string()),
        ("resultCode", ipn.result_code.to_string()),
        ("transId", ipn.trans_id.to_string()),
    ];
    join_sorted(pairs)
}

fn join_sorted<const N: usize>(mut pairs: [(&str, String); N]) -> String {
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn hmac_sha256_hex(secret: &[u8], payload: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MomoConfig {
        MomoConfig {
            partner_code: "MOMOTEST".into(),
            access_key: "AK123".into(),
            secret_key: "SK456".into(),
            endpoint: "https://test-payment.momo.vn/v2/gateway/api/create".into(),
            redirect_url: "http://localhost:3000/api/payments/momo/return".into(),
            ipn_url: "http://localhost:3000/api/payments/momo/ipn".into(),
        }
    }

    fn ipn(signature: String) -> MomoIpnRequest {
        MomoIpnRequest {
            partner_code: "MOMOTEST".into(),
            order_id: "12_abcd".into(),
            request_id: "req-1".into(),
            amount: 5_000_000,
            order_info: "Order 12".into(),
            order_type: "momo_wallet".into(),
            trans_id: 99,
            result_code: 0,
            message: "Successful.".into(),
            pay_type: "qr".into(),
            response_time: 1_722_500_000_000,
            extra_data: String::new(),
            signature,
        }
    }

    #[test]
    fn create_input_is_sorted_and_excludes_redirect() {
        let raw = create_raw_input(&config(), "req-1", "12_abcd", 5_000_000, "Order 12");
        assert_eq!(
            raw,
            "accessKey=AK123&amount=5000000&extraData=&ipnUrl=http://localhost:3000/api/payments/momo/ipn&orderId=12_abcd&orderInfo=Order 12&partnerCode=MOMOTEST&requestId=req-1&requestType=captureWallet"
        );
        assert!(!raw.contains("redirectUrl"));
    }

    #[test]
    fn ipn_signature_round_trips() {
        let client = MomoClient::new(config());
        let unsigned = ipn(String::new());
        let raw = ipn_raw_input(&client.config.access_key, &unsigned);
        let signature = hmac_sha256_hex(client.config.secret_key.as_bytes(), &raw).unwrap();
        assert!(client.verify_ipn(&ipn(signature)));
    }

    #[test]
    fn tampered_ipn_field_fails_verification() {
        let client = MomoClient::new(config());
        let unsigned = ipn(String::new());
        let raw = ipn_raw_input(&client.config.access_key, &unsigned);
        let signature = hmac_sha256_hex(client.config.secret_key.as_bytes(), &raw).unwrap();
        let mut tampered = ipn(signature);
        tampered.amount += 1;
        assert!(!client.verify_ipn(&tampered));
    }

    #[test]
    fn empty_signature_is_rejected() {
        let client = MomoClient::new(config());
        assert!(!client.verify_ipn(&ipn(String::new())));
    }

    #[test]
    fn ipn_raw_input_orders_fields_alphabetically() {
        let raw = ipn_raw_input("AK123", &ipn("sig".into()));
        let keys: Vec<&str> = raw
            .split('&')
            .map(|pair| pair.split('=').next().unwrap())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
        assert!(!raw.contains("signature="));
    }
}
