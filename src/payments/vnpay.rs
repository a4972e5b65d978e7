use std::collections::{BTreeMap, HashMap};

use hmac::{Hmac, Mac};
use sha2::Sha512;
use url::form_urlencoded;

use crate::config::VnpayConfig;

type HmacSha512 = Hmac<Sha512>;

pub const HASH_PARAM: &str = "vnp_SecureHash";
pub const HASH_TYPE_PARAM: &str = "vnp_SecureHashType";
pub const RESPONSE_CODE_PARAM: &str = "vnp_ResponseCode";
pub const TXN_REF_PARAM: &str = "vnp_TxnRef";
pub const AMOUNT_PARAM: &str = "vnp_Amount";

/// The gateway's success sentinel for `vnp_ResponseCode`.
pub const RESPONSE_SUCCESS: &str = "00";

/// Builds signed redirect URLs and verifies inbound notification
/// signatures for the VNPay gateway.
#[derive(Debug, Clone)]
pub struct VnpayClient {
    config: VnpayConfig,
}

impl VnpayClient {
    pub fn new(config: VnpayConfig) -> Self {
        Self { config }
    }

    /// Signed payment URL for a pending order. `amount_minor` is the order
    /// total in minor units; `create_date` is the gateway's local
    /// `YYYYmmddHHMMSS` timestamp.
    pub fn payment_url(
        &self,
        txn_ref: &str,
        amount_minor: i64,
        order_info: &str,
        client_ip: &str,
        create_date: &str,
    ) -> Option<String> {
        let mut params: BTreeMap<String, String> = BTreeMap::new();
        params.insert("vnp_Version".into(), "2.1.0".into());
        params.insert("vnp_Command".into(), "pay".into());
        params.insert("vnp_TmnCode".into(), self.config.tmn_code.clone());
        params.insert(AMOUNT_PARAM.into(), amount_minor.to_string());
        params.insert("vnp_CurrCode".into(), "VND".into());
        params.insert(TXN_REF_PARAM.into(), txn_ref.into());
        params.insert("vnp_OrderInfo".into(), order_info.into());
        params.insert("vnp_OrderType".into(), "other".into());
        params.insert("vnp_Locale".into(), "vn".into());
        params.insert("vnp_ReturnUrl".into(), self.config.return_url.clone());
        params.insert("vnp_IpAddr".into(), client_ip.into());
        params.insert("vnp_CreateDate".into(), create_date.into());

        let query = canonical_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let secure_hash = hmac_sha512_hex(self.config.hash_secret.as_bytes(), &query)?;
        Some(format!(
            "{}?{}&{}={}",
            self.config.endpoint, query, HASH_PARAM, secure_hash
        ))
    }

    /// Recompute the signature over everything except the hash fields and
    /// compare with the supplied `vnp_SecureHash`. A missing or mismatched
    /// hash is an invalid notification, never an error.
    pub fn verify(&self, params: &HashMap<String, String>) -> bool {
        let provided = match params.get(HASH_PARAM) {
            Some(hash) if !hash.is_empty() => hash,
            _ => return false,
        };

        let filtered: BTreeMap<&str, &str> = params
            .iter()
            .filter(|(key, _)| key.as_str() != HASH_PARAM && key.as_str() != HASH_TYPE_PARAM)
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        let query = canonical_query(filtered.into_iter());

        match hmac_sha512_hex(self.config.hash_secret.as_bytes(), &query) {
            Some(expected) => expected == *provided,
            None => false,
        }
    }
}

/// Sorted `key=encoded(value)` pairs joined by `&`. Values are
/// form-encoded (space becomes `+`) and keys are written verbatim, which
/// is the canonical string the gateway hashes on its side.
fn canonical_query<'a>(sorted_pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    sorted_pairs
        .map(|(key, value)| {
            let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
            format!("{key}={encoded}")
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn hmac_sha512_hex(secret: &[u8], payload: &str) -> Option<String> {
    let mut mac = HmacSha512::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> VnpayClient {
        VnpayClient::new(VnpayConfig {
            tmn_code: "TESTCODE".into(),
            hash_secret: "SECRETSECRETSECRET".into(),
            endpoint: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".into(),
            return_url: "http://localhost:3000/api/payments/vnpay/return".into(),
        })
    }

    fn params_from_url(url: &str) -> HashMap<String, String> {
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or_default();
        form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn canonical_query_is_sorted_and_form_encoded() {
        let pairs = [("vnp_OrderInfo", "Thanh toan don 12"), ("vnp_Amount", "5000000")];
        let sorted: BTreeMap<&str, &str> = pairs.into_iter().collect();
        let query = canonical_query(sorted.into_iter());
        assert_eq!(query, "vnp_Amount=5000000&vnp_OrderInfo=Thanh+toan+don+12");
    }

    #[test]
    fn payment_url_signature_verifies() {
        let client = client();
        let url = client
            .payment_url("12_abcd", 5_000_000, "Order 12", "127.0.0.1", "20250801120000")
            .unwrap();
        let params = params_from_url(&url);
        assert_eq!(params.get("vnp_Amount").map(String::as_str), Some("5000000"));
        assert!(client.verify(&params));
    }

    #[test]
    fn tampered_field_fails_verification() {
        let client = client();
        let url = client
            .payment_url("12_abcd", 5_000_000, "Order 12", "127.0.0.1", "20250801120000")
            .unwrap();
        let mut params = params_from_url(&url);
        params.insert("vnp_Amount".into(), "5000001".into());
        assert!(!client.verify(&params));
    }

    #[test]
    fn missing_hash_fails_verification() {
        let client = client();
        let url = client
            .payment_url("12_abcd", 5_000_000, "Order 12", "127.0.0.1", "20250801120000")
            .unwrap();
        let mut params = params_from_url(&url);
        params.remove(HASH_PARAM);
        assert!(!client.verify(&params));
    }

    #[test]
    fn hash_type_param_is_ignored_when_verifying() {
        let client = client();
        let url = client
            .payment_url("12_abcd", 5_000_000, "Order 12", "127.0.0.1", "20250801120000")
            .unwrap();
        let mut params = params_from_url(&url);
        params.insert(HASH_TYPE_PARAM.into(), "HmacSHA512".into());
        assert!(client.verify(&params));
    }
}
