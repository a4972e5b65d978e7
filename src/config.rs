use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub vnpay: VnpayConfig,
    pub momo: MomoConfig,
    pub frontend: FrontendUrls,
}

/// VNPay merchant credentials and endpoints.
#[derive(Debug, Clone)]
pub struct VnpayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub endpoint: String,
    pub return_url: String,
}

/// MoMo merchant credentials and endpoints.
#[derive(Debug, Clone)]
pub struct MomoConfig {
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub redirect_url: String,
    pub ipn_url: String,
}

/// Browser destinations after a payment return. Informational pages only.
#[derive(Debug, Clone)]
pub struct FrontendUrls {
    pub payment_success: String,
    pub payment_failure: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);

        let vnpay = VnpayConfig {
            tmn_code: env::var("VNPAY_TMN_CODE")?,
            hash_secret: env::var("VNPAY_HASH_SECRET")?,
            endpoint: env::var("VNPAY_ENDPOINT").unwrap_or_else(|_| {
                "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string()
            }),
            return_url: env::var("VNPAY_RETURN_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000/api/payments/vnpay/return".to_string()),
        };

        let momo = MomoConfig {
            partner_code: env::var("MOMO_PARTNER_CODE")?,
            access_key: env::var("MOMO_ACCESS_KEY")?,
            secret_key: env::var("MOMO_SECRET_KEY")?,
            endpoint: env::var("MOMO_ENDPOINT").unwrap_or_else(|_| {
                "https://test-payment.momo.vn/v2/gateway/api/create".to_string()
            }),
            redirect_url: env::var("MOMO_REDIRECT_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000/api/payments/momo/return".to_string()),
            ipn_url: env::var("MOMO_IPN_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000/api/payments/momo/ipn".to_string()),
        };

        let frontend = FrontendUrls {
            payment_success: env::var("FRONTEND_PAYMENT_SUCCESS_URL")
                .unwrap_or_else(|_| "http://localhost:3001/payment/success".to_string()),
            payment_failure: env::var("FRONTEND_PAYMENT_FAILURE_URL")
                .unwrap_or_else(|_| "http://localhost:3001/payment/failure".to_string()),
        };

        Ok(Self {
            database_url,
            host,
            port,
            vnpay,
            momo,
            frontend,
        })
    }
}
