use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::json;
use sha2::Sha256;

pub struct RazorpayService;

impl RazorpayService {
    fn key_id() -> Result<String, String> {
        crate::config::Config::razorpay_key_id().ok_or_else(|| "Missing Razorpay key id".to_string())
    }

    fn key_secret() -> Result<String, String> {
        crate::config::Config::razorpay_key_secret()
            .ok_or_else(|| "Missing Razorpay key secret".to_string())
    }

    /// Opens a gateway order. `amount_paise` is the rupee amount x 100.
    pub async fn create_order(amount_paise: i64, receipt: &str) -> Result<serde_json::Value, String> {
        let client = Client::new();

        let res = client
            .post("https://api.razorpay.com/v1/orders")
            .basic_auth(Self::key_id()?, Some(Self::key_secret()?))
            .json(&json!({
                "amount": amount_paise,
                "currency": "INR",
                "receipt": receipt,
                "payment_capture": 1
            }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        Ok(res.json().await.map_err(|e| e.to_string())?)
    }

    /// Checks the gateway callback signature: hex HMAC-SHA256 over
    /// `"{order_id}|{payment_id}"` with the key secret.
    pub fn verify_signature(order_id: &str, payment_id: &str, signature: &str, secret: &str) -> bool {
        let payload = format!("{}|{}", order_id, payment_id);

        let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(payload.as_bytes());
        let expected_signature = hex::encode(mac.finalize().into_bytes());

        expected_signature == signature
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(order_id: &str, payment_id: &str, secret: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_accepted() {
        let signature = sign("order_123", "pay_456", "shhh");
        assert!(RazorpayService::verify_signature(
            "order_123", "pay_456", &signature, "shhh"
        ));
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let signature = sign("order_123", "pay_456", "shhh");
        assert!(!RazorpayService::verify_signature(
            "order_123", "pay_999", &signature, "shhh"
        ));
        assert!(!RazorpayService::verify_signature(
            "order_123", "pay_456", &signature, "other-secret"
        ));
        assert!(!RazorpayService::verify_signature(
            "order_123", "pay_456", "deadbeef", "shhh"
        ));
    }
}
