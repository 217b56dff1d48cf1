/// Stripe payment gateway
///
/// Creates payment intents through Stripe's REST API. Only intent creation
/// lives server-side; card confirmation is delegated to Stripe's client
/// library and never retried from here.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::gateway::{PaymentError, PaymentGateway, PaymentIntent};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe-backed implementation of [`PaymentGateway`]
pub struct StripeGateway {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

/// Subset of Stripe's payment-intent response we consume
#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    client_secret: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    /// Creates a gateway against the live Stripe API
    pub fn new(secret_key: String) -> Self {
        Self::with_api_base(secret_key, STRIPE_API_BASE.to_string())
    }

    /// Creates a gateway against a custom API base (stripe-mock, test rigs)
    pub fn with_api_base(secret_key: String, api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            api_base,
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        application_id: Uuid,
    ) -> Result<PaymentIntent, PaymentError> {
        let url = format!("{}/payment_intents", self.api_base);

        let params = [
            ("amount", amount.to_string()),
            ("currency", currency.to_string()),
            ("metadata[application_id]", application_id.to_string()),
        ];

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("HTTP {}", status));

            tracing::warn!(%status, application_id = %application_id, "Payment intent creation rejected");
            return Err(PaymentError::Rejected(message));
        }

        let intent: StripeIntent = response
            .json()
            .await
            .map_err(|e| PaymentError::Rejected(format!("malformed response: {}", e)))?;

        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
            amount: intent.amount,
            currency: intent.currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_uses_live_api_by_default() {
        let gateway = StripeGateway::new("sk_test_123".to_string());
        assert_eq!(gateway.api_base, STRIPE_API_BASE);
    }

    #[test]
    fn test_gateway_api_base_override() {
        let gateway =
            StripeGateway::with_api_base("sk_test_123".to_string(), "http://localhost:12111/v1".to_string());
        assert!(gateway.api_base.starts_with("http://localhost"));
    }
}
