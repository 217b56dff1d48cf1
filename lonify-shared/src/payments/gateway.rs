/// Payment gateway contract
///
/// All processor interaction goes through the [`PaymentGateway`] trait so
/// the API server can run against [`crate::payments::MockGateway`] in tests
/// and [`crate::payments::StripeGateway`] in production.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed application fee, in minor currency units (ten currency units)
pub const APPLICATION_FEE_CENTS: i64 = 1000;

/// Currency the application fee is charged in
pub const FEE_CURRENCY: &str = "usd";

/// A payment intent created at the processor
///
/// The `client_secret` is opaque to this system; it is handed to the
/// processor's client library for card confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Processor-side intent id (becomes the transaction id once charged)
    pub id: String,

    /// Opaque secret the client confirms the payment with
    pub client_secret: String,

    /// Amount in minor units
    pub amount: i64,

    /// ISO currency code
    pub currency: String,
}

/// Errors from the payment processor boundary
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Processor or network unreachable
    #[error("payment processor unreachable: {0}")]
    Unreachable(String),

    /// Processor reached but refused the request
    #[error("payment setup rejected: {0}")]
    Rejected(String),
}

/// Creates payment intents for application fees
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates an intent for `amount` minor units, tagged with the
    /// application it pays for
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        application_id: Uuid,
    ) -> Result<PaymentIntent, PaymentError>;
}
