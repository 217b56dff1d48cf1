/// Mock payment gateway for tests
///
/// Returns deterministic intents without touching the network, or a
/// configurable failure to exercise the payment-setup error path.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use super::gateway::{PaymentError, PaymentGateway, PaymentIntent};

/// In-memory implementation of [`PaymentGateway`]
#[derive(Debug, Default)]
pub struct MockGateway {
    fail: bool,
    created: AtomicUsize,
}

impl MockGateway {
    /// A gateway whose intents always succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that simulates an unreachable processor
    pub fn unreachable() -> Self {
        Self {
            fail: true,
            created: AtomicUsize::new(0),
        }
    }

    /// Number of intents created so far
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        application_id: Uuid,
    ) -> Result<PaymentIntent, PaymentError> {
        if self.fail {
            return Err(PaymentError::Unreachable(
                "mock gateway configured to fail".to_string(),
            ));
        }

        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let short = application_id.simple().to_string();

        Ok(PaymentIntent {
            id: format!("pi_mock_{}_{}", &short[..8], n),
            client_secret: format!("pi_mock_{}_{}_secret", &short[..8], n),
            amount,
            currency: currency.to_string(),
        })
    }
}
