//! Application-fee payment gateway.
//!
//! Card confirmation happens in the processor's own client library; this
//! module only creates payment intents server-side and defines the gateway
//! seam the API server depends on.

pub mod gateway;
pub mod mock;
pub mod stripe;

pub use gateway::{PaymentError, PaymentGateway, PaymentIntent, APPLICATION_FEE_CENTS, FEE_CURRENCY};
pub use mock::MockGateway;
pub use stripe::StripeGateway;
