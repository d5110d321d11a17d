use crate::payments::error::ProcessorResult;
use crate::payments::types::Payment;
use async_trait::async_trait;

/// Port to one external payment processor. Implementations are stateless;
/// one instance exists per external base URL.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn process_payment(&self, payment: &Payment) -> ProcessorResult<()>;
}
