use crate::payments::error::{ProcessorError, ProcessorResult};
use crate::payments::processor::PaymentProcessor;
use crate::payments::types::Payment;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// HTTP client for one external payment processor.
pub struct HttpProcessorClient {
    client: Client,
    base_url: String,
}

impl HttpProcessorClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ProcessorResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProcessorError::Transport {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl PaymentProcessor for HttpProcessorClient {
    async fn process_payment(&self, payment: &Payment) -> ProcessorResult<()> {
        let response = self
            .client
            .post(self.endpoint("/payments"))
            .header("Content-Type", "application/json")
            .json(payment)
            .send()
            .await
            .map_err(ProcessorError::from_reqwest)?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(ProcessorError::ErrorStatus {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url_and_path() {
        let client = HttpProcessorClient::new("http://processor:8080/", Duration::from_secs(5))
            .expect("client should build");
        assert_eq!(client.endpoint("/payments"), "http://processor:8080/payments");
    }
}
