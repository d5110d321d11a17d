use thiserror::Error;

pub type ProcessorResult<T> = Result<T, ProcessorError>;

/// Failure forwarding a payment to an external processor. All variants
/// are treated uniformly by the routing policy and the circuit breaker.
#[derive(Debug, Clone, Error)]
pub enum ProcessorError {
    #[error("processor returned error status: {status}")]
    ErrorStatus { status: u16 },

    #[error("processor request failed: {message}")]
    Transport { message: String },

    #[error("processor request timed out")]
    Timeout,
}

impl ProcessorError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProcessorError::Timeout
        } else {
            ProcessorError::Transport {
                message: err.to_string(),
            }
        }
    }
}
