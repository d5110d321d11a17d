pub mod breaker;
pub mod client;
pub mod error;
pub mod processor;
pub mod types;
