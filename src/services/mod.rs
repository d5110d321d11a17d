pub mod audit;
pub mod dispatch;
pub mod intake;

pub use audit::AuditService;
pub use dispatch::{DispatchError, PaymentDispatcher};
pub use intake::{IntakeError, IntakeService};
