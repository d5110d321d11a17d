pub mod dispatch_pool;

pub use dispatch_pool::{DispatchWorkerPool, WorkerPoolConfig};
