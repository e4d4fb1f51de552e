// Database layer module

pub mod memory;
pub mod pool;
pub mod repositories;
pub mod store;

pub use memory::InMemoryMonitorStore;
pub use pool::DbPool;
pub use repositories::PgMonitorStore;
pub use store::MonitorStore;
