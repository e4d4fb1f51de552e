// Repository layer for database operations

pub mod monitor;
pub mod queries;

pub use monitor::PgMonitorStore;
