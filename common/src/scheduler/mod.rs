// Scheduler module: due-monitor selection, single-flight tracking and the tick loop

pub mod due;
pub mod engine;
pub mod flight;

pub use due::{due_monitors, is_due, partition_by_interval};
pub use engine::{Scheduler, SchedulerConfig, SchedulerEngine, TickSummary};
pub use flight::{FlightGuard, InFlight};
