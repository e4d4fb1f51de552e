// Train availability monitoring: store, change detection, scheduling and notification

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod detector;
pub mod errors;
pub mod messaging;
pub mod models;
pub mod notifier;
pub mod reaper;
pub mod scheduler;
pub mod source;
pub mod stations;
pub mod subscription;
pub mod telemetry;
