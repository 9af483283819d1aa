pub mod ai;
pub mod api;
pub mod attention;
pub mod billing;
pub mod config;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod migrator;
pub mod notifications;
pub mod pipeline;
pub mod provider;
pub mod queue;
pub mod sync_cursors;
pub mod telemetry;
pub mod worker;

pub use redis;
pub use sea_orm;
