// Application Layer - Use Cases and Business Logic

pub mod overdue;
pub mod reconcile;
pub mod retry;
pub mod sync_service;
pub mod tracker;
pub mod watchdog;
pub mod worker;

// Re-exports
pub use overdue::{evaluate as evaluate_overdue, OverdueEvaluator, OverdueReport, OverdueSummary};
pub use reconcile::{reconcile, reconcile_with, KeylessPolicy, ReconcileOptions};
pub use retry::{AttemptFailure, RetryPolicy};
pub use sync_service::{Pipeline, PipelineConfig, SyncService};
pub use tracker::JobTracker;
pub use watchdog::Watchdog;
pub use worker::{shutdown_channel, PipelineDeps, ShutdownSender, ShutdownToken, SyncWorker};
