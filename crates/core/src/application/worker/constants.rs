// Pipeline constants (no magic values)
use std::time::Duration;

/// Jobs accepted at once, queued plus in-flight (10)
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Attempts per store mutation before the item is recorded as failed (3)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay after the first failed attempt (200ms)
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Upper bound for a single backoff sleep (5s)
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// A job with no progress update for this long is timed out (10 minutes)
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(600);

/// A session with no client activity for this long is closed (15 minutes)
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(900);

/// How often the watchdog scans the job tracker (15s)
pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(15);

/// Finished snapshots stay pollable for this long (1 hour)
pub const FINISHED_SNAPSHOT_RETENTION: Duration = Duration::from_secs(3600);
