mod preempt_signal;
mod throttler;

pub use throttler::BackfillLock;
pub use throttler::BackfillThrottler;
pub use throttler::ThrottlerError;
pub use throttler::DEFAULT_MAX_ACTIVE_BACKFILLS;
