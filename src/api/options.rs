use crate::dispatcher::DispatcherOptions;
use crate::execution::ExecutionOptions;
use crate::throttler::DEFAULT_MAX_ACTIVE_BACKFILLS;
use std::convert::TryFrom;
use tokio::time::Duration;

#[derive(Clone, Default)]
pub struct ReplicationOptions {
    /// Backfills allowed to copy data at the same time.
    pub max_active_backfills: Option<usize>,
    /// Writes in flight to one replica at a time.
    pub dispatchee_write_concurrency: Option<usize>,
    /// Writes queued for one replica before it is evicted.
    pub dispatchee_queue_capacity: Option<usize>,
    pub failover_timeout: Option<Duration>,
    pub backfill_chunk_size: Option<usize>,
    pub sync_retry_interval: Option<Duration>,
    pub registration_check_interval: Option<Duration>,
    /// Backfill priority of this server before the hand-over and voter bonuses.
    pub backfill_priority: Option<f64>,
}

#[derive(Copy, Clone, Debug)]
pub(super) struct ReplicationOptionsValidated {
    pub max_active_backfills: usize,
    pub dispatchee_write_concurrency: usize,
    pub dispatchee_queue_capacity: usize,
    pub failover_timeout: Duration,
    pub backfill_chunk_size: usize,
    pub sync_retry_interval: Duration,
    pub registration_check_interval: Duration,
    pub backfill_priority: f64,
}

impl ReplicationOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.max_active_backfills == 0 {
            return Err("At least one backfill must be allowed to run");
        }
        if self.dispatchee_write_concurrency == 0 {
            return Err("Replicas must accept at least one write at a time");
        }
        if self.dispatchee_queue_capacity < self.dispatchee_write_concurrency {
            return Err("Replica queue capacity must be at least the write concurrency");
        }
        if self.backfill_chunk_size == 0 {
            return Err("Backfill chunks must hold at least one key");
        }
        if self.sync_retry_interval == Duration::from_millis(0) {
            return Err("Sync retry interval must be positive");
        }
        if self.registration_check_interval == Duration::from_millis(0) {
            return Err("Registration check interval must be positive");
        }
        if !self.backfill_priority.is_finite() {
            return Err("Backfill priority must be a finite number");
        }

        Ok(())
    }

    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            dispatcher: DispatcherOptions {
                write_concurrency: self.dispatchee_write_concurrency,
                queue_capacity: self.dispatchee_queue_capacity,
            },
            failover_timeout: self.failover_timeout,
            backfill_chunk_size: self.backfill_chunk_size,
            sync_retry_interval: self.sync_retry_interval,
            registration_check_interval: self.registration_check_interval,
        }
    }
}

impl TryFrom<ReplicationOptions> for ReplicationOptionsValidated {
    type Error = &'static str;

    fn try_from(options: ReplicationOptions) -> Result<Self, Self::Error> {
        let values = ReplicationOptionsValidated {
            max_active_backfills: options
                .max_active_backfills
                .unwrap_or(DEFAULT_MAX_ACTIVE_BACKFILLS),
            dispatchee_write_concurrency: options.dispatchee_write_concurrency.unwrap_or(4),
            dispatchee_queue_capacity: options.dispatchee_queue_capacity.unwrap_or(10_000),
            failover_timeout: options.failover_timeout.unwrap_or(Duration::from_secs(5)),
            backfill_chunk_size: options.backfill_chunk_size.unwrap_or(1000),
            sync_retry_interval: options.sync_retry_interval.unwrap_or(Duration::from_millis(200)),
            registration_check_interval: options
                .registration_check_interval
                .unwrap_or(Duration::from_secs(1)),
            backfill_priority: options.backfill_priority.unwrap_or(0.0),
        };

        values.validate()?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = ReplicationOptionsValidated::try_from(ReplicationOptions::default()).unwrap();

        assert_eq!(options.max_active_backfills, 8);
        assert_eq!(options.execution_options().dispatcher.queue_capacity, 10_000);
        assert_eq!(options.failover_timeout, Duration::from_secs(5));
    }

    #[test]
    fn queue_smaller_than_concurrency_is_rejected() {
        let options = ReplicationOptions {
            dispatchee_write_concurrency: Some(16),
            dispatchee_queue_capacity: Some(8),
            ..Default::default()
        };

        assert!(ReplicationOptionsValidated::try_from(options).is_err());
    }
}
