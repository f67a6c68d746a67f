//! Concurrency and politeness limits for network fetches.
//!
//! Two independent semaphores gate every cache miss. The concurrency
//! semaphore bounds simultaneous requests. The politeness semaphore is a
//! smaller pool whose tokens are held across a randomized post-request
//! delay, which bounds the request rate seen by the site. Every wait
//! races the shared [`CancellationToken`], so a shutdown is never stuck
//! behind a sleeping token.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng as _;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Shared limiter state for one crawl.
#[derive(Debug, Clone)]
pub struct Scheduler {
    concurrency: Arc<Semaphore>,
    politeness: Arc<Semaphore>,
    delay_min: Duration,
    delay_max: Duration,
    cancel: CancellationToken,
}

/// Held concurrency slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct ConcurrencySlot {
    _permit: OwnedSemaphorePermit,
}

/// Held politeness token. Must be returned with [`PolitenessToken::release`]
/// after the request so the delay is observed.
#[derive(Debug)]
#[must_use = "dropping a token skips the politeness delay"]
pub struct PolitenessToken {
    permit: OwnedSemaphorePermit,
    delay: Duration,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Creates a scheduler with `concurrency` request slots and
    /// `politeness` tokens, each token held for a random delay in
    /// `delay_min..=delay_max` after its request.
    #[must_use]
    pub fn new(
        concurrency: usize,
        politeness: usize,
        (delay_min, delay_max): (Duration, Duration),
        cancel: CancellationToken,
    ) -> Self {
        Self {
            concurrency: Arc::new(Semaphore::new(concurrency)),
            politeness: Arc::new(Semaphore::new(politeness)),
            delay_min,
            delay_max: delay_max.max(delay_min),
            cancel,
        }
    }

    /// The run's cancellation token.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits for a concurrency slot.
    ///
    /// Returns `None` if the run is cancelled first. Cancellation is
    /// checked before the semaphore, so no slot is handed out after
    /// shutdown was requested.
    pub async fn acquire_slot(&self) -> Option<ConcurrencySlot> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            permit = Arc::clone(&self.concurrency).acquire_owned() => {
                permit.ok().map(|permit| ConcurrencySlot { _permit: permit })
            }
        }
    }

    /// Waits for a politeness token.
    ///
    /// Returns `None` if the run is cancelled first.
    pub async fn acquire_token(&self) -> Option<PolitenessToken> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            permit = Arc::clone(&self.politeness).acquire_owned() => {
                permit.ok().map(|permit| PolitenessToken {
                    permit,
                    delay: self.next_delay(),
                    cancel: self.cancel.clone(),
                })
            }
        }
    }

    /// Number of politeness tokens currently available.
    #[must_use]
    pub fn available_tokens(&self) -> usize {
        self.politeness.available_permits()
    }

    /// Number of concurrency slots currently available.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.concurrency.available_permits()
    }

    fn next_delay(&self) -> Duration {
        if self.delay_min == self.delay_max {
            return self.delay_min;
        }
        rand::rng().random_range(self.delay_min..=self.delay_max)
    }
}

impl PolitenessToken {
    /// Delay this token will be held for after its request.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleeps out the politeness delay and returns the token to the pool.
    ///
    /// Returns `false` if the sleep was cut short by cancellation.
    pub async fn release(self) -> bool {
        let completed = tokio::select! {
            () = tokio::time::sleep(self.delay) => true,
            () = self.cancel.cancelled() => false,
        };
        drop(self.permit);
        completed
    }
}
