use crate::error::ClaimError;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Time source for every wait in the engine.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;

    async fn sleep(&self, duration: Duration);
}

pub struct TokioClock {
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            started: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Initial delay before the first probe.
    pub settle: Duration,
    pub interval: Duration,
    /// Total budget measured from the start of the settle delay.
    pub timeout: Duration,
}

/// Inclusive range a randomized pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl DelayRange {
    pub const ZERO: Self = Self {
        min_secs: 0,
        max_secs: 0,
    };

    pub fn secs(min_secs: u64, max_secs: u64) -> Self {
        Self { min_secs, max_secs }
    }

    pub fn pick(&self) -> Duration {
        let (low, high) = if self.min_secs <= self.max_secs {
            (self.min_secs, self.max_secs)
        } else {
            (self.max_secs, self.min_secs)
        };
        if low == high {
            return Duration::from_secs(low);
        }
        Duration::from_secs(rand::thread_rng().gen_range(low..=high))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum WaitError<E> {
    Timeout { waited: Duration },
    Cancelled,
    Probe(E),
}

/// Cancellable sleeping and polling over an injectable clock.
#[derive(Clone)]
pub struct Waiter {
    clock: Arc<dyn Clock>,
    shutdown: watch::Receiver<bool>,
}

impl Waiter {
    pub fn new(clock: Arc<dyn Clock>, shutdown: watch::Receiver<bool>) -> Self {
        Self { clock, shutdown }
    }

    pub fn tokio(shutdown: watch::Receiver<bool>) -> Self {
        Self::new(Arc::new(TokioClock::new()), shutdown)
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub async fn sleep(&self, duration: Duration) -> Result<(), ClaimError> {
        if self.is_cancelled() {
            return Err(ClaimError::Cancelled);
        }
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = cancelled(self.shutdown.clone()) => Err(ClaimError::Cancelled),
            _ = self.clock.sleep(duration) => Ok(()),
        }
    }

    pub async fn delay(&self, range: DelayRange) -> Result<(), ClaimError> {
        self.sleep(range.pick()).await
    }

    /// Run `probe` until it yields a value, the budget runs out or shutdown is
    /// signalled. A probe error ends polling immediately.
    pub async fn poll<T, E, F, Fut>(
        &self,
        schedule: &PollSchedule,
        mut probe: F,
    ) -> Result<T, WaitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let started = self.clock.now();
        self.sleep(schedule.settle)
            .await
            .map_err(|_| WaitError::Cancelled)?;

        loop {
            if let Some(value) = probe().await.map_err(WaitError::Probe)? {
                return Ok(value);
            }
            let waited = self.clock.now().saturating_sub(started);
            if waited >= schedule.timeout {
                return Err(WaitError::Timeout { waited });
            }
            self.sleep(schedule.interval)
                .await
                .map_err(|_| WaitError::Cancelled)?;
        }
    }
}

async fn cancelled(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        // sender gone, nobody can cancel any more
        std::future::pending::<()>().await;
    }
}

/// Virtual clock whose sleeps complete at once and advance the reading.
#[cfg(test)]
#[derive(Default)]
pub struct ManualClock {
    elapsed: std::sync::Mutex<Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
    }
}

#[cfg(test)]
#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
impl Waiter {
    pub fn manual() -> (Self, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let (_tx, rx) = watch::channel(false);
        (Self::new(clock.clone(), rx), clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn schedule() -> PollSchedule {
        PollSchedule {
            settle: Duration::from_secs(10),
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(1200),
        }
    }

    #[tokio::test]
    async fn value_after_three_empty_probes() {
        let (waiter, clock) = Waiter::manual();
        let calls = AtomicUsize::new(0);
        let result: Result<u32, WaitError<()>> = waiter
            .poll(&schedule(), || {
                let seen = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(if seen < 3 { None } else { Some(7) }) }
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(clock.now(), Duration::from_secs(10 + 3 * 10));
    }

    #[tokio::test]
    async fn budget_exhaustion_reports_timeout() {
        let (waiter, _clock) = Waiter::manual();
        let schedule = PollSchedule {
            timeout: Duration::from_secs(30),
            ..schedule()
        };
        let result: Result<(), WaitError<()>> =
            waiter.poll(&schedule, || async { Ok(None) }).await;
        assert_eq!(
            result,
            Err(WaitError::Timeout {
                waited: Duration::from_secs(30)
            })
        );
    }

    #[tokio::test]
    async fn probe_error_stops_polling() {
        let (waiter, clock) = Waiter::manual();
        let result: Result<(), WaitError<&str>> =
            waiter.poll(&schedule(), || async { Err("down") }).await;
        assert_eq!(result, Err(WaitError::Probe("down")));
        assert_eq!(clock.now(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_sleep() {
        let (tx, rx) = watch::channel(false);
        let waiter = Waiter::tokio(rx);
        let sleeping = tokio::spawn({
            let waiter = waiter.clone();
            async move { waiter.sleep(Duration::from_secs(3600)).await }
        });
        tx.send(true).unwrap();
        let result = sleeping.await.unwrap();
        assert!(matches!(result, Err(ClaimError::Cancelled)));
        assert!(matches!(
            waiter.sleep(Duration::from_secs(1)).await,
            Err(ClaimError::Cancelled)
        ));
    }

    #[test]
    fn delay_range_stays_in_bounds() {
        let range = DelayRange::secs(2, 5);
        for _ in 0..50 {
            let picked = range.pick();
            assert!(picked >= Duration::from_secs(2) && picked <= Duration::from_secs(5));
        }
        assert_eq!(DelayRange::ZERO.pick(), Duration::ZERO);
        let inverted = DelayRange::secs(4, 1).pick();
        assert!(inverted >= Duration::from_secs(1) && inverted <= Duration::from_secs(4));
    }
}
