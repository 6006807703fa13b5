use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};

/// Events timers post back to the controller that armed them. `epoch` names
/// the timer generation, so events queued before a cancel can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    Tick { epoch: u64 },
    RevealElapsed { epoch: u64 },
}

/// Arms timers that deliver `RoundEvent`s.
pub trait Scheduler {
    fn every(&self, period: Duration, event: RoundEvent) -> TimerHandle;
    fn after(&self, delay: Duration, event: RoundEvent) -> TimerHandle;
}

/// Owned timer. Cancelled on `cancel()` or when dropped.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.fire();
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Scheduler backed by tokio tasks. Each timer is a spawned task pushing into
/// one channel; cancelling aborts the task.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    events: mpsc::UnboundedSender<RoundEvent>,
}

impl TokioScheduler {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RoundEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Self { events }, receiver)
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, event: RoundEvent) -> TimerHandle {
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            // First tick one period from now, not immediately
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if events.send(event).is_err() {
                    break;
                }
            }
        });
        TimerHandle::new(move || task.abort())
    }

    fn after(&self, delay: Duration, event: RoundEvent) -> TimerHandle {
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = events.send(event);
        });
        TimerHandle::new(move || task.abort())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn repeating_timer_ticks_once_per_period() {
        let (scheduler, mut events) = TokioScheduler::channel();
        let _timer = scheduler.every(Duration::from_secs(1), RoundEvent::Tick { epoch: 7 });

        let started = Instant::now();
        for _ in 0..3 {
            assert_eq!(events.recv().await, Some(RoundEvent::Tick { epoch: 7 }));
        }
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_timer_stops_ticking() {
        let (scheduler, mut events) = TokioScheduler::channel();
        let timer = scheduler.every(Duration::from_secs(1), RoundEvent::Tick { epoch: 1 });
        assert_eq!(events.recv().await, Some(RoundEvent::Tick { epoch: 1 }));

        drop(timer);
        time::sleep(Duration::from_secs(5)).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_fires_after_delay_unless_cancelled() {
        let (scheduler, mut events) = TokioScheduler::channel();

        let cancelled = scheduler.after(
            Duration::from_millis(500),
            RoundEvent::RevealElapsed { epoch: 1 },
        );
        cancelled.cancel();
        let _kept = scheduler.after(
            Duration::from_millis(500),
            RoundEvent::RevealElapsed { epoch: 2 },
        );

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            events.try_recv().ok(),
            Some(RoundEvent::RevealElapsed { epoch: 2 })
        );
        assert!(events.try_recv().is_err());
    }
}
