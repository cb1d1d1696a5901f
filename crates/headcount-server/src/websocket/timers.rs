//! Handshake deadline and heartbeat check owned by one session.

use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

/// Which timer fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    /// The one-shot handshake deadline elapsed.
    HandshakeExpired,
    /// A periodic liveness check is due.
    HeartbeatCheck,
}

/// The timer set of one session.
///
/// Both timers start at construction. The handshake deadline fires at most
/// once; the heartbeat check first fires one full period after creation.
/// Once [`cancel`](Self::cancel) is called no further events are produced.
pub struct SessionTimers {
    handshake: Option<Pin<Box<Sleep>>>,
    heartbeat: Option<Interval>,
}

impl SessionTimers {
    /// Arm both timers.
    pub fn arm(handshake_timeout: Duration, heartbeat_interval: Duration) -> Self {
        let mut heartbeat = time::interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            handshake: Some(Box::pin(time::sleep(handshake_timeout))),
            heartbeat: Some(heartbeat),
        }
    }

    /// Wait for the next timer event. Cancel-safe.
    ///
    /// Pends forever once every timer is disarmed.
    pub async fn next(&mut self) -> TimerEvent {
        let Self { handshake, heartbeat } = self;
        let event = tokio::select! {
            () = wait_deadline(handshake) => TimerEvent::HandshakeExpired,
            () = wait_tick(heartbeat) => TimerEvent::HeartbeatCheck,
        };
        if event == TimerEvent::HandshakeExpired {
            self.handshake = None;
        }
        event
    }

    /// Stop the handshake deadline, leaving the heartbeat running.
    pub fn disarm_handshake(&mut self) {
        self.handshake = None;
    }

    #[cfg(test)]
    fn handshake_armed(&self) -> bool {
        self.handshake.is_some()
    }

    /// Stop every timer.
    pub fn cancel(&mut self) {
        self.handshake = None;
        self.heartbeat = None;
    }

    #[cfg(test)]
    fn is_cancelled(&self) -> bool {
        self.handshake.is_none() && self.heartbeat.is_none()
    }
}

async fn wait_deadline(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}

async fn wait_tick(interval: &mut Option<Interval>) {
    match interval.as_mut() {
        Some(interval) => {
            let _ = interval.tick().await;
        }
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn handshake_fires_before_first_check() {
        let mut timers = SessionTimers::arm(Duration::from_secs(10), Duration::from_secs(30));
        let start = Instant::now();
        assert_eq!(timers.next().await, TimerEvent::HandshakeExpired);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert!(!timers.handshake_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn handshake_fires_once() {
        let mut timers = SessionTimers::arm(Duration::from_secs(10), Duration::from_secs(30));
        assert_eq!(timers.next().await, TimerEvent::HandshakeExpired);
        let start = Instant::now();
        assert_eq!(timers.next().await, TimerEvent::HeartbeatCheck);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
        assert_eq!(timers.next().await, TimerEvent::HeartbeatCheck);
        assert_eq!(start.elapsed(), Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_does_not_tick_immediately() {
        let mut timers = SessionTimers::arm(Duration::from_secs(100), Duration::from_secs(30));
        let start = Instant::now();
        assert_eq!(timers.next().await, TimerEvent::HeartbeatCheck);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_handshake_never_fires() {
        let mut timers = SessionTimers::arm(Duration::from_secs(10), Duration::from_secs(30));
        timers.disarm_handshake();
        let start = Instant::now();
        assert_eq!(timers.next().await, TimerEvent::HeartbeatCheck);
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timers_pend_forever() {
        let mut timers = SessionTimers::arm(Duration::from_millis(10), Duration::from_millis(10));
        timers.cancel();
        assert!(timers.is_cancelled());
        let waited = time::timeout(Duration::from_secs(3600), timers.next()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn next_is_cancel_safe() {
        let mut timers = SessionTimers::arm(Duration::from_secs(10), Duration::from_secs(30));
        let start = Instant::now();
        assert!(time::timeout(Duration::from_secs(4), timers.next()).await.is_err());
        assert_eq!(timers.next().await, TimerEvent::HandshakeExpired);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }
}
