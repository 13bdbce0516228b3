//! Turn Timer
//!
//! One countdown per turn. The engine feeds it elapsed time; it reports
//! when to push the cosmetic remaining-time broadcast and, once, when the
//! turn has run out.

use std::time::Duration;

/// What happened during one `advance`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimerTick {
    /// Countdown reached zero on this advance.
    pub expired: bool,
    /// Remaining seconds to broadcast, if the broadcast cadence came due.
    pub broadcast: Option<f32>,
}

/// Per-turn countdown.
#[derive(Debug, Clone)]
pub struct TurnTimer {
    duration: Duration,
    remaining: Duration,
    running: bool,
    broadcast_interval: Duration,
    since_broadcast: Duration,
}

impl TurnTimer {
    /// Create a stopped timer.
    pub fn new(duration: Duration, broadcast_interval: Duration) -> Self {
        Self {
            duration,
            remaining: duration,
            running: false,
            broadcast_interval,
            since_broadcast: Duration::ZERO,
        }
    }

    /// Rewind to full duration and start counting.
    pub fn restart(&mut self) {
        self.remaining = self.duration;
        self.since_broadcast = Duration::ZERO;
        self.running = true;
    }

    /// Stop without expiring.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether the countdown is live.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Time left this turn.
    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Remaining time as wire seconds.
    pub fn remaining_secs(&self) -> f32 {
        self.remaining.as_secs_f32()
    }

    /// Count down by `elapsed`.
    ///
    /// Expiry is reported exactly once; the timer then stays stopped until
    /// the next `restart`.
    pub fn advance(&mut self, elapsed: Duration) -> TimerTick {
        let mut tick = TimerTick::default();
        if !self.running {
            return tick;
        }

        self.remaining = self.remaining.saturating_sub(elapsed);
        if self.remaining.is_zero() {
            self.running = false;
            tick.expired = true;
            return tick;
        }

        self.since_broadcast += elapsed;
        if self.since_broadcast >= self.broadcast_interval {
            self.since_broadcast = Duration::ZERO;
            tick.broadcast = Some(self.remaining_secs());
        }

        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer() -> TurnTimer {
        TurnTimer::new(Duration::from_secs(30), Duration::from_secs(1))
    }

    #[test]
    fn test_stopped_timer_does_nothing() {
        let mut t = timer();
        let tick = t.advance(Duration::from_secs(60));
        assert!(!tick.expired);
        assert!(tick.broadcast.is_none());
        assert_eq!(t.remaining(), Duration::from_secs(30));
    }

    #[test]
    fn test_broadcast_cadence() {
        let mut t = timer();
        t.restart();

        let mut broadcasts = 0;
        for _ in 0..20 {
            // 2 seconds in 100ms steps
            if t.advance(Duration::from_millis(100)).broadcast.is_some() {
                broadcasts += 1;
            }
        }
        assert_eq!(broadcasts, 2);
        assert_eq!(t.remaining(), Duration::from_secs(28));
    }

    #[test]
    fn test_expires_exactly_once() {
        let mut t = timer();
        t.restart();

        assert!(!t.advance(Duration::from_secs(29)).expired);
        assert!(t.advance(Duration::from_secs(2)).expired);
        assert!(!t.is_running());
        assert!(!t.advance(Duration::from_secs(2)).expired);

        t.restart();
        assert!(t.is_running());
        assert_eq!(t.remaining(), Duration::from_secs(30));
    }

    #[test]
    fn test_stop() {
        let mut t = timer();
        t.restart();
        t.stop();
        assert!(!t.advance(Duration::from_secs(31)).expired);
    }
}
