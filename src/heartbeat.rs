use std::cmp;
use std::time::Duration;

use instant::Instant;


pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(60);

// Pings go out at half the liveness timeout, so a healthy peer always gets at
// least one chance to answer before the deadline.
pub fn ping_interval(liveness_timeout: Duration) -> Duration { liveness_timeout / 2 }

#[must_use]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PassiveConnectionStatus {
    Healthy,
    // No successful read for half the timeout. Keep the channel open in case
    // the other party comes back.
    TemporaryLost,
    // No successful read for a full timeout window. Disconnect.
    PermanentlyLost,
}

impl PassiveConnectionStatus {
    pub fn is_healthy(self) -> bool { self == PassiveConnectionStatus::Healthy }
}

// Server-side monitor: answers pings, watches incoming traffic.
#[derive(Clone, Debug)]
pub struct PassiveConnectionMonitor {
    latest_incoming: Instant,
    timeout: Duration,
}

impl PassiveConnectionMonitor {
    pub fn new(now: Instant, timeout: Duration) -> Self {
        PassiveConnectionMonitor { latest_incoming: now, timeout }
    }

    pub fn latest_incoming(&self) -> Instant { self.latest_incoming }

    pub fn register_incoming(&mut self, now: Instant) {
        self.latest_incoming = cmp::max(self.latest_incoming, now);
    }

    pub fn status(&self, now: Instant) -> PassiveConnectionStatus {
        let silence = now.saturating_duration_since(self.latest_incoming);
        if silence >= self.timeout {
            PassiveConnectionStatus::PermanentlyLost
        } else if silence >= self.timeout / 2 {
            PassiveConnectionStatus::TemporaryLost
        } else {
            PassiveConnectionStatus::Healthy
        }
    }
}

#[must_use]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActiveConnectionStatus {
    Noop,
    // A ping must be sent now. The monitor assumes the caller sends it.
    SendPing,
}

// Client-side monitor: decides when the next heartbeat call goes out.
#[derive(Clone, Debug)]
pub struct ActiveConnectionMonitor {
    interval: Duration,
    latest_ping_sent: Option<Instant>,
}

impl ActiveConnectionMonitor {
    pub fn new(liveness_timeout: Duration) -> Self {
        ActiveConnectionMonitor { interval: ping_interval(liveness_timeout), latest_ping_sent: None }
    }

    pub fn update(&mut self, now: Instant) -> ActiveConnectionStatus {
        if let Some(latest) = self.latest_ping_sent {
            if now.saturating_duration_since(latest) < self.interval {
                return ActiveConnectionStatus::Noop;
            }
        }
        self.latest_ping_sent = Some(now);
        ActiveConnectionStatus::SendPing
    }

    pub fn next_ping_at(&self, now: Instant) -> Instant {
        match self.latest_ping_sent {
            Some(latest) => cmp::max(latest + self.interval, now),
            None => now,
        }
    }
}
