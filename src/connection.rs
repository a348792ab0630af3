use std::sync::mpsc;
use std::time::Duration;

use instant::Instant;

use crate::event::ServerMessage;
use crate::heartbeat::{PassiveConnectionMonitor, PassiveConnectionStatus};


// Which dispatcher currently owns this connection's calls. Switching phases is
// an explicit state transition performed by the server loop.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Routing {
    Login,
    Lobby,
    Game,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SendFailed;

// Server side of one client socket. Outgoing messages funnel through a single
// mpsc consumer (the socket writer thread), which serializes frames; dropping
// the sender is what lets that thread exit and close the socket.
pub struct Connection {
    tx: Option<mpsc::Sender<ServerMessage>>,
    monitor: PassiveConnectionMonitor,
}

impl Connection {
    pub fn new(tx: mpsc::Sender<ServerMessage>, now: Instant, liveness_timeout: Duration) -> Self {
        Connection {
            tx: Some(tx),
            monitor: PassiveConnectionMonitor::new(now, liveness_timeout),
        }
    }

    pub fn is_connected(&self) -> bool { self.tx.is_some() }

    pub fn send(&self, message: ServerMessage) -> Result<(), SendFailed> {
        match &self.tx {
            Some(tx) => tx.send(message).map_err(|_| SendFailed),
            None => Err(SendFailed),
        }
    }

    // Every successful read funnels through here; the timestamp drives both
    // liveness and "whose call is being served".
    pub fn register_incoming(&mut self, now: Instant) {
        self.monitor.register_incoming(now);
    }

    pub fn latest_incoming(&self) -> Instant { self.monitor.latest_incoming() }

    // Returns false if the connection has been silent for the full timeout
    // window. Does not disconnect by itself; the server loop does.
    pub fn check_liveness(&self, now: Instant) -> bool {
        !self.is_connected()
            || self.monitor.status(now) != PassiveConnectionStatus::PermanentlyLost
    }

    // Idempotent: repeated calls are no-ops.
    pub fn disconnect(&mut self) {
        self.tx = None;
    }
}
