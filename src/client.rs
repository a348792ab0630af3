use std::collections::{HashMap, HashSet, VecDeque};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use instant::Instant;
use log::{info, warn};

use crate::board::TabletopView;
use crate::error::{ClientError, IdentificationError, ServiceError};
use crate::event::{
    CallId, ChatMessage, ClientCall, CommonObjectiveView, GameStartSnapshot, GameUpdate,
    LobbyState, ResponseValue, ServerMessage, ServiceRequest, SessionEvent,
};
use crate::heartbeat::{ActiveConnectionMonitor, ActiveConnectionStatus};
use crate::network;
use crate::objectives::PersonalObjective;
use crate::scores::Scoreboard;
use crate::shelf::Shelf;


enum PendingSlot {
    Waiting,
    Delivered(Result<ResponseValue, ServiceError>),
    // The waiter timed out. The slot stays so the eventual late reply is
    // recognized and drained instead of being mistaken for a protocol fault.
    Abandoned,
}

struct CorrelatorState {
    slots: HashMap<CallId, PendingSlot>,
    disconnected: bool,
}

// Matches replies to outstanding calls by id. Many threads may wait at once;
// each blocks until its own reply lands.
pub struct CallCorrelator {
    state: Mutex<CorrelatorState>,
    wakeup: Condvar,
    next_id: AtomicU64,
}

impl CallCorrelator {
    pub fn new() -> Self {
        CallCorrelator {
            state: Mutex::new(CorrelatorState { slots: HashMap::new(), disconnected: false }),
            wakeup: Condvar::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register(&self) -> CallId {
        let call_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap();
        state.slots.insert(call_id, PendingSlot::Waiting);
        call_id
    }

    pub fn deliver(&self, call_id: CallId, result: Result<ResponseValue, ServiceError>) {
        let mut state = self.state.lock().unwrap();
        match state.slots.get_mut(&call_id) {
            Some(slot @ PendingSlot::Waiting) => {
                *slot = PendingSlot::Delivered(result);
                self.wakeup.notify_all();
            }
            Some(PendingSlot::Abandoned) => {
                state.slots.remove(&call_id);
            }
            Some(PendingSlot::Delivered(_)) => {
                warn!("Duplicate reply for call {call_id}, dropping");
            }
            None => {
                warn!("Reply for unknown call {call_id}, dropping");
            }
        }
    }

    pub fn wait_result(
        &self, call_id: CallId, timeout: Option<Duration>,
    ) -> Result<Result<ResponseValue, ServiceError>, ClientError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock().unwrap();
        loop {
            if matches!(state.slots.get(&call_id), Some(PendingSlot::Delivered(_))) {
                match state.slots.remove(&call_id) {
                    Some(PendingSlot::Delivered(result)) => return Ok(result),
                    _ => unreachable!(),
                }
            }
            if state.disconnected {
                state.slots.remove(&call_id);
                return Err(ClientError::Disconnected);
            }
            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        if let Some(slot) = state.slots.get_mut(&call_id) {
                            *slot = PendingSlot::Abandoned;
                        }
                        return Err(ClientError::Timeout);
                    }
                    self.wakeup.wait_timeout(state, deadline - now).unwrap().0
                }
                None => self.wakeup.wait(state).unwrap(),
            };
        }
    }

    // Wakes every waiter with `Disconnected`. New waits fail immediately.
    pub fn fail_all(&self) {
        let mut state = self.state.lock().unwrap();
        state.disconnected = true;
        self.wakeup.notify_all();
    }

    #[cfg(test)]
    fn num_pending(&self) -> usize { self.state.lock().unwrap().slots.len() }
}

impl Default for CallCorrelator {
    fn default() -> Self { Self::new() }
}


struct QueueState {
    events: VecDeque<SessionEvent>,
    closed: bool,
}

// Unbounded FIFO of push events, decoupled from the reader thread so a slow
// consumer never stalls reply correlation.
pub struct EventQueue {
    state: Mutex<QueueState>,
    added: Condvar,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue {
            state: Mutex::new(QueueState { events: VecDeque::new(), closed: false }),
            added: Condvar::new(),
        }
    }

    pub fn push(&self, event: SessionEvent) {
        let mut state = self.state.lock().unwrap();
        state.events.push_back(event);
        self.added.notify_all();
    }

    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.added.notify_all();
    }

    pub fn poll(&self) -> Option<SessionEvent> {
        self.state.lock().unwrap().events.pop_front()
    }

    pub fn has_event(&self) -> bool {
        !self.state.lock().unwrap().events.is_empty()
    }

    // Blocks until an event arrives. Returns `None` once the queue is closed
    // and drained, or when the timeout expires.
    pub fn wait(&self, timeout: Option<Duration>) -> Option<SessionEvent> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(event) = state.events.pop_front() {
                return Some(event);
            }
            if state.closed {
                return None;
            }
            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    self.added.wait_timeout(state, deadline - now).unwrap().0
                }
                None => self.added.wait(state).unwrap(),
            };
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self { Self::new() }
}


// Client side of the duplex channel. Writes are serialized through a mutex;
// a dedicated reader thread splits incoming frames between the correlator and
// the event queue.
pub struct ClientConnection {
    writer: Mutex<TcpStream>,
    correlator: CallCorrelator,
    events: EventQueue,
}

impl ClientConnection {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Arc<Self>, ClientError> {
        let stream = TcpStream::connect(addr).map_err(network::CommunicationError::from)?;
        let reader = stream.try_clone().map_err(network::CommunicationError::from)?;
        let connection = Arc::new(ClientConnection {
            writer: Mutex::new(stream),
            correlator: CallCorrelator::new(),
            events: EventQueue::new(),
        });
        let conn = Arc::clone(&connection);
        thread::spawn(move || conn.read_loop(reader));
        Ok(connection)
    }

    fn read_loop(&self, mut reader: TcpStream) {
        loop {
            match network::read_obj::<ServerMessage>(&mut reader) {
                Ok(ServerMessage::Reply { call_id, result }) => {
                    self.correlator.deliver(call_id, result);
                }
                Ok(ServerMessage::Event(event)) => self.events.push(event),
                Err(err) => {
                    info!("Connection reader finished: {err:?}");
                    self.correlator.fail_all();
                    self.events.close();
                    return;
                }
            }
        }
    }

    pub fn events(&self) -> &EventQueue { &self.events }

    pub fn send_call(&self, request: ServiceRequest) -> Result<CallId, ClientError> {
        let call_id = self.correlator.register();
        let mut writer = self.writer.lock().unwrap();
        network::write_obj(&mut *writer, &ClientCall { call_id, request })?;
        Ok(call_id)
    }

    // One request, one reply. The outer error is transport trouble; the inner
    // result is the service verdict.
    pub fn call(
        &self, request: ServiceRequest, timeout: Option<Duration>,
    ) -> Result<Result<ResponseValue, ServiceError>, ClientError> {
        let call_id = self.send_call(request)?;
        self.correlator.wait_result(call_id, timeout)
    }

    // Idempotent. The reader thread notices the closed socket and fails all
    // outstanding waits.
    pub fn shutdown(&self) {
        let writer = self.writer.lock().unwrap();
        let _ = writer.shutdown(Shutdown::Both);
    }

    // Keeps the server's passive liveness monitor fed while the user idles.
    pub fn spawn_heartbeat(self: &Arc<Self>, liveness_timeout: Duration) {
        let conn = Arc::clone(self);
        thread::spawn(move || {
            let mut monitor = ActiveConnectionMonitor::new(liveness_timeout);
            loop {
                if monitor.update(Instant::now()) == ActiveConnectionStatus::SendPing {
                    if conn.call(ServiceRequest::Ping, Some(liveness_timeout)).is_err() {
                        return;
                    }
                }
                let now = Instant::now();
                let next = monitor.next_ping_at(now);
                if next > now {
                    thread::sleep(next - now);
                }
            }
        });
    }
}


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionPhase {
    Disconnected,
    // Connected, not yet identified.
    Idle,
    InLobbySearch,
    InLobby,
    InGame,
}

// Everything this client knows about the game in progress, rebuilt from the
// start snapshot and kept current by updates.
#[derive(Clone, Debug)]
pub struct LocalGameView {
    pub players: Vec<String>,
    pub tabletop: TabletopView,
    pub shelves: HashMap<String, Shelf>,
    pub common_objectives: Vec<CommonObjectiveView>,
    pub personal_objective: PersonalObjective,
    pub current_player: Option<String>,
    pub paused: bool,
    pub tallies: HashMap<String, u32>,
    applied_events: HashSet<u64>,
    awarded: HashSet<(String, String)>, // (player, prize source)
}

impl LocalGameView {
    fn from_snapshot(snapshot: GameStartSnapshot) -> Self {
        LocalGameView {
            players: snapshot.players,
            tabletop: snapshot.tabletop,
            shelves: snapshot.shelves.into_iter().collect(),
            common_objectives: snapshot.common_objectives,
            personal_objective: snapshot.personal_objective,
            current_player: Some(snapshot.current_player),
            paused: snapshot.paused,
            tallies: HashMap::new(),
            applied_events: HashSet::new(),
            awarded: HashSet::new(),
        }
    }

    // Updates carry absolute payloads keyed by event id, so replays and
    // duplicate deliveries change nothing.
    pub fn apply_update(&mut self, update: GameUpdate) {
        if !self.applied_events.insert(update.event_id) {
            return;
        }
        self.tabletop = update.tabletop;
        self.shelves.insert(update.mover.clone(), update.shelf);
        for award in update.completed {
            let prize_key = (award.username.clone(), award.source.clone());
            if self.awarded.insert(prize_key) {
                *self.tallies.entry(award.username).or_insert(0) += award.cockade.points;
            }
        }
        self.current_player = update.next_player;
    }

    pub fn shelf_of(&self, username: &str) -> Option<&Shelf> { self.shelves.get(username) }
}

// Client-side session mirror, fed by replies and push events.
pub struct ClientState {
    username: Option<String>,
    phase: SessionPhase,
    lobby: Option<LobbyState>,
    game: Option<LocalGameView>,
    chat_log: Vec<ChatMessage>,
    scoreboard: Option<Scoreboard>,
}

impl ClientState {
    pub fn new() -> Self {
        ClientState {
            username: None,
            phase: SessionPhase::Idle,
            lobby: None,
            game: None,
            chat_log: Vec::new(),
            scoreboard: None,
        }
    }

    pub fn username(&self) -> Option<&str> { self.username.as_deref() }
    pub fn phase(&self) -> SessionPhase { self.phase }
    pub fn lobby(&self) -> Option<&LobbyState> { self.lobby.as_ref() }
    pub fn game(&self) -> Option<&LocalGameView> { self.game.as_ref() }
    pub fn chat_log(&self) -> &[ChatMessage] { &self.chat_log }
    pub fn scoreboard(&self) -> Option<&Scoreboard> { self.scoreboard.as_ref() }

    // The identity is pinned for the lifetime of the connection. On a rejoin
    // the game snapshot may arrive before the login reply, so this only moves
    // the phase forward from `Idle` and never resets a later one.
    pub fn set_username(&mut self, username: &str) -> Result<(), IdentificationError> {
        if self.username.is_some() {
            return Err(IdentificationError::AlreadyIdentified);
        }
        self.username = Some(username.to_owned());
        if self.phase == SessionPhase::Idle {
            self.phase = SessionPhase::InLobbySearch;
        }
        Ok(())
    }

    pub fn set_lobby(&mut self, lobby: LobbyState) {
        self.lobby = Some(lobby);
        if self.phase == SessionPhase::InLobbySearch {
            self.phase = SessionPhase::InLobby;
        }
    }

    pub fn leave_lobby(&mut self) {
        self.lobby = None;
        self.phase = SessionPhase::InLobbySearch;
    }

    pub fn process_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Join { username } => {
                if let Some(lobby) = &mut self.lobby {
                    if !lobby.players.contains(&username) {
                        lobby.players.push(username);
                    }
                }
            }
            SessionEvent::Leave { username } => {
                if let Some(lobby) = &mut self.lobby {
                    lobby.players.retain(|p| p != &username);
                }
            }
            SessionEvent::Pause { reason: _ } => {
                if let Some(game) = &mut self.game {
                    game.paused = true;
                }
            }
            SessionEvent::Resume => {
                if let Some(game) = &mut self.game {
                    game.paused = false;
                }
            }
            SessionEvent::Start(snapshot) => {
                self.game = Some(LocalGameView::from_snapshot(*snapshot));
                self.scoreboard = None;
                self.phase = SessionPhase::InGame;
            }
            SessionEvent::Update(update) => {
                if let Some(game) = &mut self.game {
                    game.apply_update(*update);
                }
            }
            SessionEvent::End { scoreboard } => {
                self.scoreboard = Some(scoreboard);
                self.game = None;
                self.phase = SessionPhase::InLobby;
            }
            SessionEvent::NewMessage(message) => self.chat_log.push(message),
            SessionEvent::Error { message } => warn!("Server error: {message}"),
        }
    }

    pub fn disconnected(&mut self) {
        self.phase = SessionPhase::Disconnected;
    }
}

impl Default for ClientState {
    fn default() -> Self { Self::new() }
}
