use std::collections::{hash_map, HashMap};
use std::io;
use std::net::{Shutdown, TcpListener, TcpStream};
use std::ops;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use instant::Instant;
use log::{info, warn};

use crate::connection::{Connection, Routing};
use crate::error::{GameError, IdentificationError, LobbyError, ServiceError};
use crate::event::{
    ChatMessage, ChatRecipient, ClientCall, GameStartSnapshot, PauseReason, ResponseValue,
    ServerMessage, ServiceRequest, SessionEvent, MAX_CHAT_MESSAGE_LENGTH,
};
use crate::game::{GameSession, MoveOutcome, MIN_PLAYERS};
use crate::heartbeat::DEFAULT_LIVENESS_TIMEOUT;
use crate::lobby::LobbyDirectory;
use crate::network;
use crate::persistence::{SessionSnapshot, SnapshotError, SnapshotStore};
use crate::registry::{ClientRegistry, IdentifyOutcome};


pub const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_WATCHDOG_MAX_ATTEMPTS: usize = 4;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum IncomingEvent {
    Connect(ClientId),
    Network(ClientId, ClientCall),
    Disconnect(ClientId),
    Tick,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ClientId(pub(crate) u64);

pub struct ClientEntry {
    connection: Connection,
    username: Option<String>,
    routing: Routing,
}

pub struct Clients {
    map: HashMap<ClientId, ClientEntry>,
}

impl Clients {
    pub fn new() -> Self { Clients { map: HashMap::new() } }

    pub fn add_client(
        &mut self, tx: mpsc::Sender<ServerMessage>, now: Instant, liveness_timeout: Duration,
    ) -> ClientId {
        let entry = ClientEntry {
            connection: Connection::new(tx, now, liveness_timeout),
            username: None,
            routing: Routing::Login,
        };
        loop {
            let id = ClientId(rand::random::<u64>());
            match self.map.entry(id) {
                hash_map::Entry::Occupied(_) => {}
                hash_map::Entry::Vacant(e) => {
                    e.insert(entry);
                    return id;
                }
            }
        }
    }

    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }
}

impl Default for Clients {
    fn default() -> Self { Self::new() }
}

impl ops::Index<ClientId> for Clients {
    type Output = ClientEntry;
    fn index(&self, id: ClientId) -> &Self::Output { &self.map[&id] }
}
impl ops::IndexMut<ClientId> for Clients {
    fn index_mut(&mut self, id: ClientId) -> &mut Self::Output {
        self.map.get_mut(&id).unwrap()
    }
}

pub struct ServerOptions {
    pub liveness_timeout: Duration,
    pub watchdog_interval: Duration,
    pub watchdog_max_attempts: usize,
    pub snapshot_store: Option<Box<dyn SnapshotStore + Send>>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
            watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
            watchdog_max_attempts: DEFAULT_WATCHDOG_MAX_ATTEMPTS,
            snapshot_store: None,
        }
    }
}

// Tracks a paused game waiting for disconnected players to come back.
struct Watchdog {
    awaiting: Vec<String>,
    attempts: usize,
    next_attempt: Instant,
}

struct RunningGame {
    game: GameSession,
    watchdog: Option<Watchdog>,
}

enum WatchdogAction {
    Wait,
    Retry(Vec<String>, PauseReason),
    Teardown,
}

pub struct ServerState {
    clients: Arc<Mutex<Clients>>,
    registry: ClientRegistry,
    lobbies: LobbyDirectory,
    games: HashMap<String, RunningGame>, // keyed by lobby name
    options: ServerOptions,
    next_game_override: Option<GameSession>, // for tests
}

impl ServerState {
    pub fn new(clients: Arc<Mutex<Clients>>, options: ServerOptions) -> Self {
        ServerState {
            clients,
            registry: ClientRegistry::new(),
            lobbies: LobbyDirectory::new(),
            games: HashMap::new(),
            options,
            next_game_override: None,
        }
    }

    pub fn apply_event(&mut self, event: IncomingEvent, now: Instant) {
        let clients_arc = Arc::clone(&self.clients);
        let mut clients = clients_arc.lock().unwrap();
        match event {
            IncomingEvent::Connect(id) => self.registry.add_unidentified(id),
            IncomingEvent::Network(id, call) => self.on_call(&mut clients, id, call, now),
            IncomingEvent::Disconnect(id) => self.handle_disconnect(&mut clients, id, now),
            IncomingEvent::Tick => self.on_tick(&mut clients, now),
        }
    }

    // Installs the session used by the next `GameStart` instead of a randomly
    // dealt one.
    #[allow(non_snake_case)]
    pub fn TEST_override_next_game(&mut self, game: GameSession) {
        self.next_game_override = Some(game);
    }

    fn on_call(&mut self, clients: &mut Clients, id: ClientId, call: ClientCall, now: Instant) {
        let Some(entry) = clients.map.get_mut(&id) else {
            warn!("Dropping call from unknown client {id:?}");
            return;
        };
        entry.connection.register_incoming(now);
        let routing = entry.routing;
        let username = entry.username.clone();
        let ClientCall { call_id, request } = call;

        let result = match request {
            // Pings keep liveness fed in every phase.
            ServiceRequest::Ping => Ok(ResponseValue::Ok),
            request => self.dispatch(clients, id, routing, username, request, now),
        };

        let send_failed = match clients.map.get_mut(&id) {
            Some(entry) => {
                entry.connection.send(ServerMessage::Reply { call_id, result }).is_err()
            }
            None => false, // the call itself got the client disconnected
        };
        if send_failed {
            self.handle_disconnect(clients, id, now);
        }
    }

    fn dispatch(
        &mut self, clients: &mut Clients, id: ClientId, routing: Routing,
        username: Option<String>, request: ServiceRequest, now: Instant,
    ) -> Result<ResponseValue, ServiceError> {
        match routing {
            Routing::Login => self.login_call(clients, id, request, now),
            Routing::Lobby | Routing::Game => {
                let username = username.ok_or(IdentificationError::NotIdentified)?;
                match routing {
                    Routing::Lobby => self.lobby_call(clients, &username, request, now),
                    Routing::Game => self.game_call(clients, &username, request, now),
                    Routing::Login => unreachable!(),
                }
            }
        }
    }

    fn login_call(
        &mut self, clients: &mut Clients, id: ClientId, request: ServiceRequest, now: Instant,
    ) -> Result<ResponseValue, ServiceError> {
        match request {
            ServiceRequest::Login { username } => {
                let outcome = self.registry.identify(id, &username)?;
                let rejoined = outcome == IdentifyOutcome::Rejoined;
                clients[id].username = Some(username.clone());
                clients[id].routing = Routing::Lobby;
                info!("Client {id:?} identified as {username} (rejoined: {rejoined})");
                if rejoined {
                    if let Some(key) = self.game_key_of(&username) {
                        clients[id].routing = Routing::Game;
                        self.resume_if_ready(clients, &key, &username, now);
                        if let Some(running) = self.games.get(&key) {
                            let snapshot = running.game.start_snapshot_for(&username);
                            let _ = clients[id].connection.send(ServerMessage::Event(
                                SessionEvent::Start(Box::new(snapshot)),
                            ));
                        }
                    }
                }
                Ok(ResponseValue::Welcome { username, rejoined })
            }
            _ => Err(ServiceError::UnsupportedInThisPhase),
        }
    }

    fn lobby_call(
        &mut self, clients: &mut Clients, username: &str, request: ServiceRequest, now: Instant,
    ) -> Result<ResponseValue, ServiceError> {
        match request {
            ServiceRequest::LobbyList => Ok(ResponseValue::Lobbies(self.lobbies.list())),
            ServiceRequest::LobbyCreate { name } => {
                let lobby = self.lobbies.create(&name, username)?;
                info!("{username} created lobby {name}");
                Ok(ResponseValue::Lobby(lobby.state()))
            }
            ServiceRequest::LobbyJoin { name } => {
                let (state, others) = {
                    let lobby = self.lobbies.join(&name, username)?;
                    let others: Vec<String> = lobby
                        .players()
                        .iter()
                        .filter(|p| *p != username)
                        .cloned()
                        .collect();
                    (lobby.state(), others)
                };
                info!("{username} joined lobby {name}");
                self.broadcast_event(
                    clients,
                    &others,
                    &SessionEvent::Join { username: username.to_owned() },
                    now,
                );
                Ok(ResponseValue::Lobby(state))
            }
            ServiceRequest::LobbyLeave => {
                let name = self
                    .lobbies
                    .lobby_of(username)
                    .map(|lobby| lobby.name().to_owned())
                    .ok_or(LobbyError::PlayerNotIn)?;
                self.lobbies.leave(&name, username)?;
                let remaining = self
                    .lobbies
                    .get(&name)
                    .map(|lobby| lobby.players().to_vec())
                    .unwrap_or_default();
                info!("{username} left lobby {name}");
                self.broadcast_event(
                    clients,
                    &remaining,
                    &SessionEvent::Leave { username: username.to_owned() },
                    now,
                );
                Ok(ResponseValue::Ok)
            }
            ServiceRequest::LobbyUpdate => {
                let lobby = self.lobbies.lobby_of(username).ok_or(LobbyError::PlayerNotIn)?;
                Ok(ResponseValue::Lobby(lobby.state()))
            }
            ServiceRequest::GameStart => {
                let (key, players) = {
                    let lobby =
                        self.lobbies.lobby_of(username).ok_or(LobbyError::PlayerNotIn)?;
                    if lobby.host() != username {
                        return Err(GameError::NotHost.into());
                    }
                    if lobby.len() < MIN_PLAYERS {
                        return Err(GameError::NotEnoughPlayers.into());
                    }
                    (lobby.name().to_owned(), lobby.players().to_vec())
                };
                if self.games.contains_key(&key) {
                    return Err(GameError::GameInProgress.into());
                }
                let game = match self.next_game_override.take() {
                    Some(game) => {
                        let mut expected = players.clone();
                        expected.sort();
                        let mut actual = game.usernames();
                        actual.sort();
                        assert_eq!(actual, expected);
                        game
                    }
                    None => GameSession::new(players, &mut rand::rng()),
                };
                info!("Game started in lobby {key}");
                self.install_game(clients, key.clone(), game, now);
                self.autosave(&key);
                Ok(ResponseValue::Ok)
            }
            ServiceRequest::GameLoad => {
                let (key, mut members) = {
                    let lobby =
                        self.lobbies.lobby_of(username).ok_or(LobbyError::PlayerNotIn)?;
                    if lobby.host() != username {
                        return Err(GameError::NotHost.into());
                    }
                    (lobby.name().to_owned(), lobby.players().to_vec())
                };
                if self.games.contains_key(&key) {
                    return Err(GameError::GameInProgress.into());
                }
                let store =
                    self.options.snapshot_store.as_ref().ok_or(GameError::NoSavedGame)?;
                let snapshot = match store.load(&key) {
                    Ok(snapshot) => snapshot,
                    Err(SnapshotError::NotFound) => return Err(GameError::NoSavedGame.into()),
                    Err(err) => {
                        warn!("Failed to load snapshot for lobby {key}: {err:?}");
                        return Err(GameError::NoSavedGame.into());
                    }
                };
                let mut game = snapshot.game;
                let mut saved = game.usernames();
                saved.sort();
                members.sort();
                if saved != members {
                    return Err(GameError::SavedGameMismatch.into());
                }
                game.resume();
                info!("Game restored from snapshot in lobby {key}");
                self.install_game(clients, key, game, now);
                Ok(ResponseValue::Ok)
            }
            ServiceRequest::ChatSend { message, recipient } => {
                self.chat(clients, username, message, recipient, now)
            }
            _ => Err(ServiceError::UnsupportedInThisPhase),
        }
    }

    fn game_call(
        &mut self, clients: &mut Clients, username: &str, request: ServiceRequest, now: Instant,
    ) -> Result<ResponseValue, ServiceError> {
        match request {
            ServiceRequest::CardSelect { column, positions } => {
                let key = self.game_key_of(username).ok_or(GameError::NoActiveGame)?;
                let outcome = self
                    .games
                    .get_mut(&key)
                    .ok_or(GameError::NoActiveGame)?
                    .game
                    .apply_move(username, &positions, column, &mut rand::rng())?;
                match outcome {
                    MoveOutcome::Continued(update) => {
                        self.autosave(&key);
                        let members = self.games[&key].game.usernames();
                        self.broadcast_event(
                            clients,
                            &members,
                            &SessionEvent::Update(Box::new(update)),
                            now,
                        );
                    }
                    MoveOutcome::Finished(update, scoreboard) => {
                        let members = match self.games.remove(&key) {
                            Some(running) => running.game.usernames(),
                            None => Vec::new(),
                        };
                        if let Some(store) = &self.options.snapshot_store {
                            if let Err(err) = store.remove(&key) {
                                warn!("Failed to drop snapshot for lobby {key}: {err:?}");
                            }
                        }
                        info!("Game over in lobby {key}");
                        self.broadcast_event(
                            clients,
                            &members,
                            &SessionEvent::Update(Box::new(update)),
                            now,
                        );
                        self.broadcast_event(
                            clients,
                            &members,
                            &SessionEvent::End { scoreboard },
                            now,
                        );
                        self.route_to_lobby(clients, &members);
                    }
                }
                Ok(ResponseValue::Ok)
            }
            ServiceRequest::ChatSend { message, recipient } => {
                self.chat(clients, username, message, recipient, now)
            }
            _ => Err(ServiceError::UnsupportedInThisPhase),
        }
    }

    fn chat(
        &mut self, clients: &mut Clients, username: &str, message: String,
        recipient: ChatRecipient, now: Instant,
    ) -> Result<ResponseValue, ServiceError> {
        let members = self
            .lobbies
            .lobby_of(username)
            .map(|lobby| lobby.players().to_vec())
            .ok_or(LobbyError::PlayerNotIn)?;
        let targets = match &recipient {
            ChatRecipient::All => members,
            ChatRecipient::Direct(target) => {
                if !members.iter().any(|m| m == target) {
                    return Err(LobbyError::PlayerNotIn.into());
                }
                // The sender sees their own whispers.
                if target == username {
                    vec![username.to_owned()]
                } else {
                    vec![target.clone(), username.to_owned()]
                }
            }
        };
        let mut text = message;
        if text.chars().count() > MAX_CHAT_MESSAGE_LENGTH {
            text = text.chars().take(MAX_CHAT_MESSAGE_LENGTH).collect();
        }
        let chat = ChatMessage { sender: username.to_owned(), recipient, text };
        self.broadcast_event(clients, &targets, &SessionEvent::NewMessage(chat), now);
        Ok(ResponseValue::Ok)
    }

    fn install_game(
        &mut self, clients: &mut Clients, key: String, game: GameSession, now: Instant,
    ) {
        let snapshots: Vec<(String, GameStartSnapshot)> = game
            .usernames()
            .iter()
            .map(|u| (u.clone(), game.start_snapshot_for(u)))
            .collect();
        self.games.insert(key, RunningGame { game, watchdog: None });
        let mut failed = Vec::new();
        for (username, snapshot) in snapshots {
            let Some(cid) = self.registry.lookup(&username) else { continue };
            clients[cid].routing = Routing::Game;
            let message = ServerMessage::Event(SessionEvent::Start(Box::new(snapshot)));
            if clients[cid].connection.send(message).is_err() {
                failed.push(username);
            }
        }
        for username in failed {
            self.drop_player(clients, &username, now);
        }
    }

    fn route_to_lobby(&self, clients: &mut Clients, members: &[String]) {
        for username in members {
            if let Some(cid) = self.registry.lookup(username) {
                clients[cid].routing = Routing::Lobby;
            }
        }
    }

    fn game_key_of(&self, username: &str) -> Option<String> {
        self.games
            .iter()
            .find(|(_, running)| running.game.player(username).is_some())
            .map(|(key, _)| key.clone())
    }

    fn autosave(&self, key: &str) {
        let Some(store) = &self.options.snapshot_store else { return };
        let Some(running) = self.games.get(key) else { return };
        let snapshot = SessionSnapshot::new(key, running.game.clone());
        if let Err(err) = store.save(key, &snapshot) {
            warn!("Failed to save snapshot for lobby {key}: {err:?}");
        }
    }

    // Sends one event to every named player that is still connected. A failed
    // send means the socket writer is gone; the player is disconnected on the
    // spot so the game watchdog picks them up.
    fn broadcast_event(
        &mut self, clients: &mut Clients, usernames: &[String], event: &SessionEvent,
        now: Instant,
    ) {
        let mut failed = Vec::new();
        for username in usernames {
            let Some(cid) = self.registry.lookup(username) else { continue };
            let message = ServerMessage::Event(event.clone());
            if clients[cid].connection.send(message).is_err() {
                failed.push(username.clone());
            }
        }
        for username in failed {
            self.drop_player(clients, &username, now);
        }
    }

    fn drop_player(&mut self, clients: &mut Clients, username: &str, now: Instant) {
        if let Some(cid) = self.registry.lookup(username) {
            clients.map.remove(&cid);
        }
        self.handle_player_disconnect(clients, username, now);
    }

    fn handle_disconnect(&mut self, clients: &mut Clients, id: ClientId, now: Instant) {
        let Some(entry) = clients.map.remove(&id) else {
            return; // already gone
        };
        match entry.username {
            None => self.registry.remove_unidentified(id),
            Some(username) => {
                // Ignore stale disconnects for identities that have since been
                // resumed on another connection.
                if self.registry.lookup(&username) == Some(id) {
                    self.handle_player_disconnect(clients, &username, now);
                }
            }
        }
    }

    fn handle_player_disconnect(
        &mut self, clients: &mut Clients, username: &str, now: Instant,
    ) {
        self.registry.mark_disconnected(username);
        if let Some(key) = self.game_key_of(username) {
            info!("{username} disconnected mid-game; pausing lobby {key}");
            let interval = self.options.watchdog_interval;
            let members = {
                let running = match self.games.get_mut(&key) {
                    Some(running) => running,
                    None => return,
                };
                running.game.pause();
                match &mut running.watchdog {
                    Some(watchdog) => watchdog.awaiting.push(username.to_owned()),
                    watchdog @ None => {
                        *watchdog = Some(Watchdog {
                            awaiting: vec![username.to_owned()],
                            attempts: 0,
                            next_attempt: now + interval,
                        });
                    }
                }
                running.game.usernames()
            };
            let reason = PauseReason::PlayerDisconnected { username: username.to_owned() };
            self.broadcast_event(clients, &members, &SessionEvent::Pause { reason }, now);
        } else if let Some(name) =
            self.lobbies.lobby_of(username).map(|lobby| lobby.name().to_owned())
        {
            let _ = self.lobbies.leave(&name, username);
            self.registry.forget(username);
            let remaining = self
                .lobbies
                .get(&name)
                .map(|lobby| lobby.players().to_vec())
                .unwrap_or_default();
            info!("{username} disconnected and left lobby {name}");
            self.broadcast_event(
                clients,
                &remaining,
                &SessionEvent::Leave { username: username.to_owned() },
                now,
            );
        } else {
            self.registry.forget(username);
        }
    }

    fn resume_if_ready(
        &mut self, clients: &mut Clients, key: &str, username: &str, now: Instant,
    ) {
        let members = {
            let Some(running) = self.games.get_mut(key) else { return };
            let Some(watchdog) = &mut running.watchdog else { return };
            watchdog.awaiting.retain(|u| u != username);
            if !watchdog.awaiting.is_empty() {
                return;
            }
            running.watchdog = None;
            running.game.resume();
            running.game.usernames()
        };
        info!("All players are back; resuming lobby {key}");
        self.broadcast_event(clients, &members, &SessionEvent::Resume, now);
    }

    fn on_tick(&mut self, clients: &mut Clients, now: Instant) {
        let dead: Vec<ClientId> = clients
            .map
            .iter()
            .filter(|(_, entry)| !entry.connection.check_liveness(now))
            .map(|(&id, _)| id)
            .collect();
        for id in dead {
            info!("Client {id:?} timed out");
            self.handle_disconnect(clients, id, now);
        }

        let keys: Vec<String> = self
            .games
            .iter()
            .filter(|(_, running)| running.watchdog.is_some())
            .map(|(key, _)| key.clone())
            .collect();
        for key in keys {
            let action = {
                let Some(running) = self.games.get_mut(&key) else { continue };
                let Some(watchdog) = &mut running.watchdog else { continue };
                if now < watchdog.next_attempt {
                    WatchdogAction::Wait
                } else {
                    watchdog.attempts += 1;
                    if watchdog.attempts >= self.options.watchdog_max_attempts {
                        WatchdogAction::Teardown
                    } else {
                        watchdog.next_attempt = now + self.options.watchdog_interval;
                        let reason = PauseReason::PlayerDisconnected {
                            username: watchdog.awaiting[0].clone(),
                        };
                        WatchdogAction::Retry(running.game.usernames(), reason)
                    }
                }
            };
            match action {
                WatchdogAction::Wait => {}
                WatchdogAction::Retry(members, reason) => {
                    self.broadcast_event(
                        clients,
                        &members,
                        &SessionEvent::Pause { reason },
                        now,
                    );
                }
                WatchdogAction::Teardown => self.teardown_game(clients, &key, now),
            }
        }
    }

    // The grace period ran out. A single surviving player wins by forfeit;
    // otherwise the game is dropped. The last snapshot stays on disk so the
    // lobby can restore it later.
    fn teardown_game(&mut self, clients: &mut Clients, key: &str, now: Instant) {
        let Some(mut running) = self.games.remove(key) else { return };
        let members = running.game.usernames();
        let connected: Vec<String> = members
            .iter()
            .filter(|u| self.registry.is_connected(u))
            .cloned()
            .collect();
        info!("Tearing down the game in lobby {key}: {} players left", connected.len());
        if connected.len() == 1 {
            let scoreboard = running.game.fast_end(&connected[0]);
            self.broadcast_event(clients, &connected, &SessionEvent::End { scoreboard }, now);
        } else {
            let message = "The game was abandoned: too many players left".to_owned();
            self.broadcast_event(clients, &connected, &SessionEvent::Error { message }, now);
        }
        self.route_to_lobby(clients, &connected);
        for username in &members {
            if connected.contains(username) {
                continue;
            }
            if self.lobbies.leave(key, username).is_ok() {
                let remaining = self
                    .lobbies
                    .get(key)
                    .map(|lobby| lobby.players().to_vec())
                    .unwrap_or_default();
                self.broadcast_event(
                    clients,
                    &remaining,
                    &SessionEvent::Leave { username: username.clone() },
                    now,
                );
            }
            self.registry.forget(username);
        }
    }
}


// Accepts connections and runs the event loop until the listener fails. Each
// connection gets a blocking reader thread and a writer thread; all state
// changes happen on the single state thread.
pub fn run_with_listener(listener: TcpListener, options: ServerOptions) -> io::Result<()> {
    let (tx, rx) = mpsc::channel();
    let tx_tick = tx.clone();
    thread::spawn(move || loop {
        thread::sleep(TICK_INTERVAL);
        if tx_tick.send(IncomingEvent::Tick).is_err() {
            return;
        }
    });

    let clients = Arc::new(Mutex::new(Clients::new()));
    let clients_acceptor = Arc::clone(&clients);
    let liveness_timeout = options.liveness_timeout;
    thread::spawn(move || {
        let mut server_state = ServerState::new(clients, options);
        for event in rx {
            server_state.apply_event(event, Instant::now());
        }
    });

    info!("Listening on {}", listener.local_addr()?);
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(err) = spawn_client_threads(
                    stream,
                    &clients_acceptor,
                    &tx,
                    liveness_timeout,
                ) {
                    warn!("Failed to set up a client connection: {err}");
                }
            }
            Err(err) => warn!("Cannot establish connection: {err}"),
        }
    }
    Ok(())
}

fn spawn_client_threads(
    stream: TcpStream, clients: &Arc<Mutex<Clients>>, tx: &mpsc::Sender<IncomingEvent>,
    liveness_timeout: Duration,
) -> io::Result<()> {
    info!("Client connected from {}", stream.peer_addr()?);
    let mut in_stream = stream.try_clone()?;
    let mut out_stream = stream;
    let (client_tx, client_rx) = mpsc::channel();
    let client_id =
        clients.lock().unwrap().add_client(client_tx, Instant::now(), liveness_timeout);
    let _ = tx.send(IncomingEvent::Connect(client_id));

    let tx_reader = tx.clone();
    thread::spawn(move || loop {
        match network::read_obj::<ClientCall>(&mut in_stream) {
            Ok(call) => {
                if tx_reader.send(IncomingEvent::Network(client_id, call)).is_err() {
                    return;
                }
            }
            Err(err) => {
                info!("Reader for client {client_id:?} finished: {err:?}");
                let _ = tx_reader.send(IncomingEvent::Disconnect(client_id));
                return;
            }
        }
    });

    thread::spawn(move || {
        for message in client_rx {
            if network::write_obj(&mut out_stream, &message).is_err() {
                return;
            }
        }
        // The server dropped the sender: close the socket so the reader
        // unblocks too.
        let _ = out_stream.shutdown(Shutdown::Both);
    });
    Ok(())
}
