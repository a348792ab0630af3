// Channel-level tests: a server state machine plus in-memory clients, with a
// virtual clock driving liveness and watchdog behavior.

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use curio_cabinet::board::Tabletop;
use curio_cabinet::cards::{CardKind, CellPos};
use curio_cabinet::client::{ClientState, SessionPhase};
use curio_cabinet::error::{
    GameError, IdentificationError, InvalidMoveReason, LobbyError, ServiceError,
};
use curio_cabinet::event::{
    CallId, ChatRecipient, ClientCall, ResponseValue, ServerMessage, ServiceRequest,
    SessionEvent,
};
use curio_cabinet::game::GameSession;
use curio_cabinet::objectives::{CommonObjective, CommonObjectiveKind, PersonalObjective};
use curio_cabinet::persistence::FileSnapshotStore;
use curio_cabinet::scores::SOLE_SURVIVOR_TITLE;
use curio_cabinet::server::{ClientId, Clients, IncomingEvent, ServerOptions, ServerState};
use curio_cabinet::shelf::SHELF_ROWS;
use instant::Instant;
use pretty_assertions::assert_eq;


struct Server {
    creation_instant: Instant,
    time_elapsed: Duration,
    liveness_timeout: Duration,
    clients: Arc<Mutex<Clients>>,
    state: ServerState,
}

impl Server {
    fn new() -> Self { Self::with_options(ServerOptions::default()) }

    fn with_options(options: ServerOptions) -> Self {
        let liveness_timeout = options.liveness_timeout;
        let clients = Arc::new(Mutex::new(Clients::new()));
        let state = ServerState::new(Arc::clone(&clients), options);
        Server {
            creation_instant: Instant::now(),
            time_elapsed: Duration::ZERO,
            liveness_timeout,
            clients,
            state,
        }
    }

    fn now(&self) -> Instant { self.creation_instant + self.time_elapsed }
    fn advance(&mut self, by: Duration) { self.time_elapsed += by; }

    fn tick(&mut self) {
        self.state.apply_event(IncomingEvent::Tick, self.now());
    }
}

struct Client {
    id: ClientId,
    rx: mpsc::Receiver<ServerMessage>,
    state: ClientState,
    next_call_id: CallId,
    replies: Vec<(CallId, Result<ResponseValue, ServiceError>)>,
    events: Vec<SessionEvent>,
}

impl Client {
    fn connect(server: &mut Server) -> Self {
        let (tx, rx) = mpsc::channel();
        let id = server.clients.lock().unwrap().add_client(
            tx,
            server.now(),
            server.liveness_timeout,
        );
        server.state.apply_event(IncomingEvent::Connect(id), server.now());
        Client {
            id,
            rx,
            state: ClientState::new(),
            next_call_id: 1,
            replies: Vec::new(),
            events: Vec::new(),
        }
    }

    fn reconnect(&mut self, server: &mut Server) {
        let (tx, rx) = mpsc::channel();
        self.id = server.clients.lock().unwrap().add_client(
            tx,
            server.now(),
            server.liveness_timeout,
        );
        server.state.apply_event(IncomingEvent::Connect(self.id), server.now());
        self.rx = rx;
        self.state = ClientState::new();
        self.replies.clear();
        self.events.clear();
    }

    fn disconnect(&mut self, server: &mut Server) {
        server.state.apply_event(IncomingEvent::Disconnect(self.id), server.now());
    }

    fn call(&mut self, server: &mut Server, request: ServiceRequest) -> CallId {
        let call_id = self.next_call_id;
        self.next_call_id += 1;
        server.state.apply_event(
            IncomingEvent::Network(self.id, ClientCall { call_id, request }),
            server.now(),
        );
        call_id
    }

    fn drain(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            match message {
                ServerMessage::Reply { call_id, result } => {
                    if let Ok(ResponseValue::Welcome { username, .. }) = &result {
                        let _ = self.state.set_username(username);
                    }
                    if let Ok(ResponseValue::Lobby(lobby)) = &result {
                        self.state.set_lobby(lobby.clone());
                    }
                    self.replies.push((call_id, result));
                }
                ServerMessage::Event(event) => {
                    self.events.push(event.clone());
                    self.state.process_event(event);
                }
            }
        }
    }

    fn reply(&mut self, call_id: CallId) -> Result<ResponseValue, ServiceError> {
        self.drain();
        let idx = self
            .replies
            .iter()
            .position(|(id, _)| *id == call_id)
            .unwrap_or_else(|| panic!("no reply for call {call_id}"));
        self.replies.remove(idx).1
    }

    fn rpc(
        &mut self, server: &mut Server, request: ServiceRequest,
    ) -> Result<ResponseValue, ServiceError> {
        let call_id = self.call(server, request);
        self.reply(call_id)
    }

    fn login(
        &mut self, server: &mut Server, username: &str,
    ) -> Result<ResponseValue, ServiceError> {
        self.rpc(server, ServiceRequest::Login { username: username.to_owned() })
    }

    fn count_events(&self, pred: impl Fn(&SessionEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}


fn far_personal() -> PersonalObjective {
    PersonalObjective { targets: vec![(CellPos::new(SHELF_ROWS - 1, 0), CardKind::Teacups)] }
}

fn staged_two_player_game(cards: &[(CellPos, CardKind)]) -> GameSession {
    let mut tabletop = Tabletop::unfilled(2);
    tabletop.drain_bag();
    for &(pos, kind) in cards {
        tabletop.put(pos, kind);
    }
    GameSession::with_setup(
        vec!["ann".to_owned(), "bob".to_owned()],
        tabletop,
        vec![
            CommonObjective::new(CommonObjectiveKind::FourCorners, 2),
            CommonObjective::new(CommonObjectiveKind::TwoRainbowColumns, 2),
        ],
        vec![far_personal(), far_personal()],
    )
}

// ann hosts "parlor", bob joins, and the given staged game starts.
fn start_staged_game(
    server: &mut Server, cards: &[(CellPos, CardKind)],
) -> (Client, Client) {
    let mut ann = Client::connect(server);
    let mut bob = Client::connect(server);
    ann.login(server, "ann").unwrap();
    bob.login(server, "bob").unwrap();
    ann.rpc(server, ServiceRequest::LobbyCreate { name: "parlor".to_owned() }).unwrap();
    bob.rpc(server, ServiceRequest::LobbyJoin { name: "parlor".to_owned() }).unwrap();
    server.state.TEST_override_next_game(staged_two_player_game(cards));
    ann.rpc(server, ServiceRequest::GameStart).unwrap();
    ann.drain();
    bob.drain();
    assert_eq!(ann.state.phase(), SessionPhase::InGame);
    assert_eq!(bob.state.phase(), SessionPhase::InGame);
    (ann, bob)
}


#[test]
fn ping_is_served_in_every_phase() {
    let mut server = Server::new();
    let mut client = Client::connect(&mut server);
    assert!(matches!(
        client.rpc(&mut server, ServiceRequest::Ping),
        Ok(ResponseValue::Ok)
    ));
    client.login(&mut server, "ann").unwrap();
    assert!(matches!(
        client.rpc(&mut server, ServiceRequest::Ping),
        Ok(ResponseValue::Ok)
    ));
}

#[test]
fn every_call_gets_exactly_one_correlated_reply() {
    let mut server = Server::new();
    let mut client = Client::connect(&mut server);
    let first = client.call(&mut server, ServiceRequest::Ping);
    let second = client.call(&mut server, ServiceRequest::LobbyList);
    let third = client.call(&mut server, ServiceRequest::Ping);
    client.drain();
    assert_eq!(client.replies.len(), 3);
    assert!(matches!(client.reply(second), Err(ServiceError::UnsupportedInThisPhase)));
    assert!(matches!(client.reply(first), Ok(ResponseValue::Ok)));
    assert!(matches!(client.reply(third), Ok(ResponseValue::Ok)));
    assert!(client.replies.is_empty());
}

#[test]
fn username_rules() {
    let mut server = Server::new();
    let mut ann = Client::connect(&mut server);
    let mut imposter = Client::connect(&mut server);
    assert!(matches!(
        ann.login(&mut server, "ann"),
        Ok(ResponseValue::Welcome { rejoined: false, .. })
    ));
    assert_eq!(
        imposter.login(&mut server, "ann").unwrap_err(),
        ServiceError::Identification(IdentificationError::UsernameTaken)
    );
    assert_eq!(
        imposter.login(&mut server, "not a name").unwrap_err(),
        ServiceError::Identification(IdentificationError::InvalidUsername)
    );
    // The identity is pinned per connection.
    assert_eq!(
        ann.login(&mut server, "ann2").unwrap_err(),
        ServiceError::UnsupportedInThisPhase
    );
}

#[test]
fn lobby_lifecycle() {
    let mut server = Server::new();
    let mut ann = Client::connect(&mut server);
    let mut bob = Client::connect(&mut server);
    let mut cat = Client::connect(&mut server);
    ann.login(&mut server, "ann").unwrap();
    bob.login(&mut server, "bob").unwrap();
    cat.login(&mut server, "cat").unwrap();

    assert!(matches!(
        ann.rpc(&mut server, ServiceRequest::LobbyList),
        Ok(ResponseValue::Lobbies(lobbies)) if lobbies.is_empty()
    ));
    ann.rpc(&mut server, ServiceRequest::LobbyCreate { name: "parlor".to_owned() })
        .unwrap();
    assert_eq!(
        bob.rpc(&mut server, ServiceRequest::LobbyCreate { name: "parlor".to_owned() })
            .unwrap_err(),
        ServiceError::Lobby(LobbyError::AlreadyExists)
    );
    bob.rpc(&mut server, ServiceRequest::LobbyJoin { name: "parlor".to_owned() }).unwrap();
    cat.rpc(&mut server, ServiceRequest::LobbyJoin { name: "parlor".to_owned() }).unwrap();
    assert_eq!(
        cat.rpc(&mut server, ServiceRequest::LobbyJoin { name: "parlor".to_owned() })
            .unwrap_err(),
        ServiceError::Lobby(LobbyError::PlayerAlreadyIn)
    );

    // Join broadcasts reached the earlier members.
    ann.drain();
    assert_eq!(ann.count_events(|e| matches!(e, SessionEvent::Join { .. })), 2);
    assert_eq!(ann.state.lobby().unwrap().players, vec!["ann", "bob", "cat"]);

    // The host leaves; the next player in join order takes over.
    ann.rpc(&mut server, ServiceRequest::LobbyLeave).unwrap();
    let reply = bob.rpc(&mut server, ServiceRequest::LobbyUpdate).unwrap();
    let ResponseValue::Lobby(lobby) = reply else { panic!("expected lobby state") };
    assert_eq!(lobby.players, vec!["bob", "cat"]);
    bob.drain();
    assert_eq!(bob.count_events(|e| matches!(e, SessionEvent::Leave { .. })), 1);

    assert_eq!(
        ann.rpc(&mut server, ServiceRequest::LobbyUpdate).unwrap_err(),
        ServiceError::Lobby(LobbyError::PlayerNotIn)
    );
}

#[test]
fn lobby_is_capped_at_four_players() {
    let mut server = Server::new();
    let mut host = Client::connect(&mut server);
    host.login(&mut server, "p0").unwrap();
    host.rpc(&mut server, ServiceRequest::LobbyCreate { name: "parlor".to_owned() })
        .unwrap();
    // Keep the joined clients alive: dropping one closes its channel and the
    // next broadcast would evict it from the lobby.
    let mut joined = Vec::new();
    for i in 1..4 {
        let mut client = Client::connect(&mut server);
        client.login(&mut server, &format!("p{i}")).unwrap();
        client
            .rpc(&mut server, ServiceRequest::LobbyJoin { name: "parlor".to_owned() })
            .unwrap();
        joined.push(client);
    }
    let mut late = Client::connect(&mut server);
    late.login(&mut server, "late").unwrap();
    assert_eq!(
        late.rpc(&mut server, ServiceRequest::LobbyJoin { name: "parlor".to_owned() })
            .unwrap_err(),
        ServiceError::Lobby(LobbyError::Full)
    );
}

#[test]
fn game_start_requires_host_and_enough_players() {
    let mut server = Server::new();
    let mut ann = Client::connect(&mut server);
    let mut bob = Client::connect(&mut server);
    ann.login(&mut server, "ann").unwrap();
    bob.login(&mut server, "bob").unwrap();
    ann.rpc(&mut server, ServiceRequest::LobbyCreate { name: "parlor".to_owned() })
        .unwrap();
    assert_eq!(
        ann.rpc(&mut server, ServiceRequest::GameStart).unwrap_err(),
        ServiceError::Game(GameError::NotEnoughPlayers)
    );
    bob.rpc(&mut server, ServiceRequest::LobbyJoin { name: "parlor".to_owned() }).unwrap();
    assert_eq!(
        bob.rpc(&mut server, ServiceRequest::GameStart).unwrap_err(),
        ServiceError::Game(GameError::NotHost)
    );
    // Game requests are not served in the lobby phase.
    assert_eq!(
        ann.rpc(
            &mut server,
            ServiceRequest::CardSelect { column: 0, positions: vec![CellPos::new(4, 4)] },
        )
        .unwrap_err(),
        ServiceError::UnsupportedInThisPhase
    );
}

#[test]
fn moves_are_validated_and_broadcast() {
    let mut server = Server::new();
    let run = [
        (CellPos::new(4, 3), CardKind::Seashells),
        (CellPos::new(4, 4), CardKind::Seashells),
        (CellPos::new(4, 5), CardKind::Seashells),
    ];
    let (mut ann, mut bob) = start_staged_game(&mut server, &run);
    assert_eq!(ann.state.game().unwrap().current_player.as_deref(), Some("ann"));

    assert_eq!(
        bob.rpc(
            &mut server,
            ServiceRequest::CardSelect { column: 0, positions: vec![CellPos::new(4, 3)] },
        )
        .unwrap_err(),
        ServiceError::Game(GameError::NotYourTurn)
    );
    assert_eq!(
        ann.rpc(
            &mut server,
            ServiceRequest::CardSelect {
                column: 0,
                positions: vec![CellPos::new(4, 3), CellPos::new(4, 5)],
            },
        )
        .unwrap_err(),
        ServiceError::Game(GameError::InvalidMove(InvalidMoveReason::BadShape))
    );
    assert!(matches!(
        ann.rpc(
            &mut server,
            ServiceRequest::CardSelect {
                column: 2,
                positions: vec![CellPos::new(4, 3), CellPos::new(4, 4), CellPos::new(4, 5)],
            },
        ),
        Ok(ResponseValue::Ok)
    ));

    ann.drain();
    bob.drain();
    for client in [&ann, &bob] {
        let game = client.state.game().unwrap();
        let shelf = game.shelf_of("ann").unwrap();
        assert_eq!(shelf.card_at(0, 2), Some(CardKind::Seashells));
        assert_eq!(shelf.card_at(2, 2), Some(CardKind::Seashells));
        assert_eq!(game.current_player.as_deref(), Some("bob"));
    }
    assert_eq!(bob.count_events(|e| matches!(e, SessionEvent::Update(_))), 1);
}

#[test]
fn chat_reaches_the_lobby_and_whispers_stay_private() {
    let mut server = Server::new();
    let mut ann = Client::connect(&mut server);
    let mut bob = Client::connect(&mut server);
    let mut cat = Client::connect(&mut server);
    ann.login(&mut server, "ann").unwrap();
    bob.login(&mut server, "bob").unwrap();
    cat.login(&mut server, "cat").unwrap();
    ann.rpc(&mut server, ServiceRequest::LobbyCreate { name: "parlor".to_owned() })
        .unwrap();
    bob.rpc(&mut server, ServiceRequest::LobbyJoin { name: "parlor".to_owned() }).unwrap();
    cat.rpc(&mut server, ServiceRequest::LobbyJoin { name: "parlor".to_owned() }).unwrap();

    ann.rpc(
        &mut server,
        ServiceRequest::ChatSend {
            message: "hello".to_owned(),
            recipient: ChatRecipient::All,
        },
    )
    .unwrap();
    ann.rpc(
        &mut server,
        ServiceRequest::ChatSend {
            message: "psst".to_owned(),
            recipient: ChatRecipient::Direct("bob".to_owned()),
        },
    )
    .unwrap();
    assert_eq!(
        ann.rpc(
            &mut server,
            ServiceRequest::ChatSend {
                message: "hm".to_owned(),
                recipient: ChatRecipient::Direct("stranger".to_owned()),
            },
        )
        .unwrap_err(),
        ServiceError::Lobby(LobbyError::PlayerNotIn)
    );

    // Oversized messages are truncated, not rejected.
    ann.rpc(
        &mut server,
        ServiceRequest::ChatSend { message: "x".repeat(600), recipient: ChatRecipient::All },
    )
    .unwrap();

    ann.drain();
    bob.drain();
    cat.drain();
    assert_eq!(ann.state.chat_log().len(), 3); // own messages echo back
    assert_eq!(bob.state.chat_log().len(), 3);
    assert_eq!(cat.state.chat_log().len(), 2); // no whisper
    assert_eq!(bob.state.chat_log()[1].text, "psst");
    assert_eq!(cat.state.chat_log()[1].text.len(), 500);
}

#[test]
fn disconnect_pauses_and_reconnect_resumes() {
    let mut server = Server::new();
    let cards = [
        (CellPos::new(4, 3), CardKind::Books),
        (CellPos::new(4, 5), CardKind::Ferns),
    ];
    let (mut ann, mut bob) = start_staged_game(&mut server, &cards);

    bob.disconnect(&mut server);
    ann.drain();
    assert_eq!(ann.count_events(|e| matches!(e, SessionEvent::Pause { .. })), 1);
    assert!(ann.state.game().unwrap().paused);
    assert_eq!(
        ann.rpc(
            &mut server,
            ServiceRequest::CardSelect { column: 0, positions: vec![CellPos::new(4, 3)] },
        )
        .unwrap_err(),
        ServiceError::Game(GameError::GamePaused)
    );

    // Bob comes back on a brand-new connection and inherits his identity.
    bob.reconnect(&mut server);
    assert!(matches!(
        bob.login(&mut server, "bob"),
        Ok(ResponseValue::Welcome { rejoined: true, .. })
    ));
    bob.drain();
    assert_eq!(bob.state.phase(), SessionPhase::InGame);
    let game = bob.state.game().unwrap();
    assert!(!game.paused);
    assert_eq!(game.current_player.as_deref(), Some("ann"));

    ann.drain();
    assert_eq!(ann.count_events(|e| matches!(e, SessionEvent::Resume)), 1);
    assert!(matches!(
        ann.rpc(
            &mut server,
            ServiceRequest::CardSelect { column: 0, positions: vec![CellPos::new(4, 3)] },
        ),
        Ok(ResponseValue::Ok)
    ));
}

#[test]
fn watchdog_tears_down_an_abandoned_game() {
    let mut server = Server::with_options(ServerOptions {
        watchdog_interval: Duration::from_secs(10),
        watchdog_max_attempts: 2,
        ..ServerOptions::default()
    });
    let cards = [(CellPos::new(4, 3), CardKind::Books)];
    let (mut ann, mut bob) = start_staged_game(&mut server, &cards);

    bob.disconnect(&mut server);
    ann.drain();
    assert_eq!(ann.count_events(|e| matches!(e, SessionEvent::Pause { .. })), 1);

    // First expiry: the pause is re-announced, the game survives.
    server.advance(Duration::from_secs(10));
    server.tick();
    ann.drain();
    assert_eq!(ann.count_events(|e| matches!(e, SessionEvent::Pause { .. })), 2);
    assert!(ann.state.game().is_some());

    // Second expiry: grace is over. Ann wins by forfeit.
    server.advance(Duration::from_secs(10));
    server.tick();
    ann.drain();
    let end = ann
        .events
        .iter()
        .find_map(|e| match e {
            SessionEvent::End { scoreboard } => Some(scoreboard.clone()),
            _ => None,
        })
        .expect("the survivor gets the final scoreboard");
    assert_eq!(end.rows[0].username, "ann");
    assert_eq!(end.rows[0].title, SOLE_SURVIVOR_TITLE);
    assert_eq!(ann.state.phase(), SessionPhase::InLobby);

    // Ann is back in the lobby alone; bob's identity is free again.
    let reply = ann.rpc(&mut server, ServiceRequest::LobbyUpdate).unwrap();
    let ResponseValue::Lobby(lobby) = reply else { panic!("expected lobby state") };
    assert_eq!(lobby.players, vec!["ann"]);
    let mut bob2 = Client::connect(&mut server);
    assert!(matches!(
        bob2.login(&mut server, "bob"),
        Ok(ResponseValue::Welcome { rejoined: false, .. })
    ));
}

#[test]
fn silent_connections_time_out() {
    let mut server = Server::new();
    let mut ann = Client::connect(&mut server);
    let mut bob = Client::connect(&mut server);
    ann.login(&mut server, "ann").unwrap();
    bob.login(&mut server, "bob").unwrap();
    ann.rpc(&mut server, ServiceRequest::LobbyCreate { name: "parlor".to_owned() })
        .unwrap();
    bob.rpc(&mut server, ServiceRequest::LobbyJoin { name: "parlor".to_owned() }).unwrap();

    // Bob keeps pinging; ann goes silent.
    server.advance(Duration::from_secs(30));
    bob.rpc(&mut server, ServiceRequest::Ping).unwrap();
    server.advance(Duration::from_secs(25));
    bob.rpc(&mut server, ServiceRequest::Ping).unwrap();
    server.advance(Duration::from_secs(6));
    server.tick();

    bob.drain();
    assert_eq!(bob.count_events(|e| matches!(e, SessionEvent::Leave { .. })), 1);
    let reply = bob.rpc(&mut server, ServiceRequest::LobbyUpdate).unwrap();
    let ResponseValue::Lobby(lobby) = reply else { panic!("expected lobby state") };
    assert_eq!(lobby.players, vec!["bob"]);
}

#[test]
fn snapshots_allow_restoring_a_torn_down_game() {
    let dir = std::env::temp_dir()
        .join(format!("curio_online_snapshots_{}", std::process::id()));
    let store = FileSnapshotStore::new(&dir).unwrap();
    let mut server = Server::with_options(ServerOptions {
        watchdog_interval: Duration::from_secs(10),
        watchdog_max_attempts: 2,
        snapshot_store: Some(Box::new(store)),
        ..ServerOptions::default()
    });

    let mut ann = Client::connect(&mut server);
    let mut bob = Client::connect(&mut server);
    ann.login(&mut server, "ann").unwrap();
    bob.login(&mut server, "bob").unwrap();
    ann.rpc(&mut server, ServiceRequest::LobbyCreate { name: "salon".to_owned() }).unwrap();
    bob.rpc(&mut server, ServiceRequest::LobbyJoin { name: "salon".to_owned() }).unwrap();
    assert_eq!(
        ann.rpc(&mut server, ServiceRequest::GameLoad).unwrap_err(),
        ServiceError::Game(GameError::NoSavedGame)
    );

    let cards = [
        (CellPos::new(4, 3), CardKind::Seashells),
        (CellPos::new(4, 5), CardKind::Books),
    ];
    server.state.TEST_override_next_game(staged_two_player_game(&cards));
    ann.rpc(&mut server, ServiceRequest::GameStart).unwrap();
    ann.rpc(
        &mut server,
        ServiceRequest::CardSelect { column: 0, positions: vec![CellPos::new(4, 3)] },
    )
    .unwrap();

    // Bob vanishes and the watchdog gives up.
    bob.disconnect(&mut server);
    server.advance(Duration::from_secs(10));
    server.tick();
    server.advance(Duration::from_secs(10));
    server.tick();
    ann.drain();
    assert_eq!(ann.state.phase(), SessionPhase::InLobby);

    // Bob returns as a fresh client and rejoins the lobby.
    bob.reconnect(&mut server);
    assert!(matches!(
        bob.login(&mut server, "bob"),
        Ok(ResponseValue::Welcome { rejoined: false, .. })
    ));
    bob.rpc(&mut server, ServiceRequest::LobbyJoin { name: "salon".to_owned() }).unwrap();

    // A third player makes the saved player set mismatch.
    let mut cat = Client::connect(&mut server);
    cat.login(&mut server, "cat").unwrap();
    cat.rpc(&mut server, ServiceRequest::LobbyJoin { name: "salon".to_owned() }).unwrap();
    assert_eq!(
        ann.rpc(&mut server, ServiceRequest::GameLoad).unwrap_err(),
        ServiceError::Game(GameError::SavedGameMismatch)
    );
    cat.rpc(&mut server, ServiceRequest::LobbyLeave).unwrap();

    assert!(matches!(
        ann.rpc(&mut server, ServiceRequest::GameLoad),
        Ok(ResponseValue::Ok)
    ));
    ann.drain();
    bob.drain();
    // The restored game resumes exactly where the autosave left it.
    assert_eq!(ann.state.phase(), SessionPhase::InGame);
    let game = bob.state.game().unwrap();
    assert_eq!(game.current_player.as_deref(), Some("bob"));
    assert_eq!(game.shelf_of("ann").unwrap().card_at(0, 0), Some(CardKind::Seashells));
    assert!(matches!(
        bob.rpc(
            &mut server,
            ServiceRequest::CardSelect { column: 1, positions: vec![CellPos::new(4, 5)] },
        ),
        Ok(ResponseValue::Ok)
    ));
}
