use serde::{Deserialize, Serialize};

use crate::board::TabletopView;
use crate::cards::CellPos;
use crate::error::ServiceError;
use crate::objectives::{CommonObjectiveKind, PersonalObjective};
use crate::scores::{Cockade, Scoreboard};
use crate::shelf::Shelf;


pub const MAX_CHAT_MESSAGE_LENGTH: usize = 500;

pub type CallId = u64;

// A client-issued request. Consumed exactly once by the dispatcher matching
// the sender's session phase; always answered by exactly one `Reply`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientCall {
    pub call_id: CallId,
    pub request: ServiceRequest,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ServiceRequest {
    Ping,
    Login { username: String },
    LobbyList,
    LobbyCreate { name: String },
    LobbyJoin { name: String },
    LobbyLeave,
    LobbyUpdate,
    GameStart,
    GameLoad,
    CardSelect { column: u8, positions: Vec<CellPos> },
    ChatSend { message: String, recipient: ChatRecipient },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ChatRecipient {
    All,
    Direct(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub recipient: ChatRecipient,
    pub text: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LobbySummary {
    pub name: String,
    pub num_players: usize,
    pub capacity: usize,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LobbyState {
    pub name: String,
    pub players: Vec<String>, // join order; first entry is the host
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ResponseValue {
    Ok,
    Welcome { username: String, rejoined: bool },
    Lobbies(Vec<LobbySummary>),
    Lobby(LobbyState),
}

// Everything the server sends. A frame carrying a `call_id` is routed to the
// call correlator; an `Event` frame goes to the event queue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ServerMessage {
    Reply {
        call_id: CallId,
        result: Result<ResponseValue, ServiceError>,
    },
    Event(SessionEvent),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PauseReason {
    PlayerDisconnected { username: String },
}

// Out-of-band push notifications. Delivery order to a given connection matches
// server emission order for that connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SessionEvent {
    Join { username: String },
    Leave { username: String },
    Pause { reason: PauseReason },
    Resume,
    Start(Box<GameStartSnapshot>),
    Update(Box<GameUpdate>),
    End { scoreboard: Scoreboard },
    NewMessage(ChatMessage),
    Error { message: String },
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CommonObjectiveView {
    pub kind: CommonObjectiveKind,
    pub current_points: u32,
}

// Tailored per recipient: the personal objective is only ever sent to its
// owner. Carries the full current state so it doubles as the reconnection
// snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameStartSnapshot {
    pub players: Vec<String>, // turn order
    pub tabletop: TabletopView,
    pub shelves: Vec<(String, Shelf)>,
    pub common_objectives: Vec<CommonObjectiveView>,
    pub personal_objective: PersonalObjective,
    pub current_player: String,
    pub paused: bool,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CockadeAward {
    pub username: String,
    // Identifies the objective instance, so re-applying the same event cannot
    // double-count the prize.
    pub source: String,
    pub cockade: Cockade,
}

// State delta after a move. The payload is absolute (full board, full mover
// shelf), so applying the same event object twice is a no-op.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameUpdate {
    pub event_id: u64,
    pub mover: String,
    pub tabletop: TabletopView,
    pub shelf: Shelf,
    pub completed: Vec<CockadeAward>,
    pub next_player: Option<String>,
}
