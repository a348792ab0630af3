use serde::{Deserialize, Serialize};

use crate::network::CommunicationError;


#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum IdentificationError {
    UsernameTaken,
    NotIdentified,
    // The username is set once per connection and cannot be changed.
    AlreadyIdentified,
    InvalidUsername,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum LobbyError {
    NotFound,
    AlreadyExists,
    Full,
    PlayerAlreadyIn,
    PlayerNotIn,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum InvalidMoveReason {
    // Selections must contain between 1 and 3 distinct positions.
    SelectionSize,
    // A selected cell is empty, unusable or has no free orthogonal side.
    NotPickable,
    // Cells must form a contiguous orthogonal line.
    BadShape,
    // The destination column does not have enough free cells.
    ColumnOverflow,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum GameError {
    NotYourTurn,
    InvalidMove(InvalidMoveReason),
    GamePaused,
    GameEnded,
    GameInProgress,
    NotHost,
    NotEnoughPlayers,
    NoActiveGame,
    NoSavedGame,
    SavedGameMismatch,
}

// Domain-level rejection of a single call. Always correlated back to the
// offending call as an error reply; never fatal to the connection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ServiceError {
    Identification(IdentificationError),
    Lobby(LobbyError),
    Game(GameError),
    // The call is not served by the connection's current dispatcher.
    UnsupportedInThisPhase,
}

impl From<IdentificationError> for ServiceError {
    fn from(err: IdentificationError) -> Self { ServiceError::Identification(err) }
}
impl From<LobbyError> for ServiceError {
    fn from(err: LobbyError) -> Self { ServiceError::Lobby(err) }
}
impl From<GameError> for ServiceError {
    fn from(err: GameError) -> Self { ServiceError::Game(err) }
}

// Client-side failure of `call` / `wait_result`.
#[derive(Debug)]
pub enum ClientError {
    // The wait expired. The pending entry is kept so a late reply is drained.
    Timeout,
    Disconnected,
    Communication(CommunicationError),
}

impl From<CommunicationError> for ClientError {
    fn from(err: CommunicationError) -> Self { ClientError::Communication(err) }
}
