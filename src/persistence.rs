use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::game::GameSession;
use crate::network::{self, CommunicationError};


pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

// A resumable image of one running game, written after every accepted move.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub schema_version: u32,
    pub lobby: String,
    pub game: GameSession,
}

impl SessionSnapshot {
    pub fn new(lobby: impl Into<String>, game: GameSession) -> Self {
        SessionSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            lobby: lobby.into(),
            game,
        }
    }
}

#[derive(Debug)]
pub enum SnapshotError {
    NotFound,
    Storage(io::Error),
    Malformed,
    UnsupportedVersion(u32),
}

impl From<io::Error> for SnapshotError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SnapshotError::NotFound,
            _ => SnapshotError::Storage(err),
        }
    }
}

impl From<CommunicationError> for SnapshotError {
    fn from(err: CommunicationError) -> Self {
        match err {
            CommunicationError::Socket(err) => SnapshotError::from(err),
            CommunicationError::Malformed(_) => SnapshotError::Malformed,
        }
    }
}

pub trait SnapshotStore {
    fn save(&self, key: &str, snapshot: &SessionSnapshot) -> Result<(), SnapshotError>;
    fn load(&self, key: &str) -> Result<SessionSnapshot, SnapshotError>;
    fn remove(&self, key: &str) -> Result<(), SnapshotError>;
}

// One framed file per lobby; the wire codec doubles as the disk format.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileSnapshotStore { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Lobby names come from clients, so they cannot be trusted as paths.
        let sanitized: String = key
            .chars()
            .map(|ch| if ch.is_alphanumeric() || ch == '_' || ch == '-' { ch } else { '_' })
            .collect();
        self.dir.join(format!("{sanitized}.save"))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, key: &str, snapshot: &SessionSnapshot) -> Result<(), SnapshotError> {
        let mut file = fs::File::create(self.path_for(key))?;
        network::write_obj(&mut file, snapshot)?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<SessionSnapshot, SnapshotError> {
        let mut file = fs::File::open(self.path_for(key))?;
        let snapshot: SessionSnapshot = network::read_obj(&mut file)?;
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.schema_version));
        }
        Ok(snapshot)
    }

    fn remove(&self, key: &str) -> Result<(), SnapshotError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            // Removing a snapshot that was never written is fine.
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
