use std::collections::{HashMap, HashSet};

use crate::error::IdentificationError;
use crate::server::ClientId;


pub const MAX_USERNAME_LENGTH: usize = 32;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IdentifyOutcome {
    Fresh,
    // The username had a prior, now-disconnected session; the caller inherits
    // that identity.
    Rejoined,
}

// Splits connections into the not-yet-identified pool and the identified map.
// Only answers "is this username connected, and to which client" — session
// routing stays with the server loop.
pub struct ClientRegistry {
    unidentified: HashSet<ClientId>,
    identified: HashMap<String, Option<ClientId>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        ClientRegistry { unidentified: HashSet::new(), identified: HashMap::new() }
    }

    pub fn add_unidentified(&mut self, id: ClientId) {
        let inserted = self.unidentified.insert(id);
        assert!(inserted, "client {id:?} registered twice");
    }

    pub fn num_unidentified(&self) -> usize { self.unidentified.len() }

    pub fn identify(
        &mut self, id: ClientId, username: &str,
    ) -> Result<IdentifyOutcome, IdentificationError> {
        if username.is_empty()
            || username.len() > MAX_USERNAME_LENGTH
            || !username.chars().all(|ch| ch.is_alphanumeric() || ch == '_')
        {
            return Err(IdentificationError::InvalidUsername);
        }
        if !self.unidentified.contains(&id) {
            return Err(IdentificationError::AlreadyIdentified);
        }
        let outcome = match self.identified.get(username) {
            Some(Some(_)) => return Err(IdentificationError::UsernameTaken),
            Some(None) => IdentifyOutcome::Rejoined,
            None => IdentifyOutcome::Fresh,
        };
        self.unidentified.remove(&id);
        self.identified.insert(username.to_owned(), Some(id));
        Ok(outcome)
    }

    pub fn lookup(&self, username: &str) -> Option<ClientId> {
        self.identified.get(username).copied().flatten()
    }

    pub fn is_connected(&self, username: &str) -> bool { self.lookup(username).is_some() }

    // Keeps the identity so the player can resume it later.
    pub fn mark_disconnected(&mut self, username: &str) {
        if let Some(entry) = self.identified.get_mut(username) {
            *entry = None;
        }
    }

    pub fn remove_unidentified(&mut self, id: ClientId) {
        self.unidentified.remove(&id);
    }

    // Drops the identity entirely (e.g. when its session state is gone).
    pub fn forget(&mut self, username: &str) {
        self.identified.remove(username);
    }
}
