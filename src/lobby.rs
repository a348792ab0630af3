use std::collections::HashMap;

use itertools::Itertools;

use crate::error::LobbyError;
use crate::event::{LobbyState, LobbySummary};


pub const MAX_LOBBY_SIZE: usize = 4;

// Players in join order; the first entry is the host.
#[derive(Clone, Debug)]
pub struct Lobby {
    name: String,
    players: Vec<String>,
}

impl Lobby {
    pub fn name(&self) -> &str { &self.name }
    pub fn players(&self) -> &[String] { &self.players }
    pub fn host(&self) -> &str { &self.players[0] }
    pub fn len(&self) -> usize { self.players.len() }
    pub fn is_empty(&self) -> bool { self.players.is_empty() }
    pub fn contains(&self, username: &str) -> bool {
        self.players.iter().any(|p| p == username)
    }

    pub fn state(&self) -> LobbyState {
        LobbyState { name: self.name.clone(), players: self.players.clone() }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LeaveOutcome {
    Left,
    // The host left; the next player in join order was promoted.
    HostChanged,
    // The last player left; the lobby is gone.
    Deleted,
}

pub struct LobbyDirectory {
    lobbies: HashMap<String, Lobby>,
}

impl LobbyDirectory {
    pub fn new() -> Self { LobbyDirectory { lobbies: HashMap::new() } }

    pub fn create(&mut self, name: &str, host: &str) -> Result<&Lobby, LobbyError> {
        if self.lobby_of(host).is_some() {
            return Err(LobbyError::PlayerAlreadyIn);
        }
        if self.lobbies.contains_key(name) {
            return Err(LobbyError::AlreadyExists);
        }
        let lobby = Lobby { name: name.to_owned(), players: vec![host.to_owned()] };
        Ok(self.lobbies.entry(name.to_owned()).or_insert(lobby))
    }

    pub fn join(&mut self, name: &str, username: &str) -> Result<&Lobby, LobbyError> {
        if self.lobby_of(username).is_some() {
            return Err(LobbyError::PlayerAlreadyIn);
        }
        let lobby = self.lobbies.get_mut(name).ok_or(LobbyError::NotFound)?;
        if lobby.len() >= MAX_LOBBY_SIZE {
            return Err(LobbyError::Full);
        }
        lobby.players.push(username.to_owned());
        Ok(lobby)
    }

    pub fn leave(&mut self, name: &str, username: &str) -> Result<LeaveOutcome, LobbyError> {
        let lobby = self.lobbies.get_mut(name).ok_or(LobbyError::NotFound)?;
        let idx = lobby
            .players
            .iter()
            .position(|p| p == username)
            .ok_or(LobbyError::PlayerNotIn)?;
        lobby.players.remove(idx);
        if lobby.is_empty() {
            self.lobbies.remove(name);
            Ok(LeaveOutcome::Deleted)
        } else if idx == 0 {
            Ok(LeaveOutcome::HostChanged)
        } else {
            Ok(LeaveOutcome::Left)
        }
    }

    pub fn get(&self, name: &str) -> Option<&Lobby> { self.lobbies.get(name) }

    pub fn lobby_of(&self, username: &str) -> Option<&Lobby> {
        self.lobbies.values().find(|lobby| lobby.contains(username))
    }

    // Discovery snapshot, not a subscription.
    pub fn list(&self) -> Vec<LobbySummary> {
        self.lobbies
            .values()
            .map(|lobby| LobbySummary {
                name: lobby.name.clone(),
                num_players: lobby.len(),
                capacity: MAX_LOBBY_SIZE,
            })
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect()
    }
}
