#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod board;
pub mod cards;
pub mod client;
pub mod connection;
pub mod error;
pub mod event;
pub mod game;
pub mod heartbeat;
pub mod lobby;
pub mod network;
pub mod objectives;
pub mod persistence;
pub mod registry;
pub mod scores;
pub mod server;
pub mod shelf;
