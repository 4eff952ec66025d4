//! Murmur backend: reputation-weighted posting, voting and tipping with
//! shared link previews, exposed over a REST API.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod node;
pub mod posting;
pub mod previews;
pub mod reputation;
pub mod telemetry;
pub mod users;
pub mod utils;
pub mod voting;
