//! Real-time chess game server: game sessions, the move pipeline, the websocket
//! room registry and the HTTP surface around them.

pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod rooms;
pub mod routes;
pub mod session;
