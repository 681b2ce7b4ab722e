// touchwand-api: Async Rust client for the TouchWand hub (REST + WebSocket)

pub mod action;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use action::UnitAction;
pub use client::HubClient;
pub use error::Error;
pub use models::{Connectivity, CurrentStatus, UnitRecord, UnitType};
pub use transport::{HubAddress, TransportConfig};
pub use websocket::{
    EventStream, ListenerId, ReconnectConfig, StreamConfig, StreamState, UnitStatusListener,
};
