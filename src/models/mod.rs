pub mod api;
pub mod chat;
pub mod plan;
pub mod store;
pub mod websocket;
