pub mod api;
pub mod bus;
pub mod chat;
pub mod config;
pub mod error;
pub mod interface;
pub mod notify;
pub mod server;
pub mod store;

pub use store::{ChatSessionStore, StoreSnapshot};
