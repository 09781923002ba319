// folio-server: chat-platform wiki bot backend.

pub mod allocator;
pub mod api;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod permissions;
pub mod store;
pub mod timeout;
