pub use crate::client::config::*;
pub use crate::client::connection::*;
pub use crate::client::connector::*;
pub use crate::client::pending::{PendingRead, ReadResult};
pub use crate::client::request::*;

mod config;
mod connection;
mod connector;
mod handshake;
pub(crate) mod message;
pub(crate) mod pending;
pub(crate) mod request;
pub(crate) mod task;
