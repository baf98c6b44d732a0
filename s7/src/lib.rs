//! An async client for Siemens S7 PLCs using [Tokio](https://docs.rs/tokio)
//! and Rust's `async/await` syntax.
//!
//! # Features
//!
//! * ISO-on-TCP transport (TPKT + COTP) with S7 setup communication
//! * Symbolic addresses resolved once into reusable descriptors
//! * Pipelined reads bounded by the negotiated number of parallel jobs
//! * Per-request timeouts with partial results for failed items
//! * Results observable by blocking, awaiting, polling or callback
//! * Panic-free parsing
//!
//! # Supported areas and types
//!
//! * Inputs, Outputs, Memory and Data Blocks
//! * BIT, BYTE, WORD, DWORD, INT, DINT and REAL
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use s7::client::{Connection, ConnectionConfig, ReadRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = Connection::from_url("s7://192.168.0.1/0/2", ConnectionConfig::default())?;
//!     connection.connect().await?;
//!
//!     let input = connection.parse_address("INPUTS/0")?;
//!     let counter = connection.parse_address("DATA_BLOCKS/1/4")?;
//!
//!     loop {
//!         let request = ReadRequest::new().add::<u8>(input).add::<i16>(counter);
//!         match connection.read(request)?.response().await {
//!             Ok(response) => {
//!                 println!("input: {:?}", response.get::<u8>(&input));
//!                 println!("counter: {:?}", response.get::<i16>(&counter));
//!             }
//!             Err(err) => println!("error: {err}"),
//!         }
//!         tokio::time::sleep(Duration::from_secs(1)).await;
//!     }
//! }
//! ```

mod address;
mod channel;
mod common;
mod constants;
mod decode;
mod error;
mod maybe_async;
mod protocol;
mod types;
mod url;

/// client API
pub mod client;

pub use crate::address::*;
pub use crate::common::phys::{PhysLayer, Stream};
pub use crate::constants::DEFAULT_PORT;
pub use crate::decode::*;
pub use crate::error::*;
pub use crate::maybe_async::*;
pub use crate::types::*;
pub use crate::url::*;
