#![allow(clippy::result_large_err)]
//! # ledger-driver
//!
//! Client-side driver runtime for a managed, append-only, cryptographically
//! verifiable ledger database.
//!
//! The ledger exposes a session-oriented request/response protocol: open a
//! session, start a transaction inside that session, execute parameterized
//! statements, then commit with a digest the server verifies against its own
//! recomputed digest. The ledger uses optimistic concurrency control: a
//! transaction that touched data another transaction committed over fails at
//! commit with an OCC conflict and must be retried from scratch.
//!
//! This crate covers the driver runtime: the session pool, the transaction
//! lifecycle, the retry/backoff engine, the rolling statement-hash (digest)
//! computation, and paged result streaming. The wire transport, the document
//! codec, and the SHA-256 primitive are external collaborators reached
//! through the [`transport::Transport`] and [`codec::Codec`] traits.
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ledger_driver::codec::IdentityCodec;
//! use ledger_driver::driver::Driver;
//! use ledger_driver::error::Error;
//! use ledger_driver::retry::RetryConfig;
//!
//! async fn run(transport: Arc<dyn ledger_driver::transport::Transport>) -> Result<(), Error> {
//!     let driver = Driver::new("my-ledger", transport, Arc::new(IdentityCodec), 10, RetryConfig::default());
//!
//!     let rows = driver
//!         .execute_lambda(
//!             |tx| async move { tx.execute("SELECT * FROM Table1", vec![]).await },
//!             None,
//!         )
//!         .await?;
//!     let _ = rows;
//!
//!     driver.close().await;
//!     Ok(())
//! }
//! ```
pub mod codec;
pub mod driver;
pub mod error;
pub mod hash;
pub mod result;
pub mod retry;
pub mod session;
pub mod session_pool;
pub mod transaction;
pub mod transport;

pub use driver::Driver;
pub use error::Error;
