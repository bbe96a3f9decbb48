//! Incremental local archive of a Gmail mailbox.
//!
//! - [`auth`]: OAuth session bootstrap
//! - [`mail`]: remote mail source and payload decoding
//! - [`store`]: on-disk archive, one file per message
//! - [`sync`]: rate governor and the sync engine

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod mail;
pub mod store;
pub mod sync;

pub use error::{ArchiveError, Result};
