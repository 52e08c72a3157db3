//! Core types and error handling for the authdns server
//!
//! This crate provides the zone data model, the record type registry, and
//! the error types shared by the storage, cache, replication, and resolver
//! crates.

pub mod error;
pub mod zone;

pub use error::{DnsError, DnsResult};
pub use zone::*;
