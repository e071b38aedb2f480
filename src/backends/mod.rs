//! Backends module - External programs the proxy drives
//!
//! Provides:
//! - go: go command invocation and JSON decoding
//! - upstream: forwarding to a next-hop module proxy
//! - doctor: Environment checking

pub mod doctor;
pub mod go;
pub mod upstream;
