//! Core module - Contains the fundamental data structures and utilities
//!
//! This module provides:
//! - Module identifiers and resolver records
//! - Path and version escaping
//! - Cache root layout
//! - The error taxonomy
//! - Startup configuration

pub mod config;
pub mod error;
pub mod escape;
pub mod model;
pub mod paths;
