//! # Seisresp Library
//!
//! This library exposes the seisresp CLI modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod cli;
pub mod config;

// Re-export seisresp_core for convenience
pub use seisresp_core;
