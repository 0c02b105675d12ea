//! # Votes
//!
//! Maintenance entry point for the votes subsystem.
//!
//! ## Modules
//!
//! - [`config`]: Environment configuration and dependency wiring
//! - [`maintenance`]: `vote_count` audit and repair over every target kind
//! - [`errors`]: Error types for the binary

pub mod config;
pub mod errors;
pub mod maintenance;

pub use config::{Dependencies, VotesConfig};
pub use errors::MaintenanceError;
