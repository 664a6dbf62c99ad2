//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the transfer engine crates:
//! - Logging and tracing bootstrap
//! - Configuration and capability injection
//! - Event bus for session and transfer progress
//!
//! ## Overview
//!
//! Nothing in here talks to a provider. The crate establishes the logging
//! conventions, the validated configuration, and the broadcast channel that
//! the session managers and the transfer pipeline publish to.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
