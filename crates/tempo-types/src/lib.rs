//! Shared domain types for the tempo client engine.

pub mod board;
pub mod clock;
pub mod config;
pub mod events;
pub mod game;

mod errors;

pub use errors::{Result, TempoError};
