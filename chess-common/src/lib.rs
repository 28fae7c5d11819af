//! Common utilities for bookmate
//!
//! This crate provides shared conversion utilities and UCI helpers
//! used across the bookmate engine, explorer, and session components.

pub mod converters;
pub mod uci;

// Re-export commonly used items
pub use converters::*;
pub use uci::*;
