//! Common utilities for Kalandra.
//!
//! This crate provides foundational types and utilities used across all Kalandra crates:
//!
//! - [`BinaryReader`] - Bounds-checked binary reading from byte slices
//! - [`hash`] - The content hash used to pair index entries with path strings

mod error;
mod reader;

pub mod hash;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};
