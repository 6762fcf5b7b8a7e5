//! Shared helpers

pub mod hash;
pub mod terminal;
