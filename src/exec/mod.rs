//! Invoking external processes

pub mod subprocess;
