//! Core data models for the file gateway.
//!
//! The gateway keeps no records of its own; these types describe keys, links
//! and object streams as they pass between the handlers and the store.

pub mod object;
