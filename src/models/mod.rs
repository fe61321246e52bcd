//! Core data models for the file proxy.
//!
//! Identifiers double as local filenames and remote object keys; the
//! locator functions in `identifier` keep that mapping in one place.

pub mod identifier;
pub mod stored_object;
