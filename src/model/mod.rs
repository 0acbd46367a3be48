//! Canonical data model: the normalized message handed to planning and writing.

pub mod address;
pub mod attachment;
pub mod message;
