//! `mailextract`: extract messages and attachments from mail archives.
//!
//! The pipeline reads an archive's folder tree ([`archive`]), normalizes each
//! record ([`normalize`]), plans a collision-free destination ([`plan`]) and
//! writes `.eml` / `.pdf` files plus attachments ([`write`]). [`export`]
//! drives a whole run and produces the report.

pub mod archive;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod normalize;
pub mod plan;
pub mod write;
