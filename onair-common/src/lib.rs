//! # OnAir Common Library
//!
//! Shared code for the OnAir broadcast services:
//! - Catalog Store schema and initialization
//! - Data models (content items, playlists, segments, stream status)
//! - Event types and the EventBus
//! - Configuration loading and root folder resolution

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
