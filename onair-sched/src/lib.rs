//! OnAir scheduling core
//!
//! Builds daily playlists from the approved catalog, attaches narration,
//! publishes the active playlist to the broadcast engine and supervises the
//! streaming processes. Periodic and on-demand work runs on the lane-based
//! [`tasks::TaskScheduler`].

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod media;
pub mod narration;
pub mod publisher;
pub mod segments;
pub mod selector;
pub mod service;
pub mod supervisor;
pub mod tasks;

pub use error::{Error, Result};
