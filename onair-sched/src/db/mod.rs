//! Catalog Store access for the scheduling core
//!
//! Each submodule owns the queries for one aggregate. Identifiers and
//! timestamps are stored as text; the helpers here convert them back.

pub mod content;
pub mod jobs;
pub mod playlists;
pub mod retry;
pub mod segments;
pub mod stream_status;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use onair_common::time;
use uuid::Uuid;

/// Error for a stored value that cannot be decoded
pub(crate) fn corrupt(column: &str, value: &str) -> Error {
    Error::Common(onair_common::Error::corrupt(column, value))
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| corrupt(column, value))
}

pub(crate) fn parse_ts(value: &str, column: &str) -> Result<DateTime<Utc>> {
    time::parse_rfc3339(value).ok_or_else(|| corrupt(column, value))
}

pub(crate) fn parse_opt_ts(value: Option<String>, column: &str) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_ts(&v, column)).transpose()
}

pub(crate) fn parse_opt_uuid(value: Option<String>, column: &str) -> Result<Option<Uuid>> {
    value.map(|v| parse_uuid(&v, column)).transpose()
}
