//! HTTP request handlers for the REST API.
//!
//! Path segments accept either an id or a name; lookups go through the
//! service's `find_*` helpers.

pub mod channel;
pub mod key;
pub mod message;
pub mod minion;
pub mod ws;

use std::str::FromStr;

use crate::http::error::AppError;

/// Parse a path segment as a typed id.
pub(crate) fn parse_id<T: FromStr>(raw: &str, entity: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("invalid {entity} id '{raw}'")))
}
