//! Shared response envelope.
//!
//! All API responses use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! rather than ad-hoc `json!({ "data": ... })`.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
