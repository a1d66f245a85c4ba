/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque owning-user identifier (the `sub` claim of the caller's token).
///
/// Also the leading segment of every asset key the user owns.
pub type UserId = String;
