pub mod api;
pub mod visibility;

/// Numeric user identity, as issued by the auth service.
pub type UserId = i64;
