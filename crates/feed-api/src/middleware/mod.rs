//! Request middleware.

pub mod auth;
pub mod request_id;

pub use auth::require_bearer;
pub use request_id::MakeRequestUuidV7;
