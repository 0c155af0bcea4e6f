//! Password, bearer-token and Firebase ID-token authentication.

pub mod extractor;
pub mod firebase;
pub mod handlers;
pub mod jwt;
pub mod password;

pub use extractor::AuthUser;
