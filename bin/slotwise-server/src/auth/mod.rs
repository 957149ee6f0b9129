//! Credentials and bearer tokens.

pub mod password;
pub mod revocation;
pub mod token;

pub use revocation::RevokedTokens;
pub use token::{Claims, IssuedToken, JwtKeys, TokenError};
