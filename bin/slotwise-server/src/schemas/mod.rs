//! Request and response bodies, with their OpenAPI schemas.

pub mod ai;
pub mod api;
