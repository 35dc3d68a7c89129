//! Data Transfer Objects for the teledrive HTTP API.
//!
//! JSON fields are camelCase; every success body is wrapped in
//! [`ApiResponse`].

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;
